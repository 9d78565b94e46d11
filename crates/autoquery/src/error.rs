use thiserror::Error;

/// Broad class of a [`DataError`], used by callers to decide how to surface it
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorClass {
    /// Bad registration detected at startup; the process must not serve requests
    Configuration,
    /// Malformed request value; a client error that must not be retried
    Argument,
    /// The selected backend cannot express the requested operators
    Capability,
    /// I/O failure, cancellation or timeout inside the adapter
    Backend,
}

/// Unified error type for query compilation and data source operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Invalid registration (join convention, custom filter, missing source)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid request value (Between arity, OrderBy column, coercion)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation or operator combination not supported by this backend
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),

    /// The caller cancelled the request
    #[error("Query cancelled")]
    Cancelled,

    /// Query timeout
    #[error("Query timeout after {0}ms")]
    QueryTimeout(u64),

    /// Connection failed (authentication, network, etc.)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed inside a backend. Adapters over a remote
    /// store return this when the store rejects an otherwise valid query.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity or data source not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic backend error, for adapter failures with no closer variant
    /// (driver errors, protocol errors, unexpected responses)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DataError {
    /// Create a "not found" error with custom message
    pub fn not_found(msg: impl Into<String>) -> Self {
        DataError::NotFound(msg.into())
    }

    /// Create an operation not supported error
    pub fn operation_not_supported(msg: impl Into<String>) -> Self {
        DataError::OperationNotSupported(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        DataError::InvalidArgument(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DataError::InvalidConfiguration(_) => ErrorClass::Configuration,
            DataError::InvalidArgument(_) => ErrorClass::Argument,
            DataError::OperationNotSupported(_) => ErrorClass::Capability,
            _ => ErrorClass::Backend,
        }
    }

    /// HTTP status a routing layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            DataError::InvalidArgument(_) => 400,
            DataError::NotFound(_) => 404,
            DataError::Cancelled => 499,
            DataError::OperationNotSupported(_) => 501,
            DataError::QueryTimeout(_) => 504,
            _ => 500,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, DataError::Cancelled | DataError::QueryTimeout(_))
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
