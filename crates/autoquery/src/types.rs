use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Capabilities supported by a data source
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    /// SQL-based queries (Postgres, MySQL, etc.)
    Sql,
    /// Document-based (MongoDB, etc.)
    Document,
    /// Partition/range keyed storage (DynamoDB-style)
    KeyValue,
    /// Rows held in process memory
    InMemory,
    /// Inner and left joins across models
    Joins,
    /// COUNT/MIN/MAX/SUM/AVG/FIRST/LAST over the filtered rows
    Aggregates,
    /// Opaque raw where/select/from/orderBy fragments
    RawFilters,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Sql => write!(f, "sql"),
            Capability::Document => write!(f, "document"),
            Capability::KeyValue => write!(f, "key-value"),
            Capability::InMemory => write!(f, "in-memory"),
            Capability::Joins => write!(f, "joins"),
            Capability::Aggregates => write!(f, "aggregates"),
            Capability::RawFilters => write!(f, "raw-filters"),
        }
    }
}

/// Field data types supported by models
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Boolean true/false
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point
    Float64,
    /// UTF-8 string
    String,
    /// ISO 8601 date
    Date,
    /// ISO 8601 timestamp
    Timestamp,
    /// JSON object or array
    Json,
    /// UUID
    Uuid,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int32 | FieldType::Int64 | FieldType::Float64)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Int32 => write!(f, "int32"),
            FieldType::Int64 => write!(f, "int64"),
            FieldType::Float64 => write!(f, "float64"),
            FieldType::String => write!(f, "string"),
            FieldType::Date => write!(f, "date"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Json => write!(f, "json"),
            FieldType::Uuid => write!(f, "uuid"),
        }
    }
}

/// Definition of a single field in a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as it appears in serialized rows
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether field is nullable
    pub nullable: bool,
    /// Optional description
    pub description: Option<String>,
}

/// Schema of a model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Field definitions, in declaration order
    pub fields: Vec<FieldDef>,
    /// Optional partition keys
    pub partitions: Option<Vec<String>>,
    /// Optional primary key
    pub primary_key: Option<Vec<String>>,
}

impl DatasetSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            nullable: false,
            description: None,
        });
        self
    }

    pub fn nullable_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            nullable: true,
            description: None,
        });
        self
    }

    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key
            .get_or_insert_with(Vec::new)
            .push(name.into());
        self
    }

    pub fn with_partitions(mut self, keys: &[&str]) -> Self {
        self.partitions = Some(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Case-insensitive field lookup
    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Primary key used for implicit ordering: the declared key, else `Id`, else the first field
    pub fn primary_key_field(&self) -> Option<&str> {
        if let Some(pk) = self.primary_key.as_ref().and_then(|keys| keys.first()) {
            return Some(pk.as_str());
        }
        self.find_field("Id")
            .or_else(|| self.fields.first())
            .map(|f| f.name.as_str())
    }
}

/// A row of data as ordered key-value pairs
pub type DataRow = serde_json::Map<String, serde_json::Value>;

/// Envelope returned by an executed query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    /// Number of rows skipped
    pub offset: usize,
    /// Rows matching the filter, ignoring skip/take
    pub total: u64,
    pub results: Vec<T>,
    /// Aggregates requested through `Include`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, String>>,
}

impl<T> QueryResponse<T> {
    pub fn new(offset: usize, total: u64, results: Vec<T>) -> Self {
        Self {
            offset,
            total,
            results,
            meta: None,
        }
    }
}
