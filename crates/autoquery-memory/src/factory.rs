use crate::source::MemorySource;
use autoquery::{ConnectionConfig, DataError, DataSourceFactory, QueryDataSource, Result};
use std::sync::Arc;
use tracing::{debug, error};

/// Creates [`MemorySource`]s, optionally seeded from a JSON dataset file
/// given as the connection URL.
pub struct MemorySourceFactory;

impl DataSourceFactory for MemorySourceFactory {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn create_source(&self, config: &ConnectionConfig) -> Result<Arc<dyn QueryDataSource>> {
        let Some(path) = config.url.as_deref() else {
            return Ok(Arc::new(MemorySource::new()));
        };

        debug!("Loading memory dataset from {}", path);
        let text = std::fs::read_to_string(path).map_err(|e| {
            error!("Failed to read dataset {}: {}", path, e);
            DataError::ConnectionFailed(format!("Failed to read dataset {}: {}", path, e))
        })?;
        let document = serde_json::from_str(&text)?;
        Ok(Arc::new(MemorySource::from_json(document)?))
    }
}
