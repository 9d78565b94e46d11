use crate::aggregate::Aggregate;
use crate::error::Result;
use crate::expression::QueryExpression;
use crate::pushdown::KeySchema;
use crate::types::*;
use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;

/// Lazy, forward-only, single-pass sequence of rows. Dropping it releases
/// whatever cursor the adapter holds.
pub type RowStream = BoxStream<'static, Result<DataRow>>;

/// Contract every backend implements to serve compiled queries
#[async_trait]
pub trait QueryDataSource: Send + Sync + Downcast {
    /// Get the type name of this data source
    fn source_type(&self) -> &'static str;

    /// Get all capabilities supported by this source
    fn capabilities(&self) -> Vec<Capability>;

    /// Check if a specific capability is supported
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Hash/range key layout of a model, for partition keyed backends
    fn key_schema(&self, _model: &str) -> Option<KeySchema> {
        None
    }

    /// Rows matching the expression's filter and joins, in its order, before
    /// skip/take are applied
    async fn get_data_source(&self, expr: &QueryExpression) -> Result<RowStream>;

    /// Apply paging to a row stream
    fn apply_limits(&self, rows: RowStream, skip: Option<usize>, take: Option<usize>) -> RowStream {
        let rows = rows.skip(skip.unwrap_or(0));
        match take {
            Some(take) => rows.take(take).boxed(),
            None => rows.boxed(),
        }
    }

    /// Number of rows matching the filter, ignoring skip/take
    async fn count(&self, expr: &QueryExpression) -> Result<u64>;

    /// Evaluate an aggregate over the filtered rows. `None` when unsupported.
    async fn select_aggregate(
        &self,
        _expr: &QueryExpression,
        _aggregate: &Aggregate,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Close the connection gracefully
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl_downcast!(QueryDataSource);
