use crate::cursor::Cursor;
use crate::rows::{filter_and_sort, join, to_rows};
use async_trait::async_trait;
use autoquery::{
    Aggregate, Capability, DataError, DataRow, Model, QueryDataSource, QueryExpression, Result,
    RowStream,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Data source holding each model's rows in memory.
///
/// Supports every operator, inner and left joins, and aggregates. Tables are
/// immutable once the source is built.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<String, Arc<Vec<DataRow>>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table from model instances
    pub fn with_table<M: Model>(self, items: &[M]) -> Result<Self> {
        let rows = to_rows(items)?;
        Ok(self.with_rows(M::model_name(), rows))
    }

    /// Add a table from raw rows
    pub fn with_rows(mut self, model: impl Into<String>, rows: Vec<DataRow>) -> Self {
        let model = model.into();
        debug!("Loaded {} rows into {}", rows.len(), model);
        self.tables.insert(model, Arc::new(rows));
        self
    }

    /// Build from a JSON document of the form `{"Model": [{...}, ...], ...}`
    pub fn from_json(document: Value) -> Result<Self> {
        let Value::Object(tables) = document else {
            return Err(DataError::InvalidConfiguration(
                "dataset must be an object of model name to rows".into(),
            ));
        };

        let mut source = Self::new();
        for (model, rows) in tables {
            let Value::Array(rows) = rows else {
                return Err(DataError::InvalidConfiguration(format!(
                    "rows for {} must be an array",
                    model
                )));
            };
            let rows = rows
                .into_iter()
                .map(|row| match row {
                    Value::Object(row) => Ok(row),
                    other => Err(DataError::InvalidConfiguration(format!(
                        "row in {} is not an object: {}",
                        model, other
                    ))),
                })
                .collect::<Result<Vec<_>>>()?;
            source = source.with_rows(model, rows);
        }
        Ok(source)
    }

    /// Number of cursors handed out and not yet dropped
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    fn table(&self, model: &str) -> Result<Arc<Vec<DataRow>>> {
        self.tables
            .get(model)
            .cloned()
            .ok_or_else(|| DataError::not_found(format!("No table for model {}", model)))
    }

    fn check_raw(&self, expr: &QueryExpression) -> Result<()> {
        if expr.raw.is_some() {
            return Err(DataError::operation_not_supported(
                "raw filters cannot be evaluated in memory",
            ));
        }
        Ok(())
    }

    /// Root rows with every join applied
    fn joined_rows(&self, expr: &QueryExpression) -> Result<Vec<DataRow>> {
        let graph = expr.graph();
        let mut rows = self.table(graph.root.name)?.as_ref().clone();
        for spec in &graph.joins {
            let children = self.table(spec.to_model)?;
            let schema = &graph
                .model(spec.to_model)
                .ok_or_else(|| {
                    DataError::Internal(format!("{} missing from join graph", spec.to_model))
                })?
                .schema;
            rows = join(rows, &children, spec, schema);
        }
        Ok(rows)
    }

    fn matching_rows(&self, expr: &QueryExpression) -> Result<Vec<DataRow>> {
        self.check_raw(expr)?;
        Ok(filter_and_sort(self.joined_rows(expr)?, expr))
    }
}

#[async_trait]
impl QueryDataSource for MemorySource {
    fn source_type(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::InMemory, Capability::Joins, Capability::Aggregates]
    }

    async fn get_data_source(&self, expr: &QueryExpression) -> Result<RowStream> {
        self.check_raw(expr)?;
        let model = expr.model();

        // Without joins or ordering the table is filtered lazily as the cursor is pulled
        if !expr.graph().has_joins() && expr.order_by.is_empty() {
            let table = self.table(model)?;
            let filter = expr.clone();
            let rows = (0..table.len()).filter_map(move |i| {
                let row = &table[i];
                filter.matches(row).then(|| row.clone())
            });
            return Ok(Box::pin(Cursor::new(model, rows, self.open_cursors.clone())));
        }

        let rows = self.matching_rows(expr)?;
        Ok(Box::pin(Cursor::new(
            model,
            rows.into_iter(),
            self.open_cursors.clone(),
        )))
    }

    async fn count(&self, expr: &QueryExpression) -> Result<u64> {
        self.check_raw(expr)?;
        let count = if expr.graph().has_joins() {
            self.joined_rows(expr)?
                .iter()
                .filter(|row| expr.matches(row))
                .count()
        } else {
            self.table(expr.model())?
                .iter()
                .filter(|row| expr.matches(row))
                .count()
        };
        Ok(count as u64)
    }

    async fn select_aggregate(
        &self,
        expr: &QueryExpression,
        aggregate: &Aggregate,
    ) -> Result<Option<Value>> {
        let rows = self.matching_rows(expr)?;
        Ok(aggregate.compute(&rows))
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing memory source ({} open cursors)", self.open_cursors());
        Ok(())
    }
}
