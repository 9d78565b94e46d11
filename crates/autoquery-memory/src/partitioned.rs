use crate::cursor::Cursor;
use crate::rows::{sort, to_rows};
use async_trait::async_trait;
use autoquery::value::hash_key;
use autoquery::{
    plan_key_conditions, Capability, DataError, DataRow, KeyConditionPlan, KeySchema, Model,
    OrderByField, QueryDataSource, QueryExpression, Result, RowStream,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

struct PartitionedTable {
    keys: KeySchema,
    /// Rows grouped by hash key, each partition sorted by range key
    partitions: BTreeMap<String, Vec<DataRow>>,
}

/// In-memory data source with a hash/range key model.
///
/// Only key conditions are answered natively; other conditions run as
/// post-filters when the key schema allows them, and anything else fails
/// with `OperationNotSupported` instead of being dropped.
#[derive(Default)]
pub struct PartitionedMemorySource {
    tables: HashMap<String, PartitionedTable>,
    open_cursors: Arc<AtomicUsize>,
}

impl PartitionedMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<M: Model>(mut self, keys: KeySchema, items: &[M]) -> Result<Self> {
        let mut partitions: BTreeMap<String, Vec<DataRow>> = BTreeMap::new();
        for row in to_rows(items)? {
            let hash = row
                .get(&keys.hash_key)
                .and_then(hash_key)
                .ok_or_else(|| {
                    DataError::InvalidArgument(format!(
                        "{} row is missing hash key {}",
                        M::model_name(),
                        keys.hash_key
                    ))
                })?;
            partitions.entry(hash).or_default().push(row);
        }

        if let Some(range_key) = &keys.range_key {
            let order = [OrderByField {
                field: autoquery::FieldRef::root(M::model_name(), range_key.clone()),
                descending: false,
            }];
            for rows in partitions.values_mut() {
                sort(rows, &order);
            }
        }

        debug!(
            "Loaded {} partitions into {}",
            partitions.len(),
            M::model_name()
        );
        self.tables.insert(
            M::model_name().to_string(),
            PartitionedTable { keys, partitions },
        );
        Ok(self)
    }

    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn table(&self, model: &str) -> Result<&PartitionedTable> {
        self.tables
            .get(model)
            .ok_or_else(|| DataError::not_found(format!("No table for model {}", model)))
    }

    fn check_order(table: &PartitionedTable, expr: &QueryExpression) -> Result<()> {
        for order in &expr.order_by {
            let field = &order.field.field;
            let is_key = field.eq_ignore_ascii_case(&table.keys.hash_key)
                || table
                    .keys
                    .range_key
                    .as_deref()
                    .is_some_and(|r| field.eq_ignore_ascii_case(r));
            if !is_key {
                return Err(DataError::operation_not_supported(format!(
                    "ordering by {} is not supported; order by the hash or range key",
                    field
                )));
            }
        }
        Ok(())
    }

    fn query(&self, expr: &QueryExpression) -> Result<Vec<DataRow>> {
        let table = self.table(expr.model())?;
        let plan = plan_key_conditions(expr, &table.keys)?;
        Self::check_order(table, expr)?;

        let candidates: Vec<&DataRow> = match &plan.hash_condition {
            Some(hash) => hash
                .value
                .first()
                .and_then(hash_key)
                .and_then(|key| table.partitions.get(&key))
                .map(|rows| rows.iter().collect())
                .unwrap_or_default(),
            None => {
                debug!("Scanning every partition of {}", expr.model());
                table.partitions.values().flatten().collect()
            }
        };

        let mut rows: Vec<DataRow> = candidates
            .into_iter()
            .filter(|row| Self::key_match(&plan, row) && plan.post_filter_matches(row))
            .cloned()
            .collect();
        sort(&mut rows, &expr.order_by);
        Ok(rows)
    }

    fn key_match(plan: &KeyConditionPlan, row: &DataRow) -> bool {
        plan.range_condition.as_ref().map_or(true, |c| c.matches(row))
    }
}

#[async_trait]
impl QueryDataSource for PartitionedMemorySource {
    fn source_type(&self) -> &'static str {
        "memory-partitioned"
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::KeyValue, Capability::InMemory]
    }

    fn key_schema(&self, model: &str) -> Option<KeySchema> {
        self.tables.get(model).map(|t| t.keys.clone())
    }

    async fn get_data_source(&self, expr: &QueryExpression) -> Result<RowStream> {
        let rows = self.query(expr)?;
        Ok(Box::pin(Cursor::new(
            expr.model(),
            rows.into_iter(),
            self.open_cursors.clone(),
        )))
    }

    async fn count(&self, expr: &QueryExpression) -> Result<u64> {
        Ok(self.query(expr)?.len() as u64)
    }
}
