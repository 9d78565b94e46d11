//! Row helpers shared by the in-memory sources: loading, joining and sorting.

use autoquery::value::{hash_key, sort_cmp};
use autoquery::{
    DataError, DataRow, DatasetSchema, JoinKind, JoinSpec, Model, OrderByField, QueryExpression,
    Result,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Serialize model instances into rows
pub fn to_rows<M: Model>(items: &[M]) -> Result<Vec<DataRow>> {
    items
        .iter()
        .map(|item| match serde_json::to_value(item)? {
            Value::Object(row) => Ok(row),
            other => Err(DataError::SerializationError(format!(
                "{} rows must serialize to objects, got {}",
                M::model_name(),
                other
            ))),
        })
        .collect()
}

fn merge_child(
    parent: &DataRow,
    child: Option<&DataRow>,
    model: &str,
    schema: &DatasetSchema,
) -> DataRow {
    let mut row = parent.clone();
    for field in &schema.fields {
        let value = child
            .and_then(|c| c.get(&field.name))
            .cloned()
            .unwrap_or(Value::Null);
        if !row.contains_key(&field.name) {
            row.insert(field.name.clone(), value.clone());
        }
        row.insert(format!("{}{}", model, field.name), value);
    }
    row
}

/// Apply one join edge. Child columns are added as `{Model}{Field}` and, when
/// the name is free, as the bare field name. Left joins keep unmatched
/// parents with null child columns.
pub fn join(
    rows: Vec<DataRow>,
    children: &[DataRow],
    spec: &JoinSpec,
    schema: &DatasetSchema,
) -> Vec<DataRow> {
    let mut index: HashMap<String, Vec<&DataRow>> = HashMap::new();
    for child in children {
        if let Some(key) = child.get(&spec.to_field).and_then(hash_key) {
            index.entry(key).or_default().push(child);
        }
    }

    let from_key = spec.from_field.key();
    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = row
            .get(&from_key)
            .and_then(hash_key)
            .and_then(|key| index.get(&key));
        match matches {
            Some(children) => {
                for child in children {
                    joined.push(merge_child(&row, Some(child), spec.to_model, schema));
                }
            }
            None if spec.kind == JoinKind::Left => {
                joined.push(merge_child(&row, None, spec.to_model, schema));
            }
            None => {}
        }
    }

    debug!(
        "{} {} produced {} rows",
        spec.kind,
        spec.to_model,
        joined.len()
    );
    joined
}

/// Stable multi-column sort; earlier columns take precedence
pub fn sort(rows: &mut [DataRow], order_by: &[OrderByField]) {
    if order_by.is_empty() {
        return;
    }
    let keys: Vec<(String, bool)> = order_by
        .iter()
        .map(|o| (o.field.key(), o.descending))
        .collect();
    rows.sort_by(|a, b| {
        for (key, descending) in &keys {
            let left = a.get(key).unwrap_or(&Value::Null);
            let right = b.get(key).unwrap_or(&Value::Null);
            let ordering = sort_cmp(left, right);
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Rows matching the expression, in its order
pub fn filter_and_sort(rows: Vec<DataRow>, expr: &QueryExpression) -> Vec<DataRow> {
    let mut rows: Vec<DataRow> = rows.into_iter().filter(|row| expr.matches(row)).collect();
    sort(&mut rows, &expr.order_by);
    rows
}
