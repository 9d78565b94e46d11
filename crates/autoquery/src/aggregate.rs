//! Aggregates requested through `Include`, reported in the envelope's `meta`.

use crate::join::{FieldRef, JoinGraph};
use crate::types::DataRow;
use crate::value::{hash_key, sort_cmp};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum AggregateFn {
    Count,
    Min,
    Max,
    Sum,
    Avg,
    First,
    Last,
}

impl AggregateFn {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFn::Count),
            "MIN" => Some(AggregateFn::Min),
            "MAX" => Some(AggregateFn::Max),
            "SUM" => Some(AggregateFn::Sum),
            "AVG" => Some(AggregateFn::Avg),
            "FIRST" => Some(AggregateFn::First),
            "LAST" => Some(AggregateFn::Last),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub function: AggregateFn,
    /// `None` for `*`
    pub field: Option<FieldRef>,
    pub distinct: bool,
    /// Key in `meta`: the `as` alias, else the expression as written
    pub alias: String,
}

impl Aggregate {
    /// Evaluate over the filtered rows, in result order
    pub fn compute(&self, rows: &[DataRow]) -> Option<Value> {
        let values: Vec<&Value> = match &self.field {
            None => return Some(Value::from(rows.len() as u64)),
            Some(field) => {
                let key = field.key();
                rows.iter()
                    .map(|row| row.get(&key).unwrap_or(&Value::Null))
                    .collect()
            }
        };

        match self.function {
            AggregateFn::First => values.first().map(|v| (*v).clone()),
            AggregateFn::Last => values.last().map(|v| (*v).clone()),
            AggregateFn::Count => {
                let live = values.iter().filter(|v| !v.is_null());
                let count = if self.distinct {
                    live.filter_map(|v| hash_key(v)).collect::<HashSet<_>>().len()
                } else {
                    live.count()
                };
                Some(Value::from(count as u64))
            }
            AggregateFn::Min => values
                .into_iter()
                .filter(|v| !v.is_null())
                .min_by(|a, b| sort_cmp(a, b))
                .cloned(),
            AggregateFn::Max => values
                .into_iter()
                .filter(|v| !v.is_null())
                .max_by(|a, b| sort_cmp(a, b))
                .cloned(),
            AggregateFn::Sum | AggregateFn::Avg => {
                let numbers: Vec<&Value> = values.into_iter().filter(|v| v.is_number()).collect();
                if numbers.is_empty() {
                    return Some(Value::Null);
                }
                if self.function == AggregateFn::Sum && numbers.iter().all(|n| n.is_i64()) {
                    let sum = numbers
                        .iter()
                        .filter_map(|n| n.as_i64())
                        .try_fold(0i64, |acc, n| acc.checked_add(n));
                    // Overflowing integer sums fall through to f64
                    if let Some(sum) = sum {
                        return Some(Value::from(sum));
                    }
                }
                let sum: f64 = numbers.iter().filter_map(|n| n.as_f64()).sum();
                let result = if self.function == AggregateFn::Avg {
                    sum / numbers.len() as f64
                } else {
                    sum
                };
                serde_json::Number::from_f64(result).map(Value::Number)
            }
        }
    }
}

/// Text form stored in `meta`
pub fn meta_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn split_top_level(include: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in include.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&include[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&include[start..]);
    parts
}

/// Parse an `Include` list such as `Total, COUNT(*), MAX(Age) as Oldest`.
///
/// `Total` is always reported in the envelope and is accepted as a no-op.
/// Unknown functions and fields are skipped.
pub fn parse_include(include: &str, graph: &JoinGraph) -> Vec<Aggregate> {
    let mut aggregates = Vec::new();

    for item in split_top_level(include) {
        let item = item.trim();
        if item.is_empty() || item.eq_ignore_ascii_case("total") {
            continue;
        }

        let (expr, alias) = match item.to_ascii_lowercase().rfind(" as ") {
            Some(pos) => (item[..pos].trim(), Some(item[pos + 4..].trim())),
            None => (item, None),
        };

        let Some((name, rest)) = expr.split_once('(') else {
            debug!("Ignoring include item without arguments: {}", item);
            continue;
        };
        let Some(function) = AggregateFn::parse(name) else {
            debug!("Ignoring unknown aggregate: {}", item);
            continue;
        };
        let arg = rest.trim_end().trim_end_matches(')').trim();
        let (distinct, arg) = match arg.get(..9) {
            Some(prefix) if prefix.eq_ignore_ascii_case("distinct ") => (true, arg[9..].trim()),
            _ => (false, arg),
        };

        let field = if arg == "*" {
            if function != AggregateFn::Count {
                debug!("Ignoring {} over *", item);
                continue;
            }
            None
        } else {
            match graph.first_matching_field(arg) {
                Some((field, _)) => Some(field),
                None => {
                    debug!("Ignoring aggregate over unknown field: {}", item);
                    continue;
                }
            }
        };

        aggregates.push(Aggregate {
            function,
            field,
            distinct,
            alias: alias.filter(|a| !a.is_empty()).unwrap_or(expr).to_string(),
        });
    }

    aggregates
}
