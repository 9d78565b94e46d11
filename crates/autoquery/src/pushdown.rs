//! Splits a compiled expression into native key conditions and post-filters
//! for partition/range keyed backends.

use crate::error::{DataError, Result};
use crate::expression::{Condition, Operator, QueryExpression, Term};
use crate::types::DataRow;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Operators a range key accepts as a native key condition
pub const RANGE_KEY_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::Greater,
    Operator::GreaterOrEqual,
    Operator::Less,
    Operator::LessOrEqual,
    Operator::StartsWith,
    Operator::Between,
];

/// Hash/range key layout of a partitioned model and what it can filter on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySchema {
    pub hash_key: String,
    pub range_key: Option<String>,
    /// Operators the backend evaluates as post-filters after the key lookup
    pub post_filter_operators: Vec<Operator>,
    /// Whether a query without a hash key condition may scan the whole table
    pub allow_scan: bool,
}

impl KeySchema {
    pub fn new(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
            post_filter_operators: vec![
                Operator::Equals,
                Operator::NotEqual,
                Operator::Greater,
                Operator::GreaterOrEqual,
                Operator::Less,
                Operator::LessOrEqual,
                Operator::StartsWith,
                Operator::Contains,
                Operator::In,
                Operator::Between,
            ],
            allow_scan: false,
        }
    }

    pub fn with_range_key(mut self, range_key: impl Into<String>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    pub fn with_post_filter_operators(mut self, operators: Vec<Operator>) -> Self {
        self.post_filter_operators = operators;
        self
    }

    pub fn with_scan(mut self, allow_scan: bool) -> Self {
        self.allow_scan = allow_scan;
        self
    }

    fn can_post_filter(&self, operator: Operator) -> bool {
        self.post_filter_operators.contains(&operator)
    }
}

/// Result of planning an expression against a [`KeySchema`]
#[derive(Debug, Clone, Default)]
pub struct KeyConditionPlan {
    pub hash_condition: Option<Condition>,
    pub range_condition: Option<Condition>,
    /// Remaining `And` conditions and the whole `Or` group
    pub post_filters: Vec<Condition>,
}

impl KeyConditionPlan {
    pub fn is_scan(&self) -> bool {
        self.hash_condition.is_none()
    }

    /// Evaluate the post-filters with the same And/Or semantics as the expression
    pub fn post_filter_matches(&self, row: &DataRow) -> bool {
        let mut any_or = false;
        let mut or_matched = false;
        for condition in &self.post_filters {
            match condition.term {
                Term::And if !condition.matches(row) => return false,
                Term::And => {}
                Term::Or => {
                    any_or = true;
                    or_matched = or_matched || condition.matches(row);
                }
            }
        }
        !any_or || or_matched
    }
}

fn not_supported(condition: &Condition, why: &str) -> DataError {
    DataError::OperationNotSupported(format!(
        "operator combination not supported: {} on {} {}",
        condition.operator, condition.field, why
    ))
}

/// Plan key conditions. The hash key takes one `Equals`, the range key takes
/// one operator from [`RANGE_KEY_OPERATORS`]; everything else must be a
/// supported post-filter, or planning fails instead of dropping conditions.
pub fn plan_key_conditions(expr: &QueryExpression, schema: &KeySchema) -> Result<KeyConditionPlan> {
    if !expr.joins().is_empty() {
        return Err(DataError::OperationNotSupported(format!(
            "joins are not supported on partitioned model {}",
            expr.model()
        )));
    }
    if expr.raw.as_ref().is_some_and(|raw| !raw.is_empty()) {
        return Err(DataError::OperationNotSupported(
            "raw filters are not supported by key condition backends".into(),
        ));
    }

    let mut plan = KeyConditionPlan::default();
    let is_key = |condition: &Condition, key: &str| {
        condition.field.root && condition.field.field.eq_ignore_ascii_case(key)
    };

    for condition in expr.and_conditions() {
        if plan.hash_condition.is_none()
            && condition.operator == Operator::Equals
            && is_key(condition, &schema.hash_key)
        {
            plan.hash_condition = Some(condition.clone());
            continue;
        }
        if let Some(range_key) = &schema.range_key {
            if plan.range_condition.is_none()
                && RANGE_KEY_OPERATORS.contains(&condition.operator)
                && is_key(condition, range_key)
            {
                plan.range_condition = Some(condition.clone());
                continue;
            }
        }
        if !schema.can_post_filter(condition.operator) {
            return Err(not_supported(condition, "cannot be a key condition or post-filter"));
        }
        plan.post_filters.push(condition.clone());
    }

    for condition in expr.or_conditions() {
        if !schema.can_post_filter(condition.operator) {
            return Err(not_supported(condition, "cannot be evaluated inside an OR group"));
        }
        plan.post_filters.push(condition.clone());
    }

    if plan.hash_condition.is_none() && !schema.allow_scan {
        return Err(DataError::OperationNotSupported(format!(
            "query on {} requires an Equals condition on hash key {}",
            expr.model(),
            schema.hash_key
        )));
    }

    debug!(
        "Planned {}: hash={} range={} post_filters={}",
        expr.model(),
        plan.hash_condition.is_some(),
        plan.range_condition.is_some(),
        plan.post_filters.len()
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinGraph;
    use crate::model::ModelInfo;
    use crate::types::{DatasetSchema, FieldType};
    use serde_json::json;
    use std::sync::Arc;

    fn expr() -> QueryExpression {
        QueryExpression::new(Arc::new(JoinGraph::single(ModelInfo {
            name: "Order",
            schema: DatasetSchema::new()
                .field("CustomerId", FieldType::String)
                .field("OrderDate", FieldType::Date)
                .field("Status", FieldType::String)
                .field("Total", FieldType::Float64),
        })))
    }

    fn schema() -> KeySchema {
        KeySchema::new("CustomerId").with_range_key("OrderDate")
    }

    #[test]
    fn test_pushes_key_conditions_down() {
        let mut e = expr();
        e.and("CustomerId", Operator::Equals, json!("c1")).unwrap();
        e.and("OrderDate", Operator::GreaterOrEqual, json!("2024-01-01")).unwrap();
        e.and("OrderDate", Operator::Less, json!("2024-02-01")).unwrap();
        e.and("Status", Operator::NotEqual, json!("void")).unwrap();

        let plan = plan_key_conditions(&e, &schema()).unwrap();
        assert!(plan.hash_condition.is_some());
        assert_eq!(
            plan.range_condition.as_ref().map(|c| c.operator),
            Some(Operator::GreaterOrEqual)
        );
        assert_eq!(plan.post_filters.len(), 2);
    }

    #[test]
    fn test_unsupported_operator_fails_fast() {
        let mut e = expr();
        e.and("CustomerId", Operator::Equals, json!("c1")).unwrap();
        e.and("Status", Operator::EndsWith, json!("ed")).unwrap();

        let err = plan_key_conditions(&e, &schema()).unwrap_err();
        assert!(matches!(err, DataError::OperationNotSupported(ref m) if m.contains("operator combination not supported")));
    }

    #[test]
    fn test_or_group_with_unsupported_operator_fails() {
        let mut e = expr();
        e.and("CustomerId", Operator::Equals, json!("c1")).unwrap();
        e.or("Status", Operator::Equals, json!("open")).unwrap();
        e.or("Status", Operator::Like, json!("%ship%")).unwrap();

        let err = plan_key_conditions(&e, &schema()).unwrap_err();
        assert!(matches!(err, DataError::OperationNotSupported(_)));
    }

    #[test]
    fn test_missing_hash_key_requires_scan() {
        let mut e = expr();
        e.and("Status", Operator::Equals, json!("open")).unwrap();
        assert!(plan_key_conditions(&e, &schema()).is_err());

        let plan = plan_key_conditions(&e, &schema().with_scan(true)).unwrap();
        assert!(plan.is_scan());
        assert_eq!(plan.post_filters.len(), 1);
    }

    #[test]
    fn test_post_filter_or_semantics() {
        let mut e = expr();
        e.and("CustomerId", Operator::Equals, json!("c1")).unwrap();
        e.or("Status", Operator::Equals, json!("open")).unwrap();
        e.or("Total", Operator::Greater, json!(100)).unwrap();
        let plan = plan_key_conditions(&e, &schema()).unwrap();

        let row = |status: &str, total: f64| match json!({"CustomerId": "c1", "Status": status, "Total": total}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(plan.post_filter_matches(&row("open", 5.0)));
        assert!(plan.post_filter_matches(&row("closed", 500.0)));
        assert!(!plan.post_filter_matches(&row("closed", 5.0)));
    }
}
