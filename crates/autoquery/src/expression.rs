//! The backend-agnostic query AST compiled from a request.

use crate::aggregate::Aggregate;
use crate::error::{DataError, Result};
use crate::join::{FieldRef, JoinGraph, JoinSpec};
use crate::types::DataRow;
use crate::value::{as_text, compare_values, like_match, values_equal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Which logical group a condition belongs to
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum Term {
    #[default]
    And,
    Or,
}

/// Comparison operators a condition can apply
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    In,
    Between,
    /// `%` / `_` wildcard match, case-insensitive
    Like,
    CaseInsensitiveEqual,
}

impl Operator {
    pub fn alias(&self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::NotEqual => "NotEqual",
            Operator::Greater => "Greater",
            Operator::GreaterOrEqual => "GreaterOrEqual",
            Operator::Less => "Less",
            Operator::LessOrEqual => "LessOrEqual",
            Operator::StartsWith => "StartsWith",
            Operator::EndsWith => "EndsWith",
            Operator::Contains => "Contains",
            Operator::In => "In",
            Operator::Between => "Between",
            Operator::Like => "Like",
            Operator::CaseInsensitiveEqual => "CaseInsensitiveEqual",
        }
    }

    /// Parse an operand symbol or alias as used in explicit field metadata
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol.trim() {
            "=" | "==" => Operator::Equals,
            "!=" | "<>" => Operator::NotEqual,
            ">" => Operator::Greater,
            ">=" => Operator::GreaterOrEqual,
            "<" => Operator::Less,
            "<=" => Operator::LessOrEqual,
            other => {
                return [
                    Operator::Equals,
                    Operator::NotEqual,
                    Operator::Greater,
                    Operator::GreaterOrEqual,
                    Operator::Less,
                    Operator::LessOrEqual,
                    Operator::StartsWith,
                    Operator::EndsWith,
                    Operator::Contains,
                    Operator::In,
                    Operator::Between,
                    Operator::Like,
                    Operator::CaseInsensitiveEqual,
                ]
                .into_iter()
                .find(|op| op.alias().eq_ignore_ascii_case(other))
            }
        };
        Some(op)
    }

    /// Operators that take a list of values
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Operator::In | Operator::Between)
    }

    /// Query text used when a condition has no explicit template
    pub fn default_template(&self) -> &'static str {
        match self {
            Operator::Equals => "{Field} = {Value}",
            Operator::NotEqual => "{Field} <> {Value}",
            Operator::Greater => "{Field} > {Value}",
            Operator::GreaterOrEqual => "{Field} >= {Value}",
            Operator::Less => "{Field} < {Value}",
            Operator::LessOrEqual => "{Field} <= {Value}",
            Operator::StartsWith => "{Field} LIKE {Value} || '%'",
            Operator::EndsWith => "{Field} LIKE '%' || {Value}",
            Operator::Contains => "{Field} LIKE '%' || {Value} || '%'",
            Operator::In => "{Field} IN ({Values})",
            Operator::Between => "{Field} BETWEEN {Value1} AND {Value2}",
            Operator::Like => "UPPER({Field}) LIKE UPPER({Value})",
            Operator::CaseInsensitiveEqual => "UPPER({Field}) = UPPER({Value})",
        }
    }

    /// Evaluate this operator against a row value. Null row values never match.
    pub fn evaluate(&self, actual: &Value, value: &ConditionValue) -> bool {
        if actual.is_null() {
            return false;
        }
        let expected = value.first().and_then(as_text);
        let text_op = |f: fn(&str, &str) -> bool| match (as_text(actual), expected.as_deref()) {
            (Some(a), Some(v)) => f(&a.to_lowercase(), &v.to_lowercase()),
            _ => false,
        };

        match self {
            Operator::Equals => value.first().is_some_and(|v| values_equal(actual, v)),
            Operator::NotEqual => value.first().is_some_and(|v| !values_equal(actual, v)),
            Operator::Greater => ordered(actual, value, |o| o == Ordering::Greater),
            Operator::GreaterOrEqual => ordered(actual, value, |o| o != Ordering::Less),
            Operator::Less => ordered(actual, value, |o| o == Ordering::Less),
            Operator::LessOrEqual => ordered(actual, value, |o| o != Ordering::Greater),
            Operator::StartsWith => text_op(|a, v| a.starts_with(v)),
            Operator::EndsWith => text_op(|a, v| a.ends_with(v)),
            Operator::Contains => text_op(|a, v| a.contains(v)),
            Operator::CaseInsensitiveEqual => text_op(|a, v| a == v),
            Operator::Like => text_op(|a, v| like_match(v, a)),
            Operator::In => value.values().iter().any(|v| values_equal(actual, v)),
            Operator::Between => match value.values() {
                [low, high] => {
                    matches!(
                        compare_values(actual, low),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(
                        compare_values(actual, high),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                }
                _ => false,
            },
        }
    }
}

fn ordered(actual: &Value, value: &ConditionValue, accept: fn(Ordering) -> bool) -> bool {
    value
        .first()
        .and_then(|v| compare_values(actual, v))
        .is_some_and(accept)
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

/// Bound parameter(s) of a condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(Value),
    Many(Vec<Value>),
}

impl ConditionValue {
    pub fn first(&self) -> Option<&Value> {
        match self {
            ConditionValue::Single(v) => Some(v),
            ConditionValue::Many(values) => values.first(),
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            ConditionValue::Single(v) => std::slice::from_ref(v),
            ConditionValue::Many(values) => values,
        }
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => ConditionValue::Many(values),
            other => ConditionValue::Single(other),
        }
    }
}

impl From<Vec<Value>> for ConditionValue {
    fn from(values: Vec<Value>) -> Self {
        ConditionValue::Many(values)
    }
}

/// Rendered query text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A field predicate bound to a live value
#[derive(Debug, Clone, Serialize)]
pub struct Condition {
    pub field: FieldRef,
    pub operator: Operator,
    pub term: Term,
    pub value: ConditionValue,
    /// Explicit query text with `{Field}` / `{Value}` placeholders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Condition {
    /// Build a condition, normalizing the value to the operator's arity
    pub fn new(
        field: FieldRef,
        operator: Operator,
        term: Term,
        value: impl Into<ConditionValue>,
    ) -> Result<Self> {
        let value: ConditionValue = value.into();
        let value = match (operator, value) {
            (Operator::In, ConditionValue::Single(v)) => ConditionValue::Many(vec![v]),
            (Operator::Between, ConditionValue::Many(values)) if values.len() == 2 => {
                ConditionValue::Many(values)
            }
            (Operator::Between, other) => {
                return Err(DataError::InvalidArgument(format!(
                    "Between on {} requires exactly 2 values, got {}",
                    field,
                    other.values().len()
                )))
            }
            (op, ConditionValue::Many(values)) if !op.is_multi_valued() => {
                match <[Value; 1]>::try_from(values) {
                    Ok([single]) => ConditionValue::Single(single),
                    Err(values) => {
                        return Err(DataError::InvalidArgument(format!(
                            "{} on {} takes a single value, got {}",
                            op,
                            field,
                            values.len()
                        )))
                    }
                }
            }
            (_, value) => value,
        };

        Ok(Self {
            field,
            operator,
            term,
            value,
            template: None,
        })
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn matches(&self, row: &DataRow) -> bool {
        let actual = row.get(&self.field.key()).unwrap_or(&Value::Null);
        self.operator.evaluate(actual, &self.value)
    }

    /// Render the template (or the operator's default) with `$n` placeholders
    /// starting at `next_param`. Values never appear in the text.
    pub fn render(&self, next_param: &mut usize) -> BoundFragment {
        let template = self
            .template
            .as_deref()
            .unwrap_or_else(|| self.operator.default_template());
        let mut params = Vec::new();
        let mut placeholder = |value: &Value, params: &mut Vec<Value>| {
            params.push(value.clone());
            let p = format!("${}", *next_param);
            *next_param += 1;
            p
        };

        let mut sql = template.replace("{Field}", &self.field.column());
        let values = self.value.values();
        if sql.contains("{Values}") {
            let list: Vec<String> = values.iter().map(|v| placeholder(v, &mut params)).collect();
            sql = sql.replace("{Values}", &list.join(", "));
        }
        for (i, name) in ["{Value1}", "{Value2}"].into_iter().enumerate() {
            if sql.contains(name) {
                if let Some(v) = values.get(i) {
                    let p = placeholder(v, &mut params);
                    sql = sql.replace(name, &p);
                }
            }
        }
        if sql.contains("{Value}") {
            if let Some(v) = values.first() {
                let p = placeholder(v, &mut params);
                sql = sql.replace("{Value}", &p);
            }
        }

        BoundFragment { sql, params }
    }
}

/// One ordering column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderByField {
    pub field: FieldRef,
    pub descending: bool,
}

/// Raw fragments from the opt-in escape hatch, passed to adapters untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFilter {
    pub select: Option<String>,
    pub from: Option<String>,
    pub where_clause: Option<String>,
    pub order_by: Option<String>,
}

impl RawFilter {
    pub fn is_empty(&self) -> bool {
        self.select.is_none()
            && self.from.is_none()
            && self.where_clause.is_none()
            && self.order_by.is_none()
    }
}

/// Compiled query: filter conditions, joins, ordering, paging and projection.
///
/// Conditions keep the order they were added in. A row matches when every
/// `And` condition holds and, if any `Or` condition exists, at least one of
/// them holds. With no `Or` conditions the result is the `And`-only result.
#[derive(Debug, Clone)]
pub struct QueryExpression {
    graph: Arc<JoinGraph>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderByField>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    /// Row keys to project; empty selects everything
    pub select_columns: Vec<String>,
    pub raw: Option<RawFilter>,
    pub aggregates: Vec<Aggregate>,
}

impl QueryExpression {
    pub fn new(graph: Arc<JoinGraph>) -> Self {
        Self {
            graph,
            conditions: Vec::new(),
            order_by: Vec::new(),
            skip: None,
            take: None,
            select_columns: Vec::new(),
            raw: None,
            aggregates: Vec::new(),
        }
    }

    pub fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    pub fn model(&self) -> &'static str {
        self.graph.root.name
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.graph.joins
    }

    fn resolve_field(&self, name: &str) -> Result<FieldRef> {
        self.graph
            .first_matching_field(name)
            .map(|(field, _)| field)
            .ok_or_else(|| {
                DataError::InvalidArgument(format!(
                    "Unknown field {} on {}",
                    name,
                    self.model()
                ))
            })
    }

    /// Append a condition to the `And` group
    pub fn and(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<ConditionValue>,
    ) -> Result<&mut Self> {
        let field = self.resolve_field(field)?;
        self.conditions
            .push(Condition::new(field, operator, Term::And, value)?);
        Ok(self)
    }

    /// Append a condition to the `Or` group
    pub fn or(
        &mut self,
        field: &str,
        operator: Operator,
        value: impl Into<ConditionValue>,
    ) -> Result<&mut Self> {
        let field = self.resolve_field(field)?;
        self.conditions
            .push(Condition::new(field, operator, Term::Or, value)?);
        Ok(self)
    }

    pub fn push(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    pub fn and_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.term == Term::And)
    }

    pub fn or_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| c.term == Term::Or)
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn matches(&self, row: &DataRow) -> bool {
        if !self.and_conditions().all(|c| c.matches(row)) {
            return false;
        }
        let mut or_group = self.or_conditions().peekable();
        or_group.peek().is_none() || or_group.any(|c| c.matches(row))
    }

    pub fn order_by_field(&mut self, field: &str, descending: bool) -> Result<&mut Self> {
        let field = self.resolve_field(field)?;
        self.order_by.push(OrderByField { field, descending });
        Ok(self)
    }

    /// Order by the root model's primary key, ascending
    pub fn order_by_primary_key(&mut self) -> &mut Self {
        if let Some(pk) = self.graph.root.schema.primary_key_field() {
            let field = FieldRef::root(self.graph.root.name, pk);
            self.order_by.push(OrderByField {
                field,
                descending: false,
            });
        }
        self
    }

    pub fn skip(&mut self, skip: usize) -> &mut Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(&mut self, take: usize) -> &mut Self {
        self.take = Some(take);
        self
    }

    pub fn limit(&mut self, skip: Option<usize>, take: Option<usize>) -> &mut Self {
        self.skip = skip;
        self.take = take;
        self
    }

    pub fn is_paged(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Render the filter as `WHERE` text plus parameters, `And` group first,
    /// then the `Or` group in parentheses.
    pub fn render_where(&self) -> Option<BoundFragment> {
        let mut next = 1usize;
        let mut params = Vec::new();
        let mut parts: Vec<String> = Vec::new();

        for condition in self.and_conditions() {
            let fragment = condition.render(&mut next);
            parts.push(fragment.sql);
            params.extend(fragment.params);
        }
        let or_parts: Vec<String> = self
            .or_conditions()
            .map(|condition| {
                let fragment = condition.render(&mut next);
                params.extend(fragment.params);
                fragment.sql
            })
            .collect();
        if !or_parts.is_empty() {
            parts.push(format!("({})", or_parts.join(" OR ")));
        }

        if parts.is_empty() {
            return None;
        }
        Some(BoundFragment {
            sql: parts.join(" AND "),
            params,
        })
    }
}
