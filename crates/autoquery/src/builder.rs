//! Binds live request values onto resolved field specs.

use crate::aggregate::parse_include;
use crate::config::AutoQueryConfig;
use crate::convention::{resolve_property, QueryFieldSpec};
use crate::error::{DataError, Result};
use crate::expression::{Condition, Operator, OrderByField, QueryExpression, RawFilter, Term};
use crate::model::QueryBase;
use crate::value::{as_text, coerce_param};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const RAW_SELECT: &str = "_select";
const RAW_FROM: &str = "_from";
const RAW_WHERE: &str = "_where";
const RAW_ORDER_BY: &str = "_orderBy";

fn is_raw_key(key: &str) -> bool {
    [RAW_SELECT, RAW_FROM, RAW_WHERE, RAW_ORDER_BY]
        .iter()
        .any(|k| k.eq_ignore_ascii_case(key))
}

/// A value is "default" when it is null, empty, or equal to the value the
/// property has on the request type's `Default` instance.
pub fn is_default_value(value: Option<&Value>, default: Option<&Value>) -> bool {
    let Some(value) = value else {
        return true;
    };
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };
    empty || default == Some(value)
}

/// Turn a spec and a live value into a condition
pub fn bind_condition(spec: &QueryFieldSpec, value: Value) -> Result<Condition> {
    let operator = match (&value, spec.explicit_operator) {
        (Value::Array(_), false) => Operator::In,
        _ => spec.operator,
    };

    let value = if spec.value_format.is_some() {
        let format = |v: Value| match as_text(&v) {
            Some(text) => Value::String(spec.format_value(&text)),
            None => v,
        };
        match value {
            Value::Array(values) => Value::Array(values.into_iter().map(format).collect()),
            other => format(other),
        }
    } else {
        value
    };

    let condition = Condition::new(spec.field.clone(), operator, spec.term, value)?;
    Ok(match &spec.template {
        Some(template) => condition.with_template(template.clone()),
        None => condition,
    })
}

/// Bind typed request values, in property declaration order
pub fn bind_typed(
    expr: &mut QueryExpression,
    specs: &[QueryFieldSpec],
    unmapped: &[String],
    values: &Map<String, Value>,
    defaults: &Map<String, Value>,
    strict: bool,
) -> Result<()> {
    for spec in specs {
        let value = values.get(&spec.property);
        if is_default_value(value, defaults.get(&spec.property)) {
            continue;
        }
        if let Some(value) = value {
            expr.push(bind_condition(spec, value.clone())?);
        }
    }

    for property in unmapped {
        if is_default_value(values.get(property), defaults.get(property)) {
            continue;
        }
        if strict {
            return Err(DataError::InvalidArgument(format!(
                "Property {} does not map to any field of {}",
                property,
                expr.model()
            )));
        }
        debug!("Ignoring value of unmapped property {}", property);
    }
    Ok(())
}

fn coerce_untyped(spec: &QueryFieldSpec, raw: &str) -> Result<Value> {
    if spec.operator.is_multi_valued() {
        let values = raw
            .split(',')
            .map(|part| coerce_param(part, spec.field_type))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(values))
    } else {
        coerce_param(raw, spec.field_type)
    }
}

/// Resolve and bind raw query-string params that are not typed properties.
/// Keys are processed in sorted order. Raw filter keys are collected into a
/// [`RawFilter`] only when enabled.
pub fn bind_untyped(
    expr: &mut QueryExpression,
    raw_params: &HashMap<String, String>,
    typed_properties: &[String],
    default_term: Term,
    config: &AutoQueryConfig,
) -> Result<()> {
    let mut keys: Vec<&String> = raw_params.keys().collect();
    keys.sort();

    let mut raw = RawFilter::default();
    for key in keys {
        let value = &raw_params[key];
        if is_raw_key(key) {
            if !config.enable_raw_filters {
                warn!("Ignoring raw filter {}: raw filters are disabled", key);
                continue;
            }
            let slot = match key.to_ascii_lowercase().as_str() {
                "_select" => &mut raw.select,
                "_from" => &mut raw.from,
                "_where" => &mut raw.where_clause,
                _ => &mut raw.order_by,
            };
            *slot = Some(value.clone());
            continue;
        }

        if !config.enable_untyped_queries
            || value.is_empty()
            || typed_properties.iter().any(|p| p.eq_ignore_ascii_case(key))
        {
            continue;
        }

        let spec = resolve_property(
            expr.graph(),
            key,
            None,
            default_term,
            &config.ignore_properties,
        )?;
        match spec {
            Some(spec) => {
                let value = coerce_untyped(&spec, value)?;
                expr.push(bind_condition(&spec, value)?);
            }
            None if config.strict
                && !config
                    .ignore_properties
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(key)) =>
            {
                return Err(DataError::InvalidArgument(format!(
                    "Query param {} does not map to any field of {}",
                    key,
                    expr.model()
                )));
            }
            None => debug!("Ignoring untyped param {}", key),
        }
    }

    if !raw.is_empty() {
        expr.raw = Some(raw);
    }
    Ok(())
}

fn parse_columns(
    expr: &QueryExpression,
    list: &str,
    descending: bool,
    strict: bool,
) -> Result<Vec<OrderByField>> {
    let mut fields = Vec::new();
    for column in list.split([',', ';']) {
        let column = column.trim();
        if column.is_empty() {
            continue;
        }
        let (reverse, name) = match column.strip_prefix('-') {
            Some(name) => (true, name.trim()),
            None => (false, column),
        };
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(DataError::InvalidArgument(format!(
                "Invalid OrderBy column '{}'",
                column
            )));
        }
        match expr.graph().first_matching_field(name) {
            Some((field, _)) => fields.push(OrderByField {
                field,
                descending: descending != reverse,
            }),
            None if strict => {
                return Err(DataError::InvalidArgument(format!(
                    "Unknown OrderBy column '{}'",
                    name
                )))
            }
            None => debug!("Ignoring unknown OrderBy column {}", name),
        }
    }
    Ok(fields)
}

/// Apply `OrderBy`, `OrderByDesc`, `Fields` and `Include` from the request
pub fn apply_base(expr: &mut QueryExpression, base: &QueryBase, strict: bool) -> Result<()> {
    if let Some(order_by) = &base.order_by {
        let fields = parse_columns(expr, order_by, false, strict)?;
        expr.order_by.extend(fields);
    }
    if let Some(order_by_desc) = &base.order_by_desc {
        let fields = parse_columns(expr, order_by_desc, true, strict)?;
        expr.order_by.extend(fields);
    }

    if let Some(fields) = &base.fields {
        for name in fields.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match expr.graph().first_matching_field(name) {
                Some((field, _)) => {
                    let key = field.key();
                    if !expr.select_columns.contains(&key) {
                        expr.select_columns.push(key);
                    }
                }
                None => debug!("Ignoring unknown field {} in Fields", name),
            }
        }
    }

    if let Some(include) = &base.include {
        let aggregates = parse_include(include, expr.graph());
        expr.aggregates.extend(aggregates);
    }
    Ok(())
}
