//! Comparison and coercion helpers over `serde_json::Value`.
//!
//! Rows and bound parameters are both carried as JSON values. Numbers compare
//! numerically, and a string that parses as a number compares against a number
//! the way a relational store would after an implicit cast.

use crate::error::{DataError, Result};
use crate::types::FieldType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Compare two values. Returns `None` when either side is null or the values
/// are not comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => as_number(a)?.partial_cmp(&as_number(b)?),
        _ => None,
    }
}

/// Equality with the same coercion rules as [`compare_values`]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Array(_), _) | (Value::Object(_), _) => a == b,
        _ => compare_values(a, b) == Some(Ordering::Equal),
    }
}

/// Total ordering used for sorting: nulls first, then by [`compare_values`],
/// then by type rank so mixed columns still sort deterministically.
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    compare_values(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Text form used by the string operators (StartsWith, Contains, Like...)
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Canonical key for hash indexes, so `1`, `1.0` and `"1"` land in the same bucket
pub fn hash_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some((f as i64).to_string())
            }
            _ => Some(n.to_string()),
        },
        Value::String(s) => match s.parse::<i64>() {
            Ok(i) => Some(i.to_string()),
            Err(_) => Some(s.clone()),
        },
        other => Some(other.to_string()),
    }
}

/// SQL `LIKE` matching, case-insensitive, `%` for any run and `_` for one char
pub fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

/// Coerce a raw query-string value into the JSON representation of `field_type`
pub fn coerce_param(raw: &str, field_type: FieldType) -> Result<Value> {
    let trimmed = raw.trim();
    let invalid = |what: &str| {
        DataError::InvalidArgument(format!("'{}' is not a valid {}", raw, what))
    };

    match field_type {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(invalid("boolean")),
        },
        FieldType::Int32 => trimmed
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| invalid("int32")),
        FieldType::Int64 => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("int64")),
        FieldType::Float64 => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("float64")),
        FieldType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| invalid("date")),
        FieldType::Timestamp => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Value::String(ts.to_rfc3339()));
            }
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
                .map(|ts| Value::String(ts.and_utc().to_rfc3339()))
                .map_err(|_| invalid("timestamp"))
        }
        FieldType::Uuid => Uuid::parse_str(trimmed)
            .map(|u| Value::String(u.hyphenated().to_string()))
            .map_err(|_| invalid("uuid")),
        FieldType::Json => {
            Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_comparison_coerces_strings() {
        assert_eq!(compare_values(&json!(42), &json!(27)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!("42"), &json!(42)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(1.5), &json!(2)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(null), &json!(2)), None);
        assert!(values_equal(&json!(27), &json!(27.0)));
        assert!(!values_equal(&json!("Jimi"), &json!("jimi")));
    }

    #[test]
    fn test_sort_puts_nulls_first() {
        let mut values = vec![json!(3), json!(null), json!(1)];
        values.sort_by(sort_cmp);
        assert_eq!(values, vec![json!(null), json!(1), json!(3)]);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("jim%", "Jimi"));
        assert!(like_match("%rr%", "Kurt Cobain and Jerry"));
        assert!(like_match("J_mi", "jimi"));
        assert!(!like_match("J_mi", "Jimmi"));
        assert!(like_match("%", ""));
        assert!(!like_match("a%b", "acbd"));
    }

    #[test]
    fn test_hash_key_normalizes_numbers() {
        assert_eq!(hash_key(&json!(1)), hash_key(&json!("1")));
        assert_eq!(hash_key(&json!(1.0)), Some("1".to_string()));
        assert_eq!(hash_key(&json!(null)), None);
    }

    #[test]
    fn test_coerce_param() {
        assert_eq!(coerce_param("42", FieldType::Int32).unwrap(), json!(42));
        assert_eq!(coerce_param("true", FieldType::Boolean).unwrap(), json!(true));
        assert_eq!(
            coerce_param("2024-01-05", FieldType::Date).unwrap(),
            json!("2024-01-05")
        );
        assert!(matches!(
            coerce_param("abc", FieldType::Int64),
            Err(DataError::InvalidArgument(_))
        ));
        assert!(coerce_param("not-a-uuid", FieldType::Uuid).is_err());
        assert!(coerce_param("2024-13-01", FieldType::Date).is_err());
    }
}
