//! Maps request properties to field predicates, from explicit metadata or by
//! naming convention.
//!
//! Resolution order for one property:
//!
//! 1. explicit [`QueryField`] metadata
//! 2. the configured ignore list
//! 3. operand brackets in the name: `>Age`, `Age>`, `<Age`, `Age<`, `Age>=`, `Age!`, `Age<>`
//! 4. suffixes: `AgeOlderThan`, `AgeGreaterThanOrEqualTo`, `NameStartsWith`, ...
//! 5. a plain model field name, compared with `Equals`
//! 6. prefixes: `AboveAge`, `FromDate`, `UntilDate`, ...
//! 7. plurals: `FirstNames` matches `FirstName` with `In`
//!
//! Anything else is dropped.

use crate::error::{DataError, Result};
use crate::expression::{Operator, Term};
use crate::join::{FieldRef, JoinGraph};
use crate::types::FieldType;
use serde::Serialize;
use tracing::debug;

/// Explicit per-property metadata; every set value overrides the convention
#[derive(Debug, Clone, Default)]
pub struct QueryField {
    pub property: String,
    pub field: Option<String>,
    pub operator: Option<Operator>,
    pub operand: Option<String>,
    pub term: Option<Term>,
    pub template: Option<String>,
    pub value_format: Option<String>,
}

impl QueryField {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            ..Default::default()
        }
    }

    /// Target field, when it differs from the property name
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Operator as a symbol (`>=`, `<>`) or alias (`StartsWith`)
    pub fn operand(mut self, symbol: impl Into<String>) -> Self {
        self.operand = Some(symbol.into());
        self
    }

    pub fn term(mut self, term: Term) -> Self {
        self.term = Some(term);
        self
    }

    /// Query text with `{Field}`, `{Value}`, `{Value1}`, `{Value2}` placeholders
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Format applied to the bound value, `{0}` standing for the value
    pub fn value_format(mut self, format: impl Into<String>) -> Self {
        self.value_format = Some(format.into());
        self
    }
}

/// One resolved property binding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFieldSpec {
    pub property: String,
    pub field: FieldRef,
    pub field_type: FieldType,
    pub operator: Operator,
    pub term: Term,
    pub template: Option<String>,
    pub value_format: Option<String>,
    /// False when the operator is the implicit `Equals` of a plain name match
    pub explicit_operator: bool,
}

impl QueryFieldSpec {
    /// Apply `value_format` to a text value
    pub fn format_value(&self, value: &str) -> String {
        match &self.value_format {
            Some(format) => format.replace("{0}", value),
            None => value.to_string(),
        }
    }
}

const BRACKETS: &[(&str, bool, Operator)] = &[
    // (symbol, is_prefix, operator); two-char symbols first
    ("<>", false, Operator::NotEqual),
    (">=", true, Operator::GreaterOrEqual),
    (">=", false, Operator::GreaterOrEqual),
    ("<=", true, Operator::LessOrEqual),
    ("<=", false, Operator::LessOrEqual),
    ("!", false, Operator::NotEqual),
    (">", true, Operator::Greater),
    (">", false, Operator::Greater),
    ("<", true, Operator::Less),
    ("<", false, Operator::Less),
];

const SUFFIXES: &[(&str, Operator)] = &[
    ("GreaterThanOrEqualTo", Operator::GreaterOrEqual),
    ("LessThanOrEqualTo", Operator::LessOrEqual),
    ("GreaterThan", Operator::Greater),
    ("LessThan", Operator::Less),
    ("NotEqualTo", Operator::NotEqual),
    ("OlderThan", Operator::Greater),
    ("YoungerThan", Operator::Less),
    ("StartsWith", Operator::StartsWith),
    ("EndsWith", Operator::EndsWith),
    ("Contains", Operator::Contains),
    ("Between", Operator::Between),
    ("Like", Operator::Like),
    ("In", Operator::In),
];

const PREFIXES: &[(&str, Operator)] = &[
    ("OnOrAfter", Operator::GreaterOrEqual),
    ("OnOrBefore", Operator::LessOrEqual),
    ("Beyond", Operator::Greater),
    ("Behind", Operator::Less),
    ("Higher", Operator::GreaterOrEqual),
    ("Above", Operator::Greater),
    ("Begin", Operator::Greater),
    ("Below", Operator::Less),
    ("Under", Operator::Less),
    ("Lower", Operator::Less),
    ("Before", Operator::Less),
    ("After", Operator::Greater),
    ("Since", Operator::GreaterOrEqual),
    ("Start", Operator::GreaterOrEqual),
    ("Until", Operator::LessOrEqual),
    ("Over", Operator::Greater),
    ("From", Operator::GreaterOrEqual),
    ("Stop", Operator::LessOrEqual),
    ("Like", Operator::Like),
    ("End", Operator::LessOrEqual),
    ("To", Operator::LessOrEqual),
];

struct Matched {
    field: FieldRef,
    field_type: FieldType,
    operator: Operator,
    explicit_operator: bool,
}

fn lookup(graph: &JoinGraph, name: &str, operator: Operator, explicit_operator: bool) -> Option<Matched> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    graph
        .first_matching_field(name)
        .map(|(field, field_type)| Matched {
            field,
            field_type,
            operator,
            explicit_operator,
        })
}

fn by_convention(graph: &JoinGraph, property: &str) -> Option<Matched> {
    for (symbol, is_prefix, operator) in BRACKETS {
        let stem = if *is_prefix {
            property.strip_prefix(symbol)
        } else {
            property.strip_suffix(symbol)
        };
        if let Some(stem) = stem {
            if let Some(matched) = lookup(graph, stem, *operator, true) {
                return Some(matched);
            }
        }
    }

    for (suffix, operator) in SUFFIXES {
        if let Some(stem) = property.strip_suffix(suffix) {
            if let Some(matched) = lookup(graph, stem, *operator, true) {
                return Some(matched);
            }
        }
    }

    if let Some(matched) = lookup(graph, property, Operator::Equals, false) {
        return Some(matched);
    }

    for (prefix, operator) in PREFIXES {
        if let Some(stem) = property.strip_prefix(prefix) {
            if let Some(matched) = lookup(graph, stem, *operator, true) {
                return Some(matched);
            }
        }
    }

    if let Some(stem) = property.strip_suffix('s') {
        if let Some(matched) = lookup(graph, stem, Operator::In, true) {
            return Some(matched);
        }
    }

    None
}

/// Resolve a single property. `Ok(None)` means the property is dropped.
pub fn resolve_property(
    graph: &JoinGraph,
    property: &str,
    explicit: Option<&QueryField>,
    default_term: Term,
    ignore: &[String],
) -> Result<Option<QueryFieldSpec>> {
    let Some(explicit) = explicit else {
        if ignore.iter().any(|i| i.eq_ignore_ascii_case(property)) {
            return Ok(None);
        }
        return Ok(by_convention(graph, property).map(|m| QueryFieldSpec {
            property: property.to_string(),
            field: m.field,
            field_type: m.field_type,
            operator: m.operator,
            term: default_term,
            template: None,
            value_format: None,
            explicit_operator: m.explicit_operator,
        }));
    };

    let operator = match (&explicit.operator, &explicit.operand) {
        (Some(op), _) => Some(*op),
        (None, Some(symbol)) => Some(Operator::from_symbol(symbol).ok_or_else(|| {
            DataError::InvalidConfiguration(format!(
                "Unknown operand '{}' on property {}",
                symbol, property
            ))
        })?),
        (None, None) => None,
    };

    let matched = match &explicit.field {
        Some(field) => lookup(graph, field, operator.unwrap_or(Operator::Equals), operator.is_some()),
        None => by_convention(graph, property).or_else(|| {
            lookup(graph, property, operator.unwrap_or(Operator::Equals), operator.is_some())
        }),
    };
    let Some(mut matched) = matched else {
        return Err(DataError::InvalidConfiguration(format!(
            "Property {} maps to {} which is not a field of {}",
            property,
            explicit.field.as_deref().unwrap_or(property),
            graph.root.name
        )));
    };
    if let Some(op) = operator {
        matched.operator = op;
        matched.explicit_operator = true;
    }

    Ok(Some(QueryFieldSpec {
        property: property.to_string(),
        field: matched.field,
        field_type: matched.field_type,
        operator: matched.operator,
        term: explicit.term.unwrap_or(default_term),
        template: explicit.template.clone(),
        value_format: explicit.value_format.clone(),
        explicit_operator: matched.explicit_operator,
    }))
}

/// Resolve every property of a request type, in declaration order
pub fn resolve(
    graph: &JoinGraph,
    properties: &[String],
    explicit: &[QueryField],
    default_term: Term,
    ignore: &[String],
) -> Result<Vec<QueryFieldSpec>> {
    if let Some(orphan) = explicit
        .iter()
        .find(|qf| !properties.iter().any(|p| p == &qf.property))
    {
        return Err(DataError::InvalidConfiguration(format!(
            "Query field metadata names unknown property {}",
            orphan.property
        )));
    }

    let mut specs = Vec::new();
    for property in properties {
        let metadata = explicit.iter().find(|qf| &qf.property == property);
        match resolve_property(graph, property, metadata, default_term, ignore)? {
            Some(spec) => {
                debug!(
                    "{} -> ({}, {}, {:?})",
                    property, spec.field, spec.operator, spec.term
                );
                specs.push(spec);
            }
            None => debug!("Dropping unmapped property {}", property),
        }
    }
    Ok(specs)
}
