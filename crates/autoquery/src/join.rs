//! Join declarations and the join graph resolved from them at registration.

use crate::error::{DataError, Result};
use crate::model::{Model, ModelInfo};
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    /// Keeps parents without children, child fields projected as nulls
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// A join declared on a request type: `from` is already in the graph, `to` is added
#[derive(Debug, Clone)]
pub struct JoinDecl {
    pub kind: JoinKind,
    pub from: ModelInfo,
    pub to: ModelInfo,
    pub key: Option<String>,
}

impl JoinDecl {
    pub fn inner<F: Model, T: Model>() -> Self {
        Self::new::<F, T>(JoinKind::Inner)
    }

    pub fn left<F: Model, T: Model>() -> Self {
        Self::new::<F, T>(JoinKind::Left)
    }

    fn new<F: Model, T: Model>(kind: JoinKind) -> Self {
        Self {
            kind,
            from: ModelInfo::of::<F>(),
            to: ModelInfo::of::<T>(),
            key: None,
        }
    }

    /// Explicit join key, overriding the `{Model}Id` convention
    pub fn on(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Reference to a column of the root model or of a joined model
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct FieldRef {
    pub model: &'static str,
    pub field: String,
    pub root: bool,
}

impl FieldRef {
    pub fn root(model: &'static str, field: impl Into<String>) -> Self {
        Self {
            model,
            field: field.into(),
            root: true,
        }
    }

    pub fn joined(model: &'static str, field: impl Into<String>) -> Self {
        Self {
            model,
            field: field.into(),
            root: false,
        }
    }

    /// Key of this column in a row: the bare field on the root model,
    /// `{Model}{Field}` on joined models.
    pub fn key(&self) -> String {
        if self.root {
            self.field.clone()
        } else {
            format!("{}{}", self.model, self.field)
        }
    }

    /// Quoted column reference for generated query text
    pub fn column(&self) -> String {
        format!("\"{}\".\"{}\"", self.model, self.field)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.field)
    }
}

/// One resolved edge of the join graph
#[derive(Debug, Clone, Serialize)]
pub struct JoinSpec {
    pub from_model: &'static str,
    pub to_model: &'static str,
    pub kind: JoinKind,
    /// The key that matched, as declared or inferred
    pub key_field: String,
    /// Column on the `from` side
    pub from_field: FieldRef,
    /// Column on the `to` side
    pub to_field: String,
}

/// Models reachable from the root through resolved joins
#[derive(Debug, Clone)]
pub struct JoinGraph {
    pub root: ModelInfo,
    pub joined: Vec<ModelInfo>,
    pub joins: Vec<JoinSpec>,
}

impl JoinGraph {
    /// Graph with no joins
    pub fn single(root: ModelInfo) -> Self {
        Self {
            root,
            joined: Vec::new(),
            joins: Vec::new(),
        }
    }

    /// Resolve join declarations in order. Each declaration must start from a
    /// model already in the graph and add a model not yet in it.
    pub fn resolve(root: ModelInfo, decls: Vec<JoinDecl>) -> Result<Self> {
        let mut graph = Self::single(root);

        for decl in decls {
            if graph.model(decl.from.name).is_none() {
                return Err(DataError::InvalidConfiguration(format!(
                    "Join {} -> {} starts from a model that is not part of the query",
                    decl.from.name, decl.to.name
                )));
            }
            if graph.model(decl.to.name).is_some() {
                return Err(DataError::InvalidConfiguration(format!(
                    "Model {} is joined more than once",
                    decl.to.name
                )));
            }

            let spec = Self::infer_key(&graph, &decl)?;
            debug!(
                "Resolved {} {} on {} = {}.{}",
                spec.kind, spec.to_model, spec.from_field, spec.to_model, spec.to_field
            );
            graph.joins.push(spec);
            graph.joined.push(decl.to);
        }

        Ok(graph)
    }

    fn infer_key(graph: &JoinGraph, decl: &JoinDecl) -> Result<JoinSpec> {
        let from = &decl.from;
        let to = &decl.to;
        let from_ref = |field: &str| FieldRef {
            model: from.name,
            field: field.to_string(),
            root: from.name == graph.root.name,
        };
        let pk_of = |info: &ModelInfo| {
            info.schema
                .primary_key_field()
                .map(str::to_string)
                .ok_or_else(|| {
                    DataError::InvalidConfiguration(format!(
                        "Model {} has no fields to join on",
                        info.name
                    ))
                })
        };
        let spec = |key: &str, from_field: FieldRef, to_field: String| JoinSpec {
            from_model: from.name,
            to_model: to.name,
            kind: decl.kind,
            key_field: key.to_string(),
            from_field,
            to_field,
        };

        if let Some(key) = &decl.key {
            let on_from = from.schema.find_field(key);
            let on_to = to.schema.find_field(key);
            return match (on_from, on_to) {
                (Some(f), Some(t)) => Ok(spec(key, from_ref(&f.name), t.name.clone())),
                (None, Some(t)) => Ok(spec(key, from_ref(&pk_of(from)?), t.name.clone())),
                (Some(f), None) => Ok(spec(key, from_ref(&f.name), pk_of(to)?)),
                (None, None) => Err(DataError::InvalidConfiguration(format!(
                    "Join key {} exists on neither {} nor {}",
                    key, from.name, to.name
                ))),
            };
        }

        // child carries {Parent}Id
        let child_key = format!("{}Id", from.name);
        if let Some(t) = to.schema.find_field(&child_key) {
            return Ok(spec(&child_key, from_ref(&pk_of(from)?), t.name.clone()));
        }

        // parent carries {Child}Id
        let parent_key = format!("{}Id", to.name);
        if let Some(f) = from.schema.find_field(&parent_key) {
            return Ok(spec(&parent_key, from_ref(&f.name), pk_of(to)?));
        }

        Err(DataError::InvalidConfiguration(format!(
            "Cannot infer join key between {} and {}: expected {} on {} or {} on {}",
            from.name, to.name, child_key, to.name, parent_key, from.name
        )))
    }

    pub fn model(&self, name: &str) -> Option<&ModelInfo> {
        if self.root.name == name {
            return Some(&self.root);
        }
        self.joined.iter().find(|m| m.name == name)
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    /// Find the column a name refers to: a root field, then a field of a joined
    /// model, then a `{Model}{Field}` alias of a joined model.
    pub fn first_matching_field(&self, name: &str) -> Option<(FieldRef, FieldType)> {
        if let Some(f) = self.root.schema.find_field(name) {
            return Some((FieldRef::root(self.root.name, &f.name), f.field_type));
        }
        for model in &self.joined {
            if let Some(f) = model.schema.find_field(name) {
                return Some((FieldRef::joined(model.name, &f.name), f.field_type));
            }
        }
        for model in &self.joined {
            let prefix = model.name.len();
            if name.len() > prefix
                && name.is_char_boundary(prefix)
                && name[..prefix].eq_ignore_ascii_case(model.name)
            {
                if let Some(f) = model.schema.find_field(&name[prefix..]) {
                    return Some((FieldRef::joined(model.name, &f.name), f.field_type));
                }
            }
        }
        None
    }
}
