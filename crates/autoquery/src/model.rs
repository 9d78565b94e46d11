use crate::convention::QueryField;
use crate::expression::Term;
use crate::join::JoinDecl;
use crate::types::DatasetSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A queryable model backed by a data source
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name used for joins (`{Model}Id`) and for field aliases (`{Model}{Field}`)
    fn model_name() -> &'static str;

    /// Ordered field definitions and primary key
    fn schema() -> DatasetSchema;
}

/// Erased name and schema of a [`Model`]
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: &'static str,
    pub schema: DatasetSchema,
}

impl ModelInfo {
    pub fn of<M: Model>() -> Self {
        Self {
            name: M::model_name(),
            schema: M::schema(),
        }
    }
}

/// Paging, ordering, projection and aggregate options shared by every request.
///
/// Flatten it into a request type with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryBase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
    /// Comma separated columns, `-Column` for descending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Comma separated columns sorted descending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_desc: Option<String>,
    /// Comma separated columns to project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,
    /// Comma separated aggregates, e.g. `Total, COUNT(*), MAX(Age) as Oldest`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

impl QueryBase {
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn with_order_by_desc(mut self, order_by_desc: impl Into<String>) -> Self {
        self.order_by_desc = Some(order_by_desc.into());
        self
    }

    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.include = Some(include.into());
        self
    }
}

/// A typed, declarative query request.
///
/// Property names and their declaration order are read once, at registration,
/// by serializing `Self::default()`. Every serialized property that is not on
/// the ignore list is resolved against `From` (and joined models) by explicit
/// [`QueryField`] metadata or by naming convention.
pub trait QueryRequest: Serialize + Default + Send + Sync + 'static {
    /// Model queried by this request
    type From: Model;

    /// Shape each result row is projected into
    type Into: DeserializeOwned + Serialize + Send + 'static;

    fn base(&self) -> &QueryBase;

    /// Explicit per-property metadata, overriding conventions
    fn query_fields() -> Vec<QueryField> {
        Vec::new()
    }

    fn joins() -> Vec<JoinDecl> {
        Vec::new()
    }

    /// Shared marker names used to target filters at a family of requests
    fn markers() -> &'static [&'static str] {
        &[]
    }

    /// Term used by properties without an explicit term
    fn default_term() -> Term {
        Term::And
    }
}
