//! # autoquery
//!
//! Compiles typed, declarative request objects into queries against pluggable
//! data sources, without hand-written query code.
//!
//! A request type names the model it queries and the shape results are
//! projected into. Its properties become filter conditions:
//!
//! - by explicit [`QueryField`] metadata (operand, template, target field, term)
//! - or by naming convention: `AgeOlderThan`, `>Age`, `FirstNameStartsWith`,
//!   `FirstNames` (membership), `OnOrAfterDateOfBirth`, ...
//!
//! ## Architecture
//!
//! - **Convention resolver** (`convention`): request property → `QueryFieldSpec`,
//!   once per request type at registration
//! - **Expression builder** (`builder`, `expression`): live values → `QueryExpression`
//! - **Join resolver** (`join`): join declarations → join graph, at registration
//! - **Data source contract** (`traits`, `pushdown`): `get_data_source`,
//!   `apply_limits`, `count`, plus key-condition planning for partition keyed
//!   backends
//! - **Pipeline** (`pipeline`): compile → custom filters → ordering/limits →
//!   dispatch → projection → envelope, or a forward-only stream
//!
//! ## Example
//!
//! ```rust,ignore
//! use autoquery::{AutoQuery, AutoQueryConfig, RequestContext};
//!
//! let autoquery = AutoQuery::builder(AutoQueryConfig::default())
//!     .add_data_source::<Rockstar>(source)
//!     .register::<QueryRockstars>()?
//!     .register_marker_filter("ITenantQuery", |expr, ctx| {
//!         if let Some(tenant) = &ctx.tenant_id {
//!             expr.and("TenantId", Operator::Equals, json!(tenant))?;
//!         }
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let dto = QueryRockstars { age_older_than: Some(27), ..Default::default() };
//! let response = autoquery.query(&dto, &HashMap::new(), &RequestContext::new()).await?;
//! ```
//!
//! ## Backend Implementation
//!
//! To implement a new backend:
//!
//! 1. Implement [`QueryDataSource`] and report its [`Capability`] set
//! 2. For partition keyed stores, return a [`KeySchema`] and plan with
//!    [`plan_key_conditions`]
//! 3. Optionally provide a [`DataSourceFactory`] for config-driven creation
//!
//! The reference in-memory backend lives in `autoquery-memory`.

pub mod aggregate;
pub mod builder;
pub mod config;
pub mod context;
pub mod convention;
pub mod error;
pub mod expression;
pub mod filter;
pub mod join;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod pushdown;
pub mod registry;
pub mod traits;
pub mod types;
pub mod value;

// Re-export commonly used items
pub use aggregate::{Aggregate, AggregateFn};
pub use config::AutoQueryConfig;
pub use context::RequestContext;
pub use convention::{QueryField, QueryFieldSpec};
pub use error::{DataError, ErrorClass, Result};
pub use expression::{
    BoundFragment, Condition, ConditionValue, Operator, OrderByField, QueryExpression, RawFilter,
    Term,
};
pub use filter::{CustomFilterRegistration, FilterTarget};
pub use join::{FieldRef, JoinDecl, JoinGraph, JoinKind, JoinSpec};
pub use model::{Model, ModelInfo, QueryBase, QueryRequest};
pub use output::{csv_header, to_csv_string, write_csv, write_csv_stream};
pub use pipeline::{project_row, AutoQuery, AutoQueryBuilder};
pub use pushdown::{plan_key_conditions, KeyConditionPlan, KeySchema};
pub use registry::{ConnectionConfig, DataSourceFactory, SourceRegistry};
pub use traits::{QueryDataSource, RowStream};
pub use types::{Capability, DataRow, DatasetSchema, FieldDef, FieldType, QueryResponse};
