//! Registration, compilation and execution of typed query requests.

use crate::aggregate::meta_value;
use crate::builder::{apply_base, bind_typed, bind_untyped};
use crate::config::AutoQueryConfig;
use crate::context::RequestContext;
use crate::convention::{self, QueryFieldSpec};
use crate::error::{DataError, Result};
use crate::expression::{QueryExpression, Term};
use crate::filter::{CustomFilterRegistration, FilterTarget};
use crate::join::JoinGraph;
use crate::model::{Model, ModelInfo, QueryRequest};
use crate::registry::{ConnectionConfig, DataSourceFactory, SourceRegistry};
use crate::traits::QueryDataSource;
use crate::types::{Capability, DataRow, QueryResponse};
use async_stream::try_stream;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Everything resolved for one request type at registration
#[derive(Debug)]
struct TypedQuery {
    name: &'static str,
    graph: Arc<JoinGraph>,
    properties: Vec<String>,
    specs: Vec<QueryFieldSpec>,
    unmapped: Vec<String>,
    defaults: Map<String, Value>,
    default_term: Term,
    markers: &'static [&'static str],
}

impl TypedQuery {
    fn model(&self) -> &'static str {
        self.graph.root.name
    }
}

fn to_object<T: serde::Serialize>(value: &T, what: &str) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DataError::InvalidConfiguration(format!(
            "{} must serialize to an object, got {}",
            what, other
        ))),
    }
}

/// Project a row onto the selected columns and deserialize it into `T`
pub fn project_row<T: DeserializeOwned>(row: DataRow, select_columns: &[String]) -> Result<T> {
    let row = if select_columns.is_empty() {
        row
    } else {
        row.into_iter()
            .filter(|(key, _)| select_columns.iter().any(|c| c == key))
            .collect()
    };
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        DataError::SerializationError(format!(
            "Failed to project row into {}: {}",
            type_name::<T>(),
            e
        ))
    })
}

/// Collects data sources, request types and custom filters, then validates
/// them all at once in [`AutoQueryBuilder::build`].
pub struct AutoQueryBuilder {
    config: AutoQueryConfig,
    registry: SourceRegistry,
    queries: HashMap<TypeId, Arc<TypedQuery>>,
    filters: Vec<CustomFilterRegistration>,
}

impl AutoQueryBuilder {
    pub fn new(config: AutoQueryConfig) -> Self {
        Self {
            config,
            registry: SourceRegistry::new(),
            queries: HashMap::new(),
            filters: Vec::new(),
        }
    }

    pub fn register_factory(mut self, factory: Arc<dyn DataSourceFactory>) -> Self {
        self.registry.register_factory(factory);
        self
    }

    /// Serve queries over `M` from `source`
    pub fn add_data_source<M: Model>(mut self, source: Arc<dyn QueryDataSource>) -> Self {
        self.registry.bind_model(M::model_name(), source);
        self
    }

    /// Serve queries over `M` from a source built by a registered factory
    pub fn add_data_source_from_config<M: Model>(mut self, config: &ConnectionConfig) -> Result<Self> {
        let source = self.registry.create_source(config)?;
        self.registry.bind_model(M::model_name(), source);
        Ok(self)
    }

    /// Resolve field specs and joins for request type `R`
    pub fn register<R: QueryRequest>(mut self) -> Result<Self> {
        let name = type_name::<R>();
        let graph = JoinGraph::resolve(ModelInfo::of::<R::From>(), R::joins())?;
        let defaults = to_object(&R::default(), name)?;
        let properties: Vec<String> = defaults.keys().cloned().collect();
        let specs = convention::resolve(
            &graph,
            &properties,
            &R::query_fields(),
            R::default_term(),
            &self.config.ignore_properties,
        )?;
        let unmapped: Vec<String> = properties
            .iter()
            .filter(|p| !specs.iter().any(|s| &s.property == *p))
            .filter(|p| {
                !self
                    .config
                    .ignore_properties
                    .iter()
                    .any(|i| i.eq_ignore_ascii_case(p))
            })
            .cloned()
            .collect();

        debug!(
            "Registered {} over {}: {} fields, {} joins",
            name,
            graph.root.name,
            specs.len(),
            graph.joins.len()
        );

        let typed = TypedQuery {
            name,
            graph: Arc::new(graph),
            properties,
            specs,
            unmapped,
            defaults,
            default_term: R::default_term(),
            markers: R::markers(),
        };
        self.queries.insert(TypeId::of::<R>(), Arc::new(typed));
        Ok(self)
    }

    pub fn register_filter(mut self, registration: CustomFilterRegistration) -> Self {
        self.filters.push(registration);
        self
    }

    /// Filter invoked for every `R` request, after binding
    pub fn register_query_filter<R, F>(self, callback: F) -> Self
    where
        R: QueryRequest,
        F: Fn(&mut QueryExpression, &R, &RequestContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register_filter(CustomFilterRegistration::for_request::<R, F>(callback))
    }

    /// Filter invoked for every request declaring `marker`
    pub fn register_marker_filter<F>(self, marker: &'static str, callback: F) -> Self
    where
        F: Fn(&mut QueryExpression, &RequestContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register_filter(CustomFilterRegistration::for_marker(marker, callback))
    }

    /// Validate every registration. Any unresolved registration is fatal.
    pub fn build(self) -> Result<AutoQuery> {
        for typed in self.queries.values() {
            let source = self.registry.source_for(typed.model()).map_err(|_| {
                DataError::InvalidConfiguration(format!(
                    "{} queries {} which has no data source",
                    typed.name,
                    typed.model()
                ))
            })?;
            if typed.graph.has_joins() && !source.supports(Capability::Joins) {
                return Err(DataError::InvalidConfiguration(format!(
                    "{} declares joins but {} does not support them",
                    typed.name,
                    source.source_type()
                )));
            }
        }

        for filter in &self.filters {
            let known = match filter.target {
                FilterTarget::Request { type_id, .. } => self.queries.contains_key(&type_id),
                FilterTarget::Marker(marker) => {
                    self.queries.values().any(|q| q.markers.contains(&marker))
                }
            };
            if !known {
                return Err(DataError::InvalidConfiguration(format!(
                    "Custom filter {:?} targets no registered request type",
                    filter.target
                )));
            }
        }

        debug!(
            "AutoQuery ready: {} request types, {} filters",
            self.queries.len(),
            self.filters.len()
        );
        Ok(AutoQuery {
            config: self.config,
            registry: self.registry,
            queries: self.queries,
            filters: self.filters,
        })
    }
}

/// Compiles typed requests into [`QueryExpression`]s and executes them
/// against the data source registered for the request's model.
///
/// Immutable once built; share it behind an `Arc`.
pub struct AutoQuery {
    config: AutoQueryConfig,
    registry: SourceRegistry,
    queries: HashMap<TypeId, Arc<TypedQuery>>,
    filters: Vec<CustomFilterRegistration>,
}

impl AutoQuery {
    pub fn builder(config: AutoQueryConfig) -> AutoQueryBuilder {
        AutoQueryBuilder::new(config)
    }

    pub fn config(&self) -> &AutoQueryConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    fn typed<R: QueryRequest>(&self) -> Result<&Arc<TypedQuery>> {
        self.queries.get(&TypeId::of::<R>()).ok_or_else(|| {
            DataError::InvalidConfiguration(format!(
                "Request type {} is not registered",
                type_name::<R>()
            ))
        })
    }

    /// Compile a request and its raw query-string params into an expression.
    ///
    /// The caller may adjust the expression before passing it to [`execute`](Self::execute).
    pub fn create_query<R: QueryRequest>(
        &self,
        dto: &R,
        raw_params: &HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<QueryExpression> {
        let typed = self.typed::<R>()?;
        let values = to_object(dto, typed.name)?;
        let mut expr = QueryExpression::new(typed.graph.clone());

        bind_typed(
            &mut expr,
            &typed.specs,
            &typed.unmapped,
            &values,
            &typed.defaults,
            self.config.strict,
        )?;
        bind_untyped(
            &mut expr,
            raw_params,
            &typed.properties,
            typed.default_term,
            &self.config,
        )?;

        let base = dto.base();
        apply_base(&mut expr, base, self.config.strict)?;
        expr.skip = base.skip;
        expr.take = base.take;

        let dto_any: &dyn Any = dto;
        for filter in self
            .filters
            .iter()
            .filter(|f| f.applies_to(TypeId::of::<R>(), typed.markers, typed.model()))
        {
            filter.invoke(&mut expr, dto_any, ctx)?;
        }

        if expr.is_paged()
            && expr.order_by.is_empty()
            && self.config.order_by_primary_key_on_paged_query
        {
            self.order_by_natural_key(&mut expr)?;
        }
        expr.take = self.config.clamp_take(expr.take);

        debug!(
            "Compiled {}: {} conditions, {} order columns, skip={:?} take={:?}",
            typed.name,
            expr.conditions.len(),
            expr.order_by.len(),
            expr.skip,
            expr.take
        );
        Ok(expr)
    }

    /// Partition keyed sources only order by their key columns, so paged
    /// queries over them follow the range key instead of the primary key.
    fn order_by_natural_key(&self, expr: &mut QueryExpression) -> Result<()> {
        let key_schema = self
            .registry
            .source_for(expr.model())
            .ok()
            .and_then(|source| source.key_schema(expr.model()));
        match key_schema {
            Some(keys) => {
                if let Some(range_key) = keys.range_key {
                    expr.order_by_field(&range_key, false)?;
                }
            }
            None => {
                expr.order_by_primary_key();
            }
        }
        Ok(())
    }

    fn prepare(&self, expr: &mut QueryExpression) -> Result<Arc<dyn QueryDataSource>> {
        let source = self.registry.source_for(expr.model())?.clone();
        expr.take = self.config.clamp_take(expr.take);

        if expr.raw.is_some() && !source.supports(Capability::RawFilters) {
            return Err(DataError::OperationNotSupported(format!(
                "{} does not accept raw filters",
                source.source_type()
            )));
        }
        Ok(source)
    }

    /// Run a compiled expression: count and rows are fetched concurrently,
    /// rows are projected into `R::Into` and aggregates land in `meta`.
    pub async fn execute<R: QueryRequest>(
        &self,
        _dto: &R,
        mut expr: QueryExpression,
        ctx: &RequestContext,
    ) -> Result<QueryResponse<R::Into>> {
        let source = self.prepare(&mut expr)?;
        let ctx = self.effective_context(ctx);
        debug!(
            "Dispatching {} to {} (skip={:?}, take={:?})",
            expr.model(),
            source.source_type(),
            expr.skip,
            expr.take
        );

        let fetch_rows = async {
            let rows = source.get_data_source(&expr).await?;
            source
                .apply_limits(rows, expr.skip, expr.take)
                .try_collect::<Vec<DataRow>>()
                .await
        };
        let (total, rows) = ctx
            .guard(async { futures::try_join!(source.count(&expr), fetch_rows) })
            .await
            .map_err(|e| {
                error!("Query over {} failed: {}", expr.model(), e);
                e
            })?;

        let results = rows
            .into_iter()
            .map(|row| project_row::<R::Into>(row, &expr.select_columns))
            .collect::<Result<Vec<_>>>()?;

        let mut response = QueryResponse::new(expr.skip.unwrap_or(0), total, results);
        if !expr.aggregates.is_empty() {
            let mut meta = HashMap::new();
            for aggregate in &expr.aggregates {
                match ctx.guard(source.select_aggregate(&expr, aggregate)).await? {
                    Some(value) => {
                        meta.insert(aggregate.alias.clone(), meta_value(&value));
                    }
                    None => debug!("{} skipped aggregate {}", source.source_type(), aggregate.alias),
                }
            }
            response.meta = Some(meta);
        }
        Ok(response)
    }

    /// Compile and execute in one step
    pub async fn query<R: QueryRequest>(
        &self,
        dto: &R,
        raw_params: &HashMap<String, String>,
        ctx: &RequestContext,
    ) -> Result<QueryResponse<R::Into>> {
        let expr = self.create_query(dto, raw_params, ctx)?;
        self.execute(dto, expr, ctx).await
    }

    /// Forward-only stream of projected rows with no envelope and no count.
    /// Dropping the stream releases the adapter's cursor. Every pull runs
    /// under the request's token and timeout, so the stream ends with
    /// `Cancelled` or `QueryTimeout` even while the adapter is blocked.
    pub async fn stream<R: QueryRequest>(
        &self,
        _dto: &R,
        mut expr: QueryExpression,
        ctx: &RequestContext,
    ) -> Result<BoxStream<'static, Result<R::Into>>> {
        let source = self.prepare(&mut expr)?;
        let ctx = self.effective_context(ctx);
        let rows = ctx.guard(source.get_data_source(&expr)).await?;
        let mut rows = source.apply_limits(rows, expr.skip, expr.take);
        let select_columns = expr.select_columns;

        let stream = try_stream! {
            loop {
                let next = ctx.guard(async { Ok(rows.next().await) }).await?;
                match next {
                    Some(row) => {
                        yield project_row::<R::Into>(row?, &select_columns)?;
                    }
                    None => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }

    fn effective_context(&self, ctx: &RequestContext) -> RequestContext {
        let mut ctx = ctx.clone();
        if ctx.timeout.is_none() {
            ctx.timeout = self
                .config
                .default_timeout_ms
                .map(std::time::Duration::from_millis);
        }
        ctx
    }

    /// Close every registered data source
    pub async fn close(&self) -> Result<()> {
        self.registry.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(serde::Deserialize, Debug, Default, PartialEq)]
    #[serde(default, rename_all = "PascalCase")]
    struct Narrow {
        id: i32,
        first_name: String,
    }

    #[test]
    fn test_project_row_narrows_columns() {
        let row = match json!({"Id": 1, "FirstName": "Jimi", "Age": 27}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let all: Narrow = project_row(row.clone(), &[]).unwrap();
        assert_eq!(all, Narrow { id: 1, first_name: "Jimi".into() });

        let narrowed: Narrow = project_row(row, &["Id".to_string()]).unwrap();
        assert_eq!(narrowed, Narrow { id: 1, first_name: String::new() });
    }
}
