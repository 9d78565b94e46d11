use crate::context::RequestContext;
use crate::error::{DataError, Result};
use crate::expression::QueryExpression;
use crate::model::{Model, QueryRequest};
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

type FilterFn =
    Arc<dyn Fn(&mut QueryExpression, &dyn Any, &RequestContext) -> Result<()> + Send + Sync>;

/// What a custom filter is registered against
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FilterTarget {
    /// One request type
    Request {
        type_id: TypeId,
        name: &'static str,
    },
    /// Every request type declaring this marker
    Marker(&'static str),
}

/// A callback that may append or change conditions after binding
#[derive(Clone)]
pub struct CustomFilterRegistration {
    pub target: FilterTarget,
    /// Model the filter was written against; `None` for marker filters on any model
    pub model: Option<&'static str>,
    callback: FilterFn,
}

impl fmt::Debug for CustomFilterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFilterRegistration")
            .field("target", &self.target)
            .field("model", &self.model)
            .finish()
    }
}

impl CustomFilterRegistration {
    /// Filter for one request type, receiving the typed request
    pub fn for_request<R, F>(callback: F) -> Self
    where
        R: QueryRequest,
        F: Fn(&mut QueryExpression, &R, &RequestContext) -> Result<()> + Send + Sync + 'static,
    {
        let callback: FilterFn = Arc::new(
            move |expr: &mut QueryExpression, dto: &dyn Any, ctx: &RequestContext| {
                let dto = dto.downcast_ref::<R>().ok_or_else(|| {
                    DataError::Internal(format!("filter expected request {}", type_name::<R>()))
                })?;
                callback(expr, dto, ctx)
            },
        );

        Self {
            target: FilterTarget::Request {
                type_id: TypeId::of::<R>(),
                name: type_name::<R>(),
            },
            model: Some(<R::From as Model>::model_name()),
            callback,
        }
    }

    /// Filter for every request carrying `marker`
    pub fn for_marker<F>(marker: &'static str, callback: F) -> Self
    where
        F: Fn(&mut QueryExpression, &RequestContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            target: FilterTarget::Marker(marker),
            model: None,
            callback: Arc::new(
                move |expr: &mut QueryExpression, _dto: &dyn Any, ctx: &RequestContext| {
                    callback(expr, ctx)
                },
            ),
        }
    }

    /// Restrict a marker filter to requests over model `M`
    pub fn on_model<M: Model>(mut self) -> Self {
        self.model = Some(M::model_name());
        self
    }

    pub fn applies_to(&self, request: TypeId, markers: &[&str], model: &str) -> bool {
        let target_matches = match self.target {
            FilterTarget::Request { type_id, .. } => type_id == request,
            FilterTarget::Marker(marker) => markers.contains(&marker),
        };
        target_matches && self.model.map_or(true, |m| m == model)
    }

    pub fn invoke(
        &self,
        expr: &mut QueryExpression,
        dto: &dyn Any,
        ctx: &RequestContext,
    ) -> Result<()> {
        (self.callback)(expr, dto, ctx)
    }
}
