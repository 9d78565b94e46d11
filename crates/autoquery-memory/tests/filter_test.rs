mod common;

use autoquery::{
    AutoQueryConfig, DataError, Operator, QueryExpression, RequestContext,
};
use common::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn tenant_filter(expr: &mut QueryExpression, ctx: &RequestContext) -> autoquery::Result<()> {
    let tenant = ctx
        .tenant_id
        .as_deref()
        .ok_or_else(|| DataError::invalid_argument("tenant required"))?;
    expr.and("Genre", Operator::Equals, json!(tenant))?;
    Ok(())
}

#[tokio::test]
async fn test_query_filters_run_in_registration_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let first = calls.clone();
    let second = calls.clone();

    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_query_filter::<QueryRockstars, _>(
            move |expr: &mut QueryExpression, _: &QueryRockstars, _: &RequestContext| {
                first.lock().unwrap().push(("first", expr.conditions.len()));
                expr.and("Age", Operator::GreaterOrEqual, json!(44))?;
                Ok(())
            },
        )
        .register_query_filter::<QueryRockstars, _>(
            move |expr: &mut QueryExpression, _: &QueryRockstars, _: &RequestContext| {
                second.lock().unwrap().push(("second", expr.conditions.len()));
                Ok(())
            },
        )
        .build()
        .unwrap();

    let dto = QueryRockstars {
        age_older_than: Some(27),
        ..Default::default()
    };
    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![("first", 1), ("second", 2)]);
    assert_eq!(ids(&response.results, |r| r.id), vec![5, 6, 7]);
}

#[tokio::test]
async fn test_filter_receives_typed_request() {
    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_query_filter::<QueryRockstars, _>(
            |expr: &mut QueryExpression, dto: &QueryRockstars, _: &RequestContext| {
                if dto.id.is_none() {
                    expr.and("LastName", Operator::NotEqual, json!("Presley"))?;
                }
                Ok(())
            },
        )
        .build()
        .unwrap();

    let response = autoquery
        .query(
            &QueryRockstars::default(),
            &HashMap::new(),
            &RequestContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.total, 6);
}

#[tokio::test]
async fn test_paging_set_by_filter_orders_by_primary_key() {
    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_query_filter::<QueryRockstarsAny, _>(
            |expr: &mut QueryExpression, _: &QueryRockstarsAny, _: &RequestContext| {
                expr.take(2);
                Ok(())
            },
        )
        .build()
        .unwrap();

    let expr = autoquery
        .create_query(
            &QueryRockstarsAny::default(),
            &HashMap::new(),
            &RequestContext::new(),
        )
        .unwrap();

    assert_eq!(expr.take, Some(2));
    assert_eq!(expr.order_by.len(), 1);
    assert_eq!(expr.order_by[0].field.field, "Id");
}

#[tokio::test]
async fn test_marker_filter_scopes_by_tenant() {
    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_marker_filter(TENANT_MARKER, tenant_filter)
        .build()
        .unwrap();

    let ctx = RequestContext::new().with_tenant("Rock");
    let response = autoquery
        .query(&QueryTenantAlbums::default(), &HashMap::new(), &ctx)
        .await
        .unwrap();
    assert_eq!(ids(&response.results, |r| r.id), vec![1, 2, 5]);

    let dto = QueryTenantAlbums {
        name_contains: Some("electric".to_string()),
        ..Default::default()
    };
    let response = autoquery.query(&dto, &HashMap::new(), &ctx).await.unwrap();
    assert_eq!(ids(&response.results, |r| r.id), vec![1]);
}

#[tokio::test]
async fn test_filter_error_aborts_the_query() {
    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_marker_filter(TENANT_MARKER, tenant_filter)
        .build()
        .unwrap();

    let err = autoquery
        .query(
            &QueryTenantAlbums::default(),
            &HashMap::new(),
            &RequestContext::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_marker_filter_does_not_touch_other_requests() {
    let source = Arc::new(memory_source());
    let autoquery = builder(AutoQueryConfig::default(), source)
        .register_marker_filter(TENANT_MARKER, tenant_filter)
        .build()
        .unwrap();

    // No tenant on the context, but QueryRockstars carries no marker
    let response = autoquery
        .query(
            &QueryRockstars::default(),
            &HashMap::new(),
            &RequestContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(response.total, 7);
}

#[tokio::test]
async fn test_filter_for_unknown_marker_fails_build() {
    let source = Arc::new(memory_source());
    let result = builder(AutoQueryConfig::default(), source)
        .register_marker_filter("Unused", |_: &mut QueryExpression, _: &RequestContext| Ok(()))
        .build();

    assert!(matches!(result, Err(DataError::InvalidConfiguration(_))));
}
