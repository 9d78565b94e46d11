//! Hash/range key pushdown on the partitioned memory source

mod common;

use autoquery::{
    AutoQuery, AutoQueryConfig, DataError, ErrorClass, KeySchema, Operator, QueryBase,
    QueryDataSource, RequestContext,
};
use autoquery_memory::PartitionedMemorySource;
use common::*;
use std::collections::HashMap;
use std::sync::Arc;

fn release_keys() -> KeySchema {
    KeySchema::new("Genre").with_range_key("Year")
}

fn releases(keys: KeySchema) -> (AutoQuery, Arc<PartitionedMemorySource>) {
    let source = Arc::new(
        PartitionedMemorySource::new()
            .with_table(keys, &seed_releases())
            .unwrap(),
    );
    let autoquery = AutoQuery::builder(AutoQueryConfig::default())
        .add_data_source::<RockstarRelease>(source.clone())
        .register::<QueryReleases>()
        .unwrap()
        .build()
        .unwrap();
    (autoquery, source)
}

fn years(rows: &[RockstarRelease]) -> Vec<i32> {
    rows.iter().map(|r| r.year).collect()
}

#[tokio::test]
async fn test_hash_key_lookup_is_sorted_by_range_key() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        ..Default::default()
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 3);
    assert_eq!(years(&response.results), vec![1967, 1968, 1997]);
}

#[tokio::test]
async fn test_range_key_condition() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        year_greater_than: Some(1967),
        ..Default::default()
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(years(&response.results), vec![1968, 1997]);
}

#[tokio::test]
async fn test_non_key_conditions_run_as_post_filters() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        year_greater_than: Some(1960),
        title_contains: Some("ladyland".to_string()),
        ..Default::default()
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].title, "Electric Ladyland");
}

#[tokio::test]
async fn test_unsupported_operator_fails_instead_of_dropping() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        title_ends_with: Some("Shape".to_string()),
        ..Default::default()
    };

    let err = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Capability);
    assert!(err
        .to_string()
        .contains("operator combination not supported"));
}

#[tokio::test]
async fn test_missing_hash_key_requires_scan() {
    let dto = QueryReleases {
        year_greater_than: Some(1990),
        ..Default::default()
    };

    let (autoquery, _) = releases(release_keys());
    let err = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::OperationNotSupported(_)));

    let (autoquery, _) = releases(release_keys().with_scan(true));
    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();
    let mut found = years(&response.results);
    found.sort();
    assert_eq!(found, vec![1991, 1993, 1997]);
}

#[tokio::test]
async fn test_post_filter_operators_are_configurable() {
    let keys = release_keys()
        .with_scan(true)
        .with_post_filter_operators(vec![Operator::Equals]);
    let (autoquery, _) = releases(keys);
    let ctx = RequestContext::new();

    let dto = QueryReleases {
        rating: Some(5.0),
        ..Default::default()
    };
    let response = autoquery.query(&dto, &HashMap::new(), &ctx).await.unwrap();
    assert_eq!(response.total, 2);

    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        title_contains: Some("Electric".to_string()),
        ..Default::default()
    };
    let err = autoquery.query(&dto, &HashMap::new(), &ctx).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Capability);
}

#[tokio::test]
async fn test_ordering_only_on_key_columns() {
    let (autoquery, _) = releases(release_keys());
    let ctx = RequestContext::new();

    let dto = QueryReleases {
        genre: Some("Grunge".to_string()),
        base: QueryBase::default().with_order_by_desc("Year"),
        ..Default::default()
    };
    let response = autoquery.query(&dto, &HashMap::new(), &ctx).await.unwrap();
    assert_eq!(years(&response.results), vec![1993, 1991]);

    let dto = QueryReleases {
        genre: Some("Grunge".to_string()),
        base: QueryBase::default().with_order_by("Title"),
        ..Default::default()
    };
    let err = autoquery.query(&dto, &HashMap::new(), &ctx).await.unwrap_err();
    assert!(matches!(err, DataError::OperationNotSupported(_)));
}

#[tokio::test]
async fn test_paged_query_orders_by_range_key() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Rock".to_string()),
        base: QueryBase::default().with_skip(1).with_take(1),
        ..Default::default()
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 3);
    assert_eq!(years(&response.results), vec![1968]);
}

#[tokio::test]
async fn test_source_exposes_key_schema() {
    let (_, source) = releases(release_keys());

    let keys = source.key_schema("RockstarRelease").unwrap();
    assert_eq!(keys.hash_key, "Genre");
    assert_eq!(keys.range_key.as_deref(), Some("Year"));
    assert!(source.key_schema("Rockstar").is_none());
    assert_eq!(source.open_cursors(), 0);
}

#[tokio::test]
async fn test_unknown_partition_is_empty() {
    let (autoquery, _) = releases(release_keys());
    let dto = QueryReleases {
        genre: Some("Jazz".to_string()),
        ..Default::default()
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
}

fn orders(keys: KeySchema) -> AutoQuery {
    let source = Arc::new(
        PartitionedMemorySource::new()
            .with_table(keys, &seed_orders())
            .unwrap(),
    );
    AutoQuery::builder(AutoQueryConfig::default())
        .add_data_source::<RockstarOrder>(source)
        .register::<QueryRockstarOrders>()
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_paged_query_ignores_non_key_primary_key() {
    let autoquery = orders(KeySchema::new("RockstarId").with_range_key("OrderDate"));
    let dto = QueryRockstarOrders {
        rockstar_id: Some(1),
        base: QueryBase::default().with_take(1),
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 2);
    assert_eq!(response.results[0].id, 2);
    assert_eq!(response.results[0].order_date, "2024-01-15");
}

#[tokio::test]
async fn test_paged_query_without_range_key() {
    let autoquery = orders(KeySchema::new("RockstarId"));
    let dto = QueryRockstarOrders {
        rockstar_id: Some(2),
        base: QueryBase::default().with_skip(0).with_take(5),
    };

    let response = autoquery
        .query(&dto, &HashMap::new(), &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.results[0].id, 3);
}
