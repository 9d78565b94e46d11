//! Shared fixtures for the in-memory adapter integration tests
//!
//! - Rockstar / RockstarAlbum / RockstarRelease models and seed rows
//! - Request types covering conventions, joins, markers and projections
//! - A helper that wires an [`AutoQuery`] over a seeded [`MemorySource`]

#![allow(dead_code)]

use autoquery::{
    AutoQuery, AutoQueryBuilder, AutoQueryConfig, DatasetSchema, FieldType, JoinDecl, Model,
    QueryBase, QueryField, QueryRequest, Term,
};
use autoquery_memory::MemorySource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Rockstar {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
}

impl Model for Rockstar {
    fn model_name() -> &'static str {
        "Rockstar"
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .field("Id", FieldType::Int32)
            .field("FirstName", FieldType::String)
            .field("LastName", FieldType::String)
            .field("Age", FieldType::Int32)
            .with_primary_key("Id")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarAlbum {
    pub id: i32,
    pub rockstar_id: i32,
    pub name: String,
    pub genre: String,
}

impl Model for RockstarAlbum {
    fn model_name() -> &'static str {
        "RockstarAlbum"
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .field("Id", FieldType::Int32)
            .field("RockstarId", FieldType::Int32)
            .field("Name", FieldType::String)
            .field("Genre", FieldType::String)
            .with_primary_key("Id")
    }
}

/// Partitioned by genre, sorted by year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarRelease {
    pub genre: String,
    pub year: i32,
    pub title: String,
    pub rating: f64,
}

impl Model for RockstarRelease {
    fn model_name() -> &'static str {
        "RockstarRelease"
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .field("Genre", FieldType::String)
            .field("Year", FieldType::Int32)
            .field("Title", FieldType::String)
            .field("Rating", FieldType::Float64)
            .with_partitions(&["Genre"])
            .with_primary_key("Year")
    }
}

/// Keyed by rockstar and order date, identified by a separate `Id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarOrder {
    pub id: i32,
    pub rockstar_id: i32,
    pub order_date: String,
}

impl Model for RockstarOrder {
    fn model_name() -> &'static str {
        "RockstarOrder"
    }

    fn schema() -> DatasetSchema {
        DatasetSchema::new()
            .field("Id", FieldType::Int32)
            .field("RockstarId", FieldType::Int32)
            .field("OrderDate", FieldType::String)
            .with_partitions(&["RockstarId"])
            .with_primary_key("Id")
    }
}

fn rockstar(id: i32, first_name: &str, last_name: &str, age: i32) -> Rockstar {
    Rockstar {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        age,
    }
}

pub fn seed_rockstars() -> Vec<Rockstar> {
    vec![
        rockstar(1, "Jimi", "Hendrix", 27),
        rockstar(2, "Janis", "Joplin", 27),
        rockstar(3, "Jim", "Morrison", 27),
        rockstar(4, "Kurt", "Cobain", 42),
        rockstar(5, "Elvis", "Presley", 44),
        rockstar(6, "David", "Grohl", 48),
        rockstar(7, "Eddie", "Vedder", 50),
    ]
}

fn album(id: i32, rockstar_id: i32, name: &str, genre: &str) -> RockstarAlbum {
    RockstarAlbum {
        id,
        rockstar_id,
        name: name.to_string(),
        genre: genre.to_string(),
    }
}

/// Albums for Hendrix (2), Joplin, Cobain and Grohl. Morrison, Presley and
/// Vedder have none.
pub fn seed_albums() -> Vec<RockstarAlbum> {
    vec![
        album(1, 1, "Electric Ladyland", "Rock"),
        album(2, 1, "Axis: Bold as Love", "Rock"),
        album(3, 2, "Pearl", "Blues"),
        album(4, 4, "Nevermind", "Grunge"),
        album(5, 6, "The Colour and the Shape", "Rock"),
    ]
}

fn release(genre: &str, year: i32, title: &str, rating: f64) -> RockstarRelease {
    RockstarRelease {
        genre: genre.to_string(),
        year,
        title: title.to_string(),
        rating,
    }
}

pub fn seed_releases() -> Vec<RockstarRelease> {
    vec![
        release("Rock", 1967, "Are You Experienced", 4.5),
        release("Rock", 1968, "Electric Ladyland", 5.0),
        release("Rock", 1997, "The Colour and the Shape", 4.0),
        release("Grunge", 1991, "Nevermind", 5.0),
        release("Grunge", 1993, "In Utero", 4.5),
        release("Blues", 1971, "Pearl", 4.0),
    ]
}

/// Narrow projection; unselected columns take their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarName {
    pub id: i32,
    pub first_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarWithAlbum {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub rockstar_album_name: Option<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstars {
    #[serde(flatten)]
    pub base: QueryBase,
    pub id: Option<i32>,
    pub age: Option<i32>,
    pub age_greater_than_or_equal_to: Option<i32>,
    pub age_older_than: Option<i32>,
    pub first_name_starts_with: Option<String>,
    pub last_name_contains: Option<String>,
    pub ages_between: Option<Vec<i32>>,
    pub first_names: Option<Vec<String>>,
}

impl QueryRequest for QueryRockstars {
    type From = Rockstar;
    type Into = Rockstar;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn query_fields() -> Vec<QueryField> {
        vec![QueryField::new("AgesBetween")
            .field("Age")
            .operator(autoquery::Operator::Between)]
    }
}

/// Every property joins the OR group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarsAny {
    #[serde(flatten)]
    pub base: QueryBase,
    pub age: Option<i32>,
    pub first_name: Option<String>,
}

impl QueryRequest for QueryRockstarsAny {
    type From = Rockstar;
    type Into = Rockstar;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn default_term() -> Term {
        Term::Or
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarNames {
    #[serde(flatten)]
    pub base: QueryBase,
    pub age: Option<i32>,
}

impl QueryRequest for QueryRockstarNames {
    type From = Rockstar;
    type Into = RockstarName;

    fn base(&self) -> &QueryBase {
        &self.base
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarAlbums {
    #[serde(flatten)]
    pub base: QueryBase,
    pub age: Option<i32>,
    pub genre: Option<String>,
}

impl QueryRequest for QueryRockstarAlbums {
    type From = Rockstar;
    type Into = RockstarWithAlbum;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn joins() -> Vec<JoinDecl> {
        vec![JoinDecl::inner::<Rockstar, RockstarAlbum>()]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarAlbumsLeft {
    #[serde(flatten)]
    pub base: QueryBase,
    pub age: Option<i32>,
}

impl QueryRequest for QueryRockstarAlbumsLeft {
    type From = Rockstar;
    type Into = RockstarWithAlbum;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn joins() -> Vec<JoinDecl> {
        vec![JoinDecl::left::<Rockstar, RockstarAlbum>()]
    }
}

pub const TENANT_MARKER: &str = "TenantScoped";

/// Tenant scoped album search; the tenant is the rockstar's genre
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryTenantAlbums {
    #[serde(flatten)]
    pub base: QueryBase,
    pub name_contains: Option<String>,
}

impl QueryRequest for QueryTenantAlbums {
    type From = RockstarAlbum;
    type Into = RockstarAlbum;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn markers() -> &'static [&'static str] {
        &[TENANT_MARKER]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryReleases {
    #[serde(flatten)]
    pub base: QueryBase,
    pub genre: Option<String>,
    pub year_greater_than: Option<i32>,
    pub title_contains: Option<String>,
    pub title_ends_with: Option<String>,
    pub rating: Option<f64>,
}

impl QueryRequest for QueryReleases {
    type From = RockstarRelease;
    type Into = RockstarRelease;

    fn base(&self) -> &QueryBase {
        &self.base
    }
}

pub fn seed_orders() -> Vec<RockstarOrder> {
    [(1, 1, "2024-03-01"), (2, 1, "2024-01-15"), (3, 2, "2024-02-10")]
        .into_iter()
        .map(|(id, rockstar_id, order_date)| RockstarOrder {
            id,
            rockstar_id,
            order_date: order_date.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarOrders {
    #[serde(flatten)]
    pub base: QueryBase,
    pub rockstar_id: Option<i32>,
}

impl QueryRequest for QueryRockstarOrders {
    type From = RockstarOrder;
    type Into = RockstarOrder;

    fn base(&self) -> &QueryBase {
        &self.base
    }
}

pub fn memory_source() -> MemorySource {
    MemorySource::new()
        .with_table(&seed_rockstars())
        .and_then(|s| s.with_table(&seed_albums()))
        .expect("seed tables")
}

/// Builder with every memory-backed request registered over `source`
pub fn builder(config: AutoQueryConfig, source: Arc<MemorySource>) -> AutoQueryBuilder {
    AutoQuery::builder(config)
        .add_data_source::<Rockstar>(source.clone())
        .add_data_source::<RockstarAlbum>(source)
        .register::<QueryRockstars>()
        .and_then(|b| b.register::<QueryRockstarsAny>())
        .and_then(|b| b.register::<QueryRockstarNames>())
        .and_then(|b| b.register::<QueryRockstarAlbums>())
        .and_then(|b| b.register::<QueryRockstarAlbumsLeft>())
        .and_then(|b| b.register::<QueryTenantAlbums>())
        .expect("register requests")
}

pub fn setup_autoquery(config: AutoQueryConfig) -> (AutoQuery, Arc<MemorySource>) {
    let source = Arc::new(memory_source());
    let autoquery = builder(config, source.clone())
        .build()
        .expect("build autoquery");
    (autoquery, source)
}

pub fn ids<T, F: Fn(&T) -> i32>(rows: &[T], id: F) -> Vec<i32> {
    rows.iter().map(id).collect()
}
