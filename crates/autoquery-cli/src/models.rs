//! Models and request types served by the CLI

use autoquery::{DatasetSchema, FieldType, JoinDecl, Model, QueryBase, QueryRequest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Rockstar {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub date_of_birth: Option<String>,
    pub alive: bool,
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
            .nullable_field("Age", FieldType::Int32)
            .nullable_field("DateOfBirth", FieldType::Date)
            .field("Alive", FieldType::Boolean)
            .with_primary_key("Id")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarAlbum {
    pub id: i32,
    pub rockstar_id: i32,
    pub name: String,
    pub genre: Option<String>,
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
            .nullable_field("Genre", FieldType::String)
            .with_primary_key("Id")
    }
}

/// A rockstar with one of their albums, if any
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RockstarAlbumRow {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub rockstar_album_id: Option<i32>,
    pub rockstar_album_name: Option<String>,
    pub rockstar_album_genre: Option<String>,
}

/// Every filter comes from untyped params
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstars {
    #[serde(flatten)]
    pub base: QueryBase,
}

impl QueryRequest for QueryRockstars {
    type From = Rockstar;
    type Into = Rockstar;

    fn base(&self) -> &QueryBase {
        &self.base
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryRockstarAlbums {
    #[serde(flatten)]
    pub base: QueryBase,
}

impl QueryRequest for QueryRockstarAlbums {
    type From = Rockstar;
    type Into = RockstarAlbumRow;

    fn base(&self) -> &QueryBase {
        &self.base
    }

    fn joins() -> Vec<JoinDecl> {
        vec![JoinDecl::left::<Rockstar, RockstarAlbum>()]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryAlbums {
    #[serde(flatten)]
    pub base: QueryBase,
}

impl QueryRequest for QueryAlbums {
    type From = RockstarAlbum;
    type Into = RockstarAlbum;

    fn base(&self) -> &QueryBase {
        &self.base
    }
}
