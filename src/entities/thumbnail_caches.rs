use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One derived artifact per (source_file_id, width, height); the composite
/// unique index is created alongside the table in `run_migrations`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "thumbnail_caches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source_file_id: String,
    pub width: i32,
    pub height: i32,
    #[sea_orm(unique)]
    pub thumbnail_id: String,
    pub storage_path: String,
    pub size: i64,
    pub created_at: DateTimeUtc,
    pub last_accessed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
