use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment_relations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub document_id: String,
    pub file_id: String,
    pub relation_kind: String, // attachment, inline-image, cover
    pub display_order: i32,
    pub created_at: DateTimeUtc,
}

// No relation is declared so no database-level foreign key is created: the
// row is a back-reference, and file deletion is driven by the ledger's count.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
