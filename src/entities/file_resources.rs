use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Resource categories recorded on a `file_resources` row
pub mod category {
    pub const IMAGE: &str = "image";
    pub const BLOG_ASSET: &str = "blog-asset";
    pub const THUMBNAIL: &str = "thumbnail";
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub original_name: String,
    pub extension: String, // with leading dot, e.g. ".jpg"; empty when the upload had none
    pub mime_type: String,
    pub size: i64,
    pub category: String,
    pub storage_path: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Blob category the resource's bytes live in
    pub fn blob_category(&self) -> &'static str {
        use crate::services::storage::categories;
        match self.category.as_str() {
            category::IMAGE => categories::FILES,
            category::THUMBNAIL => categories::THUMBNAILS,
            _ => categories::BLOG_ASSETS,
        }
    }

    pub fn is_image(&self) -> bool {
        self.category == category::IMAGE
    }
}
