use crate::api::error::AppError;
use crate::entities::{file_resources, prelude::*};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};
use std::collections::HashSet;

/// Optional narrowing applied to registry listings
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    pub category: Option<String>,
    /// Dotted or bare; compared lower-cased with a leading dot
    pub extension: Option<String>,
    pub mime_prefix: Option<String>,
}

impl ResourceFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if let Some(category) = &self.category {
            cond = cond.add(file_resources::Column::Category.eq(category.as_str()));
        }
        if let Some(ext) = &self.extension {
            let ext = format!(".{}", ext.trim_start_matches('.').to_lowercase());
            cond = cond.add(file_resources::Column::Extension.eq(ext));
        }
        if let Some(prefix) = &self.mime_prefix {
            cond = cond.add(file_resources::Column::MimeType.starts_with(prefix.as_str()));
        }
        cond
    }
}

/// Durable metadata for every stored blob.
#[derive(Clone)]
pub struct FileResourceRegistry {
    db: DatabaseConnection,
}

impl FileResourceRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new row. Never overwrites: an existing id is a `Conflict`.
    pub async fn create(
        &self,
        resource: file_resources::Model,
    ) -> Result<file_resources::Model, AppError> {
        if self.exists(&resource.id).await? {
            return Err(AppError::Conflict(format!(
                "File resource {} already exists",
                resource.id
            )));
        }

        let id = resource.id.clone();
        let active: file_resources::ActiveModel = resource.into();
        match active.insert(&self.db).await {
            Ok(model) => Ok(model),
            // Lost a race with another insert of the same id
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                AppError::Conflict(format!("File resource {} already exists", id)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, id: &str) -> Result<file_resources::Model, AppError> {
        FileResources::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    pub async fn exists(&self, id: &str) -> Result<bool, AppError> {
        let count = FileResources::find_by_id(id).count(&self.db).await?;
        Ok(count > 0)
    }

    /// Returns true if a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let res = FileResources::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    /// Newest first.
    pub async fn list(&self, filter: &ResourceFilter) -> Result<Vec<file_resources::Model>, AppError> {
        let rows = FileResources::find()
            .filter(filter.condition())
            .order_by_desc(file_resources::Column::CreatedAt)
            .order_by_desc(file_resources::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn list_page(
        &self,
        filter: &ResourceFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<file_resources::Model>, AppError> {
        let rows = FileResources::find()
            .filter(filter.condition())
            .order_by_desc(file_resources::Column::CreatedAt)
            .order_by_desc(file_resources::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self, filter: &ResourceFilter) -> Result<u64, AppError> {
        let count = FileResources::find()
            .filter(filter.condition())
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Rows for `ids`, newest first; unknown ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<file_resources::Model>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = FileResources::find()
            .filter(file_resources::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_desc(file_resources::Column::CreatedAt)
            .order_by_desc(file_resources::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn get_many_page(
        &self,
        ids: &[String],
        offset: u64,
        limit: u64,
    ) -> Result<Vec<file_resources::Model>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = FileResources::find()
            .filter(file_resources::Column::Id.is_in(ids.iter().map(String::as_str)))
            .order_by_desc(file_resources::Column::CreatedAt)
            .order_by_desc(file_resources::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn count_many(&self, ids: &[String]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let count = FileResources::find()
            .filter(file_resources::Column::Id.is_in(ids.iter().map(String::as_str)))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Every registered id in a resource category
    pub async fn ids(&self, category: &str) -> Result<HashSet<String>, AppError> {
        let ids: Vec<String> = FileResources::find()
            .select_only()
            .column(file_resources::Column::Id)
            .filter(file_resources::Column::Category.eq(category))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }
}
