use crate::api::error::AppError;
use crate::entities::{attachment_relations, prelude::*};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// How a document uses a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    #[default]
    Attachment,
    InlineImage,
    Cover,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Attachment => "attachment",
            RelationKind::InlineImage => "inline-image",
            RelationKind::Cover => "cover",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attachment" => Ok(RelationKind::Attachment),
            "inline-image" | "inline_image" => Ok(RelationKind::InlineImage),
            "cover" => Ok(RelationKind::Cover),
            other => Err(AppError::BadRequest(format!(
                "Unknown relation kind: {}",
                other
            ))),
        }
    }
}

/// Document to file relation with reference counting.
///
/// The ledger never deletes a file resource itself; callers check
/// `ref_count` after unlinking and drive the deletion.
#[derive(Clone)]
pub struct AttachmentLedger {
    db: DatabaseConnection,
}

impl AttachmentLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Idempotent: returns the existing row when the pair is already linked.
    pub async fn link(
        &self,
        document_id: &str,
        file_id: &str,
        kind: RelationKind,
        order: i32,
    ) -> Result<attachment_relations::Model, AppError> {
        if let Some(existing) = self.find(document_id, file_id).await? {
            return Ok(existing);
        }

        let active = attachment_relations::ActiveModel {
            document_id: Set(document_id.to_string()),
            file_id: Set(file_id.to_string()),
            relation_kind: Set(kind.as_str().to_string()),
            display_order: Set(order),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        match active.insert(&self.db).await {
            Ok(model) => {
                tracing::debug!("🔗 Linked {} -> {} ({})", document_id, file_id, kind);
                Ok(model)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => self
                .find(document_id, file_id)
                .await?
                .ok_or_else(|| AppError::Internal("Relation vanished after conflict".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent; returns the number of rows removed.
    pub async fn unlink(&self, document_id: &str, file_id: &str) -> Result<u64, AppError> {
        let res = AttachmentRelations::delete_many()
            .filter(attachment_relations::Column::DocumentId.eq(document_id))
            .filter(attachment_relations::Column::FileId.eq(file_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    /// Removes every relation of a document and returns the distinct file
    /// ids it referenced.
    pub async fn unlink_document(&self, document_id: &str) -> Result<Vec<String>, AppError> {
        let mut file_ids: Vec<String> = AttachmentRelations::find()
            .select_only()
            .column(attachment_relations::Column::FileId)
            .filter(attachment_relations::Column::DocumentId.eq(document_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        file_ids.sort();
        file_ids.dedup();

        AttachmentRelations::delete_many()
            .filter(attachment_relations::Column::DocumentId.eq(document_id))
            .exec(&self.db)
            .await?;

        Ok(file_ids)
    }

    /// Ordered by display order, then creation time.
    pub async fn by_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<attachment_relations::Model>, AppError> {
        let rows = AttachmentRelations::find()
            .filter(attachment_relations::Column::DocumentId.eq(document_id))
            .order_by_asc(attachment_relations::Column::DisplayOrder)
            .order_by_asc(attachment_relations::Column::CreatedAt)
            .order_by_asc(attachment_relations::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn by_file(&self, file_id: &str) -> Result<Vec<attachment_relations::Model>, AppError> {
        let rows = AttachmentRelations::find()
            .filter(attachment_relations::Column::FileId.eq(file_id))
            .order_by_asc(attachment_relations::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn ref_count(&self, file_id: &str) -> Result<u64, AppError> {
        let count = AttachmentRelations::find()
            .filter(attachment_relations::Column::FileId.eq(file_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn find(
        &self,
        document_id: &str,
        file_id: &str,
    ) -> Result<Option<attachment_relations::Model>, AppError> {
        let row = AttachmentRelations::find()
            .filter(attachment_relations::Column::DocumentId.eq(document_id))
            .filter(attachment_relations::Column::FileId.eq(file_id))
            .one(&self.db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_round_trip() {
        for kind in [
            RelationKind::Attachment,
            RelationKind::InlineImage,
            RelationKind::Cover,
        ] {
            assert_eq!(kind.as_str().parse::<RelationKind>().unwrap(), kind);
        }
        assert_eq!(
            "INLINE_IMAGE".parse::<RelationKind>().unwrap(),
            RelationKind::InlineImage
        );
        assert!("banner".parse::<RelationKind>().is_err());
    }

    #[test]
    fn test_relation_kind_serde() {
        let json = serde_json::to_string(&RelationKind::InlineImage).unwrap();
        assert_eq!(json, "\"inline-image\"");
        let kind: RelationKind = serde_json::from_str("\"cover\"").unwrap();
        assert_eq!(kind, RelationKind::Cover);
    }
}
