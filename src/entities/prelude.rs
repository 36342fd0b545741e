pub use super::attachment_relations::Entity as AttachmentRelations;
pub use super::file_resources::Entity as FileResources;
pub use super::thumbnail_caches::Entity as ThumbnailCaches;
