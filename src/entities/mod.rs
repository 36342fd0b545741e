pub mod prelude;

pub mod attachment_relations;
pub mod file_resources;
pub mod thumbnail_caches;
