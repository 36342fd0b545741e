use crate::config::ContentConfig;
use crate::services::storage::{LocalBlobStore, categories};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &ContentConfig) -> anyhow::Result<Arc<LocalBlobStore>> {
    info!("💾 Blob Storage root: {}", config.storage_root.display());

    let store = LocalBlobStore::new(&config.storage_root);
    store.ensure_root().await?;

    for category in [categories::FILES, categories::BLOG_ASSETS, categories::THUMBNAILS] {
        tokio::fs::create_dir_all(config.storage_root.join(category)).await?;
    }

    info!("✅ Blob storage is ready");
    Ok(Arc::new(store))
}
