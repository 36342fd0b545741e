#![allow(dead_code)]

use async_trait::async_trait;
use blog_content_backend::AppState;
use blog_content_backend::config::ContentConfig;
use blog_content_backend::infrastructure::database;
use blog_content_backend::services::storage::{
    BlobMetadata, BlobStore, LocalBlobStore, StorageError,
};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Real filesystem store that records how often each blob was written
pub struct CountingBlobStore {
    inner: LocalBlobStore,
    saves: Mutex<HashMap<String, usize>>,
}

impl CountingBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: LocalBlobStore::new(root),
            saves: Mutex::new(HashMap::new()),
        }
    }

    pub fn save_count(&self, category: &str, id: &str) -> usize {
        let saves = self.saves.lock().unwrap();
        saves
            .get(&format!("{}/{}", category, id))
            .copied()
            .unwrap_or(0)
    }

    fn record(&self, category: &str, id: &str) {
        let mut saves = self.saves.lock().unwrap();
        *saves.entry(format!("{}/{}", category, id)).or_insert(0) += 1;
    }
}

#[async_trait]
impl BlobStore for CountingBlobStore {
    async fn save(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.inner.save(category, id, data).await?;
        self.record(category, id);
        Ok(())
    }

    async fn save_new(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.inner.save_new(category, id, data).await?;
        self.record(category, id);
        Ok(())
    }

    async fn get(&self, category: &str, id: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(category, id).await
    }

    async fn delete(&self, category: &str, id: &str) -> Result<(), StorageError> {
        self.inner.delete(category, id).await
    }

    async fn exists(&self, category: &str, id: &str) -> Result<bool, StorageError> {
        self.inner.exists(category, id).await
    }

    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(category).await
    }

    async fn metadata(&self, category: &str, id: &str) -> Result<BlobMetadata, StorageError> {
        self.inner.metadata(category, id).await
    }

    fn path(&self, category: &str, id: &str) -> Result<PathBuf, StorageError> {
        self.inner.path(category, id)
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

pub struct TestEnv {
    // Held so the directory outlives the test
    pub dir: TempDir,
    pub db: DatabaseConnection,
    pub store: Arc<CountingBlobStore>,
    pub config: ContentConfig,
    pub state: AppState,
}

pub async fn setup() -> TestEnv {
    setup_with(|_| {}).await
}

/// Fresh SQLite file and storage root in a temp directory
pub async fn setup_with(customize: impl FnOnce(&mut ContentConfig)) -> TestEnv {
    let dir = tempfile::tempdir().unwrap();

    let mut config = ContentConfig::development(dir.path().join("storage"));
    config.database_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("content.db").display()
    );
    customize(&mut config);

    let db = database::setup_database(&config.database_url)
        .await
        .unwrap();
    let store = Arc::new(CountingBlobStore::new(&config.storage_root));
    tokio::fs::create_dir_all(&config.storage_root).await.unwrap();
    let state = AppState::new(db.clone(), store.clone(), config.clone());

    TestEnv {
        dir,
        db,
        store,
        config,
        state,
    }
}

pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .unwrap();
    out
}

pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, _| {
        Rgb([(x % 256) as u8, 64, 200])
    }));
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
