use std::env;
use std::path::PathBuf;

/// Extensions accepted by the upload endpoint when `ALLOWED_EXTENSIONS` is unset
const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "webp",
    // Documents
    "pdf", "txt", "md", "csv", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Media
    "mp3", "wav", "ogg", "mp4", "webm", "mov",
    // Archives
    "zip", "gz", "tar", "7z",
];

/// Upper bound accepted for `THUMBNAIL_EXPIRY_DAYS`
pub const MAX_EXPIRY_DAYS: i64 = 3650;

/// Configuration for the content store and its HTTP surface
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Database connection string (default: local SQLite file)
    pub database_url: String,

    /// Root directory holding one sub-directory per blob category (default: "./storage")
    pub storage_root: PathBuf,

    /// Maximum upload size in bytes (default: 10 MiB)
    pub max_file_size: usize,

    /// Lower-cased extensions, without the dot, accepted on upload
    pub allowed_extensions: Vec<String>,

    /// Append the extension to allocated ids so files on disk keep it (default: true)
    pub retain_extension: bool,

    /// Edge length used when a thumbnail request names no size (default: 180)
    pub thumbnail_default_size: u32,

    /// Largest width or height a thumbnail may be requested at (default: 2000)
    pub thumbnail_max_dimension: u32,

    /// JPEG quality for derived artifacts (default: 80)
    pub jpeg_quality: u8,

    /// Derived artifacts not accessed for this many days are swept (default: 30)
    pub cache_expiry_days: i64,

    /// Seconds between background cleanup passes (default: 3600)
    pub cleanup_interval_secs: u64,

    /// Unregistered blobs younger than this are left alone by the orphan sweep (default: 3600)
    pub orphan_grace_secs: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/content.db?mode=rwc".to_string(),
            storage_root: PathBuf::from("./storage"),
            max_file_size: 10 * 1024 * 1024, // 10 MiB
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            retain_extension: true,
            thumbnail_default_size: 180,
            thumbnail_max_dimension: 2000,
            jpeg_quality: 80,
            cache_expiry_days: 30,
            cleanup_interval_secs: 3600,
            orphan_grace_secs: 3600,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl ContentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            storage_root: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.storage_root),

            max_file_size: env::var("UPLOAD_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| parse_extension_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(default.allowed_extensions),

            retain_extension: env::var("RETAIN_EXTENSION")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.retain_extension),

            thumbnail_default_size: env::var("THUMBNAIL_DEFAULT_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.thumbnail_default_size),

            thumbnail_max_dimension: env::var("THUMBNAIL_MAX_DIMENSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.thumbnail_max_dimension),

            jpeg_quality: env::var("THUMBNAIL_JPEG_QUALITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|q| (1..=100).contains(q))
                .unwrap_or(default.jpeg_quality),

            // Zero or negative would expire every entry on each pass
            cache_expiry_days: env::var("THUMBNAIL_EXPIRY_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|days| (1..=MAX_EXPIRY_DAYS).contains(days))
                .unwrap_or(default.cache_expiry_days),

            cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.cleanup_interval_secs),

            orphan_grace_secs: env::var("ORPHAN_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_grace_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development and tests, rooted at the given directories
    pub fn development(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            storage_root: storage_root.into(),
            orphan_grace_secs: 0,
            ..Self::default()
        }
    }

    pub fn is_extension_allowed(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
