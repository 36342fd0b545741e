//! Blob id allocation.
//!
//! New ids look like `{unix_millis}-{ext}-{jitter}[.{ext}]`. They are time and
//! random based, not content hashes, so a collision is unlikely but possible:
//! callers creating resources must treat a conflict as "allocate again".

use chrono::Utc;
use rand::Rng;
use std::path::Path;

/// Stands in for the extension when the upload had none
pub const EMPTY_EXTENSION_TOKEN: &str = "bin";

/// Upper bound (exclusive) of the random component
const JITTER_RANGE: u32 = 1_000_000;

#[derive(Debug, Clone, Copy)]
pub struct IdAllocator {
    retain_extension: bool,
}

impl IdAllocator {
    pub fn new(retain_extension: bool) -> Self {
        Self { retain_extension }
    }

    pub fn new_id(&self, extension: &str) -> String {
        let ext = normalize_extension(extension);
        let token = if ext.is_empty() {
            EMPTY_EXTENSION_TOKEN
        } else {
            ext.as_str()
        };
        let millis = Utc::now().timestamp_millis();
        let jitter = rand::thread_rng().gen_range(0..JITTER_RANGE);

        let mut id = format!("{}-{}-{}", millis, token, jitter);
        if self.retain_extension && !ext.is_empty() {
            id.push('.');
            id.push_str(&ext);
        }
        id
    }
}

/// Id of the derived artifact for `(source_id, width, height)`.
///
/// Deterministic, so the cache row and the file on disk always agree.
pub fn derive_id(source_id: &str, width: u32, height: u32) -> String {
    match split_extension(source_id) {
        Some((base, ext)) => format!("{}_{}x{}{}", base, width, height, ext),
        None => format!("{}_{}x{}", source_id, width, height),
    }
}

/// Lower-cased extension of `filename` including the dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default();
    if ext.is_empty() {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Strips the leading dot and lower-cases; anything that is not a plain
/// alphanumeric extension is dropped.
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return String::new();
    }
    ext
}

fn split_extension(id: &str) -> Option<(&str, &str)> {
    let idx = id.rfind('.')?;
    if idx == 0 || idx == id.len() - 1 {
        return None;
    }
    Some((&id[..idx], &id[idx..]))
}
