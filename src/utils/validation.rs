use crate::config::ContentConfig;
use thiserror::Error;

/// Extensions the thumbnail cache can decode
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::new(
            "FILE_TOO_LARGE",
            format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        ));
    }
    Ok(())
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Keep only the last path component, whichever separator the client used
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "Filename cannot be empty",
        ));
    }

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError::new(
            "HIDDEN_FILE",
            "Hidden files (starting with '.') are not allowed",
        ));
    }

    Ok(sanitized)
}

/// Checks the (dotted or bare) extension against the configured allowlist
pub fn validate_extension(ext: &str, config: &ContentConfig) -> Result<(), ValidationError> {
    if ext.is_empty() {
        return Err(ValidationError::new(
            "MISSING_EXTENSION",
            "Files without an extension are not accepted",
        ));
    }
    if !config.is_extension_allowed(ext) {
        return Err(ValidationError::new(
            "BLOCKED_EXTENSION",
            format!("File extension '{}' is not allowed", ext),
        ));
    }
    Ok(())
}

pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF binary (Linux)
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return true;
    }

    // PE/COFF (Windows .exe, .dll)
    if header.starts_with(&[0x4D, 0x5A]) {
        return true;
    }

    // Mach-O (macOS)
    if header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
    {
        return true;
    }

    // Shebang (shell scripts)
    header.starts_with(b"#!")
}

/// MIME type from the extension, the way downstream consumers will read it
pub fn mime_for_extension(ext: &str) -> String {
    let ext = ext.trim_start_matches('.').to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => mime::IMAGE_JPEG.as_ref(),
        "png" => mime::IMAGE_PNG.as_ref(),
        "gif" => mime::IMAGE_GIF.as_ref(),
        "webp" => "image/webp",
        "pdf" => mime::APPLICATION_PDF.as_ref(),
        "txt" => mime::TEXT_PLAIN.as_ref(),
        "md" => "text/markdown",
        "csv" => mime::TEXT_CSV.as_ref(),
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "7z" => "application/x-7z-compressed",
        _ => mime::APPLICATION_OCTET_STREAM.as_ref(),
    };
    mime.to_string()
}

/// Detected MIME type of the content, falling back to the extension mapping
pub fn detect_mime(data: &[u8], ext: &str) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| mime_for_extension(ext))
}

/// Full validation pipeline for uploaded files
///
/// Returns the sanitized display name.
pub fn validate_upload(
    filename: &str,
    ext: &str,
    data: &[u8],
    config: &ContentConfig,
) -> Result<String, ValidationError> {
    // 1. Size check
    validate_file_size(data.len(), config.max_file_size)?;

    // 2. Sanitize filename
    let sanitized = sanitize_filename(filename)?;

    // 3. Extension allowlist
    validate_extension(ext, config)?;

    // 4. Content sniffing
    if data.is_empty() {
        return Err(ValidationError::new("EMPTY_FILE", "File appears to be empty"));
    }
    if is_executable_content(data) {
        return Err(ValidationError::new(
            "EXECUTABLE_CONTENT",
            "File contains executable content which is not allowed",
        ));
    }

    Ok(sanitized)
}

/// Resolved thumbnail edge lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailDimensions {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailDimensions {
    /// `size` sets both edges; otherwise each edge falls back to the default.
    /// Zero or anything above `max` is rejected.
    pub fn resolve(
        size: Option<u32>,
        width: Option<u32>,
        height: Option<u32>,
        default: u32,
        max: u32,
    ) -> Result<Self, ValidationError> {
        let (width, height) = match size {
            Some(size) => (size, size),
            None => (width.unwrap_or(default), height.unwrap_or(default)),
        };

        for (name, value) in [("width", width), ("height", height)] {
            if value == 0 || value > max {
                return Err(ValidationError::new(
                    "INVALID_DIMENSION",
                    format!("Thumbnail {} must be between 1 and {} (got {})", name, max, value),
                ));
            }
        }

        Ok(Self { width, height })
    }
}
