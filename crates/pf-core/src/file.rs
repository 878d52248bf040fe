//! Input file descriptors and the table of accepted image types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// MIME types accepted as conversion input.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/avif",
    "image/bmp",
    "image/tiff",
    "image/gif",
    "image/heic",
    "image/heif",
];

/// File extensions accepted as conversion input (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "avif", "bmp", "tiff", "tif", "gif", "heic", "heif",
];

/// Default upper bound on input size: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// MIME type for a file extension, if it is one we accept.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// `true` if the MIME type is in [`SUPPORTED_MIME_TYPES`].
pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime)
}

/// `true` if the extension is in [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Lowercased extension of a path, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// One input file as submitted to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Display name (the file name component).
    pub name: String,
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Size in bytes; always greater than zero.
    pub size: u64,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
}

impl FileDescriptor {
    /// Build a descriptor by reading the file's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Validation`] if it is not a regular file or is empty.
    pub fn from_path(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path)?;
        let meta = std::fs::metadata(&path)?;

        if !meta.is_file() {
            return Err(Error::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if meta.len() == 0 {
            return Err(Error::Validation(format!("{} is empty", path.display())));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let mime_type = extension_of(&path)
            .and_then(|e| mime_for_extension(&e))
            .unwrap_or("application/octet-stream")
            .to_string();
        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Self {
            name,
            path,
            size: meta.len(),
            mime_type,
            last_modified,
        })
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(Path::new(&self.name))
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    /// `true` when either the MIME type or the extension is accepted.
    pub fn is_supported(&self) -> bool {
        is_supported_mime(&self.mime_type)
            || self.extension().is_some_and(|e| is_supported_extension(&e))
    }

    /// Key used to spot the same file submitted twice.
    pub fn duplicate_key(&self) -> (&str, u64) {
        (&self.name, self.size)
    }
}
