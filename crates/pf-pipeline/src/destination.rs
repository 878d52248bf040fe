//! Where converted files are written.
//!
//! A [`Destination`] picks the output path for each file. Returning `None`
//! declines the file, which the converter reports as a no-destination
//! failure. [`OutputDir`] is the default policy: `<dir>/<stem><suffix>.<ext>`
//! with `dir` falling back to the input's own directory.

use std::path::{Path, PathBuf};

use pf_core::file::extension_of;
use pf_core::{ConversionSettings, FileDescriptor, OutputFormat};

/// Extension used under `auto` when the input has none.
const FALLBACK_EXTENSION: &str = "jpg";

/// Chooses the output path for a file.
pub trait Destination: Send + Sync {
    fn resolve(&self, file: &FileDescriptor, settings: &ConversionSettings) -> Option<PathBuf>;
}

impl<F> Destination for F
where
    F: Fn(&FileDescriptor, &ConversionSettings) -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self, file: &FileDescriptor, settings: &ConversionSettings) -> Option<PathBuf> {
        self(file, settings)
    }
}

/// Writes outputs into one directory, or next to each input.
#[derive(Debug, Clone)]
pub struct OutputDir {
    dir: Option<PathBuf>,
    suffix: String,
}

impl OutputDir {
    pub fn new(dir: Option<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir,
            suffix: suffix.into(),
        }
    }

    /// Outputs land beside their inputs with the `_optimized` suffix.
    pub fn beside_input() -> Self {
        Self::new(None, "_optimized")
    }
}

impl Destination for OutputDir {
    fn resolve(&self, file: &FileDescriptor, settings: &ConversionSettings) -> Option<PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => file.path.parent()?.to_path_buf(),
        };
        Some(dir.join(output_file_name(file, settings.format, &self.suffix)))
    }
}

/// Output extension: the format's canonical one, or under `auto` the
/// lowercased input extension.
pub fn output_extension(file_name: &str, format: OutputFormat) -> String {
    match format.extension() {
        Some(ext) => ext.to_string(),
        None => extension_of(Path::new(file_name))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
    }
}

/// `<stem><suffix>.<ext>` for `file`.
pub fn output_file_name(file: &FileDescriptor, format: OutputFormat, suffix: &str) -> String {
    format!(
        "{}{suffix}.{}",
        file.stem(),
        output_extension(&file.name, format)
    )
}

/// Format reported for an output written to `path`.
///
/// An explicit request wins; under `auto` the output extension decides,
/// defaulting to JPEG for extensions outside the table.
pub fn output_format_for(path: &Path, requested: OutputFormat) -> OutputFormat {
    if requested != OutputFormat::Auto {
        return requested;
    }
    extension_of(path)
        .and_then(|e| OutputFormat::from_extension(&e))
        .unwrap_or(OutputFormat::Jpeg)
}
