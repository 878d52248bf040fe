//! Scratch space for multi-stage conversions.
//!
//! A [`Workspace`] owns a temporary directory holding intermediate files.
//! Whatever is left in it is removed when the workspace is dropped, so a
//! failed or cancelled conversion never leaves scratch files behind.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory for one conversion's intermediate files.
///
/// # Example
///
/// ```no_run
/// use pf_av::Workspace;
/// use std::path::Path;
///
/// let workspace = Workspace::new(Path::new("/photos/cat.jpg")).unwrap();
/// let scratch = workspace.scratch("png");
/// // ... write the intermediate file to `scratch` ...
/// workspace.promote(&scratch, Path::new("/photos/cat_optimized.png")).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
    input_path: PathBuf,
}

impl Workspace {
    /// Create a workspace for converting `input`.
    pub fn new(input: &Path) -> pf_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("pixforged-")
            .tempdir()
            .map_err(|e| pf_core::Error::Internal(format!("failed to create temp dir: {e}")))?;

        Ok(Self {
            temp_dir,
            input_path: input.to_path_buf(),
        })
    }

    /// The original input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Scratch path named after the input's stem with extension `ext`.
    pub fn scratch(&self, ext: &str) -> PathBuf {
        let stem = self
            .input_path
            .file_stem()
            .unwrap_or_else(|| std::ffi::OsStr::new("scratch"));
        self.temp_dir.path().join(stem).with_extension(ext)
    }

    /// Copy `scratch` to `dest`, then delete `scratch`. Returns the size of
    /// the copied file.
    ///
    /// # Errors
    ///
    /// Fails with [`pf_core::Error::MissingOutput`] if `scratch` does not
    /// exist, or with an I/O error if the copy fails.
    pub fn promote(&self, scratch: &Path, dest: &Path) -> pf_core::Result<u64> {
        if !scratch.exists() {
            return Err(pf_core::Error::missing_output(scratch));
        }
        let size = std::fs::copy(scratch, dest)?;
        if let Err(e) = std::fs::remove_file(scratch) {
            tracing::debug!("Failed to remove scratch file {}: {e}", scratch.display());
        }
        Ok(size)
    }
}
