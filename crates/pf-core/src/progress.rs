//! Progress and result values reported by the conversion pipeline.
//!
//! Everything here is a plain owned value. Subscribers receive clones, so a
//! snapshot never changes after it has been handed out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ids::FileId;
use crate::settings::OutputFormat;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Lifecycle stage of a single file conversion.
///
/// Stages advance in declaration order. `Error` is terminal and can follow
/// any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Preparing,
    Processing,
    Finalizing,
    Completed,
    Error,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparing => write!(f, "preparing"),
            Self::Processing => write!(f, "processing"),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionProgress
// ---------------------------------------------------------------------------

/// One progress report for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub stage: Stage,
    /// Percent complete in `[0, 100]`.
    pub percent: f32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<f64>,
}

impl ConversionProgress {
    pub fn new(stage: Stage, percent: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.clamp(0.0, 100.0),
            message: message.into(),
            elapsed_secs: None,
            remaining_secs: None,
        }
    }

    /// Initial progress for a file that has not started yet.
    pub fn pending() -> Self {
        Self::new(Stage::Preparing, 0.0, "Waiting")
    }

    /// Terminal error progress; percent resets to zero.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Stage::Error, 0.0, message)
    }

    /// Attach the elapsed time reported by the transcoder.
    pub fn with_elapsed(mut self, secs: f64) -> Self {
        self.elapsed_secs = Some(secs);
        self
    }
}

// ---------------------------------------------------------------------------
// ConversionResult
// ---------------------------------------------------------------------------

/// Final outcome of converting one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// `(1 - output_size / original_size) * 100`; negative when the output
    /// grew.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    pub original_size: u64,
    pub processing_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the failure was a deliberate cancellation.
    #[serde(default)]
    pub cancelled: bool,
}

impl ConversionResult {
    /// A successful result; the compression ratio is derived from the sizes.
    pub fn succeeded(
        output_path: PathBuf,
        output_size: u64,
        output_format: OutputFormat,
        original_size: u64,
        processing_secs: f64,
    ) -> Self {
        Self {
            success: true,
            output_path: Some(output_path),
            output_size: Some(output_size),
            output_format: Some(output_format),
            compression_ratio: Some(compression_ratio(original_size, output_size)),
            original_size,
            processing_secs,
            error: None,
            cancelled: false,
        }
    }

    /// A failed result carrying the error message.
    pub fn failed(original_size: u64, processing_secs: f64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            output_size: None,
            output_format: None,
            compression_ratio: None,
            original_size,
            processing_secs,
            error: Some(error.into()),
            cancelled: false,
        }
    }

    /// A failed result for a cancelled file.
    pub fn cancelled(original_size: u64, processing_secs: f64) -> Self {
        Self {
            cancelled: true,
            ..Self::failed(original_size, processing_secs, crate::Error::Cancelled.to_string())
        }
    }
}

/// Percentage of bytes saved going from `original` to `compressed`.
///
/// Returns `0.0` for an empty original to avoid dividing by zero.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - compressed as f64 / original as f64) * 100.0
}

// ---------------------------------------------------------------------------
// FileStatus / FileProgress
// ---------------------------------------------------------------------------

/// Status of one file within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Cancelled,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-file record inside a [`BatchProgress`] snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProgress {
    pub file_id: FileId,
    pub file_name: String,
    pub status: FileStatus,
    pub progress: ConversionProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ConversionResult>,
}

impl FileProgress {
    pub fn pending(file_id: FileId, file_name: impl Into<String>) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            status: FileStatus::Pending,
            progress: ConversionProgress::pending(),
            result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchProgress
// ---------------------------------------------------------------------------

/// Snapshot of a whole batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total_files: usize,
    /// Files in any terminal status.
    pub completed_files: usize,
    pub current_file_index: usize,
    pub overall_percent: f32,
    /// Per-file records in submission order.
    pub files: Vec<FileProgress>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_secs: Option<f64>,
}

impl BatchProgress {
    /// Look up the record for `file_id`.
    pub fn file(&self, file_id: &FileId) -> Option<&FileProgress> {
        self.files.iter().find(|f| &f.file_id == file_id)
    }
}

/// Remaining time extrapolated from average throughput so far.
///
/// `None` until at least one file has finished.
pub fn estimate_remaining(elapsed_secs: f64, completed: usize, total: usize) -> Option<f64> {
    if completed == 0 {
        return None;
    }
    let per_file = elapsed_secs / completed as f64;
    Some((per_file * total as f64 - elapsed_secs).max(0.0))
}
