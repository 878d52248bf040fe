//! Unified error type for the pixforged workspace.
//!
//! Every crate funnels its failures into [`Error`]. The variants mirror the
//! ways a single conversion can go wrong, so the converter can turn any of
//! them into a failed result with a message a user can act on.

use std::path::{Path, PathBuf};

/// Unified error type covering all failure modes in pixforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool was not found by discovery.
    #[error("{tool} not found; is it installed and in PATH?")]
    ToolNotFound {
        /// Name of the missing tool.
        tool: String,
    },

    /// The external process could not be started.
    #[error("Failed to start {tool}: {message}")]
    Spawn {
        /// Name of the tool that could not be spawned.
        tool: String,
        /// Underlying OS error text.
        message: String,
    },

    /// An external tool ran but reported failure.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, usually including stderr.
        message: String,
    },

    /// The tool exited successfully but the declared output is absent.
    #[error("Tool reported success but produced no output at {}", path.display())]
    MissingOutput {
        /// Path the tool was asked to write.
        path: PathBuf,
    },

    /// The operation was cancelled by the caller.
    #[error("Conversion cancelled")]
    Cancelled,

    /// No destination path was provided for the output.
    #[error("No output destination selected")]
    NoDestination,

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::ToolNotFound`].
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Spawn`].
    pub fn spawn(tool: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Error::Spawn {
            tool: tool.into(),
            message: source.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::MissingOutput`].
    pub fn missing_output(path: &Path) -> Self {
        Error::MissingOutput {
            path: path.to_path_buf(),
        }
    }

    /// `true` when the failure was caused by deliberate cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
