//! pf-core: shared types, IDs, errors, settings, and configuration.
//!
//! This crate is the foundational dependency for the other pf-* crates,
//! providing the conversion settings enums, file descriptors, progress and
//! result values, a unified error type, and application configuration.

pub mod config;
pub mod error;
pub mod file;
pub mod ids;
pub mod progress;
pub mod settings;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use file::FileDescriptor;
pub use ids::*;
pub use progress::*;
pub use settings::*;
