//! # pf-pipeline
//!
//! Orchestration of image conversions.
//!
//! This crate provides:
//!
//! - **[`Converter`]** -- one file's lifecycle (prepare, transcode, finalize)
//!   with stage progress and a structured result.
//! - **[`Pipeline`]** -- sequential batch driver with aggregate snapshots,
//!   per-file and whole-batch cancellation.
//! - **[`Destination`]** -- output path policy, with [`OutputDir`] as the
//!   default.
//! - **[`estimate`]** -- size estimates shown before converting.
//! - **[`ProgressSender`] / [`BatchProgressSender`]** -- progress callbacks.

pub mod batch;
pub mod context;
pub mod converter;
pub mod destination;
pub mod estimate;

// Re-export key types at the crate root.
pub use batch::{CancelHandle, Pipeline};
pub use context::{BatchProgressSender, ProgressSender};
pub use converter::Converter;
pub use destination::{Destination, OutputDir};
pub use estimate::{estimate_batch, estimate_size, BatchEstimate};
