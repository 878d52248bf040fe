//! # pf-av
//!
//! External tool management and the image transcoding runner for the
//! pixforged pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and pngquant.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   streaming stderr, and cancellation.
//! - **Settings resolution** ([`encoder::resolve`]) -- quality tier and
//!   format to concrete encoder parameters.
//! - **Argument synthesis** ([`args::build`]) -- ordered ffmpeg argument
//!   lists with a single filter chain.
//! - **Conversion runner** ([`Transcoder`]) -- one file's tool invocations,
//!   including the two-stage PNG path.
//! - **Workspace management** ([`Workspace`]) -- scratch directory lifecycle.

pub mod args;
pub mod command;
pub mod encoder;
mod png;
pub mod progress;
pub mod tools;
pub mod transcode;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::EncoderParams;
pub use progress::TranscodeEvent;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, FFMPEG, PNGQUANT};
pub use transcode::{Strategy, TranscodeOutcome, Transcoder};
pub use workspace::Workspace;
