//! The process runner: drives the external tools for one conversion.
//!
//! [`Transcoder::run`] turns an input path, an output path and settings into
//! one ffmpeg invocation (or the two-stage PNG path), forwarding progress
//! events and honoring cancellation. A run succeeds only when the tool
//! exited cleanly *and* the output file exists afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use pf_core::ConversionSettings;

use crate::args;
use crate::command::ToolCommand;
use crate::png;
use crate::progress::{self, TranscodeEvent};
use crate::tools::{ToolRegistry, FFMPEG};

/// Default per-invocation limit: 10 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Which path produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// A single ffmpeg invocation.
    Direct,
    /// Lossless PNG from the scratch stage, copied into place.
    PngLossless,
    /// Scratch PNG quantized by pngquant.
    PngQuantized,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub output_path: PathBuf,
    pub output_size: u64,
    pub strategy: Strategy,
}

/// Runs conversions using the tools in a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct Transcoder {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    png_optimizer: bool,
}

impl Transcoder {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: DEFAULT_TIMEOUT,
            png_optimizer: true,
        }
    }

    /// Builder: limit each tool invocation to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: enable or disable the two-stage PNG path.
    pub fn with_png_optimizer(mut self, enabled: bool) -> Self {
        self.png_optimizer = enabled;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Convert `input` into `output`.
    ///
    /// PNG outputs go through the scratch + quantizer path when it is
    /// enabled; if that path fails for any reason other than cancellation,
    /// the conversion is retried as a single ffmpeg pass.
    ///
    /// # Errors
    ///
    /// - [`pf_core::Error::ToolNotFound`] / [`pf_core::Error::Spawn`] when
    ///   ffmpeg cannot be started.
    /// - [`pf_core::Error::Tool`] when ffmpeg exits non-zero.
    /// - [`pf_core::Error::MissingOutput`] when it exits cleanly without
    ///   writing `output`.
    /// - [`pf_core::Error::Cancelled`] when `cancel` fires first.
    pub async fn run(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConversionSettings,
        mut on_event: impl FnMut(TranscodeEvent),
        cancel: &CancellationToken,
    ) -> pf_core::Result<TranscodeOutcome> {
        let is_png = pf_core::file::extension_of(output).as_deref() == Some("png");
        if is_png && self.png_optimizer {
            match png::optimize(self, input, output, settings, &mut on_event, cancel).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!("PNG optimization failed, retrying as a single pass: {e}");
                }
            }
        }

        let args = args::build(input, output, settings);
        self.ffmpeg(args, &mut on_event, cancel).await?;
        Ok(TranscodeOutcome {
            output_path: output.to_path_buf(),
            output_size: output_size(output)?,
            strategy: Strategy::Direct,
        })
    }

    /// Run ffmpeg with `args`, mapping stderr chunks to events.
    pub(crate) async fn ffmpeg(
        &self,
        args: Vec<String>,
        on_event: &mut impl FnMut(TranscodeEvent),
        cancel: &CancellationToken,
    ) -> pf_core::Result<()> {
        let ffmpeg = self.tools.require(FFMPEG)?;
        ToolCommand::new(ffmpeg.path.clone())
            .args(args)
            .timeout(self.timeout)
            .execute_with_stderr_callback(
                |chunk| {
                    if let Some(event) = progress::parse_event(chunk) {
                        on_event(event);
                    }
                },
                Some(cancel),
            )
            .await?;
        Ok(())
    }
}

/// Size of the file at `path`, or [`pf_core::Error::MissingOutput`].
pub(crate) fn output_size(path: &Path) -> pf_core::Result<u64> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        _ => Err(pf_core::Error::missing_output(path)),
    }
}
