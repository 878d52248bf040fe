//! Two-stage PNG output: lossless ffmpeg pass, then optional quantization.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use pf_core::{ConversionSettings, QualityTier};

use crate::args;
use crate::command::ToolCommand;
use crate::encoder::pngquant_quality;
use crate::progress::TranscodeEvent;
use crate::tools::PNGQUANT;
use crate::transcode::{output_size, Strategy, TranscodeOutcome, Transcoder};
use crate::workspace::Workspace;

/// Write `input` as a PNG at `output`.
///
/// Stage one writes a maximally compressed lossless PNG into a scratch
/// directory. If pngquant is available it writes the final file from the
/// scratch copy; otherwise, or if it fails, the scratch copy itself is moved
/// into place. Scratch files are removed on every path.
pub(crate) async fn optimize(
    transcoder: &Transcoder,
    input: &Path,
    output: &Path,
    settings: &ConversionSettings,
    on_event: &mut impl FnMut(TranscodeEvent),
    cancel: &CancellationToken,
) -> pf_core::Result<TranscodeOutcome> {
    let workspace = Workspace::new(input)?;
    let scratch = workspace.scratch("png");

    let scratch_args = args::build_png_scratch(input, &scratch, settings);
    transcoder.ffmpeg(scratch_args, on_event, cancel).await?;
    output_size(&scratch)?;

    match transcoder.tools().get(PNGQUANT) {
        Some(pngquant) => {
            match quantize(&pngquant.path, transcoder, &scratch, output, settings.quality, cancel)
                .await
            {
                Ok(size) => {
                    return Ok(TranscodeOutcome {
                        output_path: output.to_path_buf(),
                        output_size: size,
                        strategy: Strategy::PngQuantized,
                    });
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => tracing::warn!("pngquant failed, keeping the lossless PNG: {e}"),
            }
        }
        None => tracing::debug!("pngquant not available, keeping the lossless PNG"),
    }

    let size = workspace.promote(&scratch, output)?;
    Ok(TranscodeOutcome {
        output_path: output.to_path_buf(),
        output_size: size,
        strategy: Strategy::PngLossless,
    })
}

/// `pngquant --quality <lo>-<hi> --output <output> <scratch>`
async fn quantize(
    pngquant: &Path,
    transcoder: &Transcoder,
    scratch: &Path,
    output: &Path,
    quality: QualityTier,
    cancel: &CancellationToken,
) -> pf_core::Result<u64> {
    // pngquant refuses to replace an existing file.
    if output.exists() {
        std::fs::remove_file(output)?;
    }

    let (lo, hi) = pngquant_quality(quality);
    ToolCommand::new(pngquant.to_path_buf())
        .arg("--quality")
        .arg(format!("{lo}-{hi}"))
        .arg("--output")
        .arg(output.to_string_lossy())
        .arg(scratch.to_string_lossy())
        .timeout(transcoder.timeout())
        .execute_with_stderr_callback(|_| {}, Some(cancel))
        .await?;
    output_size(output)
}
