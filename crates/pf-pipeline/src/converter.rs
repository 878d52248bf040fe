//! Single-file conversion: prepare, run the transcoder, finalize.
//!
//! [`Converter::convert`] walks one file through its stages and always
//! returns a [`ConversionResult`]. Failures of any kind, cancellation
//! included, come back as a result with `success == false` and a matching
//! `error` progress report; nothing is raised to the caller.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use pf_av::Transcoder;
use pf_core::{ConversionProgress, ConversionResult, ConversionSettings, FileDescriptor, Stage};

use crate::context::ProgressSender;
use crate::destination::{output_format_for, Destination};

const PREPARING_PERCENT: f32 = 10.0;
const PROCESSING_START_PERCENT: f32 = 25.0;
const PROCESSING_END_PERCENT: f32 = 85.0;
const FINALIZING_PERCENT: f32 = 95.0;
/// Processing percent gained per second of media time reported by ffmpeg.
const PERCENT_PER_SECOND: f64 = 10.0;

/// Converts one file at a time.
pub struct Converter {
    transcoder: Arc<Transcoder>,
    destination: Arc<dyn Destination>,
}

impl Converter {
    pub fn new(transcoder: Transcoder, destination: impl Destination + 'static) -> Self {
        Self {
            transcoder: Arc::new(transcoder),
            destination: Arc::new(destination),
        }
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    pub fn destination(&self) -> &dyn Destination {
        self.destination.as_ref()
    }

    /// Convert `file` with `settings`, reporting through `progress`.
    pub async fn convert(
        &self,
        file: &FileDescriptor,
        settings: &ConversionSettings,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> ConversionResult {
        let started = Instant::now();
        let mut reporter = StageReporter::new(progress);

        match self
            .run_stages(file, settings, &mut reporter, cancel, started)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                let secs = started.elapsed().as_secs_f64();
                reporter.error(e.to_string());
                if e.is_cancelled() {
                    tracing::info!(file = %file.name, "Conversion cancelled");
                    ConversionResult::cancelled(file.size, secs)
                } else {
                    tracing::warn!(file = %file.name, "Conversion failed: {e}");
                    ConversionResult::failed(file.size, secs, e.to_string())
                }
            }
        }
    }

    async fn run_stages(
        &self,
        file: &FileDescriptor,
        settings: &ConversionSettings,
        reporter: &mut StageReporter<'_>,
        cancel: &CancellationToken,
        started: Instant,
    ) -> pf_core::Result<ConversionResult> {
        reporter.report(Stage::Preparing, PREPARING_PERCENT, "Preparing file");
        if cancel.is_cancelled() {
            return Err(pf_core::Error::Cancelled);
        }

        let output = self
            .destination
            .resolve(file, settings)
            .ok_or(pf_core::Error::NoDestination)?;
        ensure_parent_dir(&output).await?;

        if cancel.is_cancelled() {
            return Err(pf_core::Error::Cancelled);
        }

        tracing::info!(
            file = %file.name,
            output = %output.display(),
            %settings,
            "Converting"
        );
        reporter.report(Stage::Processing, PROCESSING_START_PERCENT, "Converting image");
        let outcome = self
            .transcoder
            .run(
                &file.path,
                &output,
                settings,
                |event| reporter.tick(event.elapsed_secs),
                cancel,
            )
            .await?;
        reporter.report(Stage::Processing, PROCESSING_END_PERCENT, "Conversion finished");
        if cancel.is_cancelled() {
            return Err(pf_core::Error::Cancelled);
        }

        reporter.report(Stage::Finalizing, FINALIZING_PERCENT, "Reading output file");
        let output_size = tokio::fs::metadata(&outcome.output_path)
            .await
            .map_err(|_| pf_core::Error::missing_output(&outcome.output_path))?
            .len();
        let output_format = output_format_for(&outcome.output_path, settings.format);

        let result = ConversionResult::succeeded(
            outcome.output_path,
            output_size,
            output_format,
            file.size,
            started.elapsed().as_secs_f64(),
        );
        tracing::info!(
            file = %file.name,
            strategy = ?outcome.strategy,
            "Converted {} -> {} bytes ({:.1}% smaller)",
            file.size,
            output_size,
            result.compression_ratio.unwrap_or_default()
        );
        reporter.report(Stage::Completed, 100.0, "Conversion complete");
        Ok(result)
    }
}

async fn ensure_parent_dir(path: &Path) -> pf_core::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(parent).await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Emits stage progress, keeping the percent non-decreasing.
struct StageReporter<'a> {
    sender: &'a ProgressSender,
    percent: f32,
}

impl<'a> StageReporter<'a> {
    fn new(sender: &'a ProgressSender) -> Self {
        Self {
            sender,
            percent: 0.0,
        }
    }

    fn report(&mut self, stage: Stage, percent: f32, message: &str) {
        self.percent = self.percent.max(percent);
        self.sender
            .send(&ConversionProgress::new(stage, self.percent, message));
    }

    /// Map transcoder time to a processing percent.
    fn tick(&mut self, elapsed_secs: f64) {
        let percent = (f64::from(PROCESSING_START_PERCENT) + elapsed_secs * PERCENT_PER_SECOND)
            .min(f64::from(PROCESSING_END_PERCENT)) as f32;
        self.percent = self.percent.max(percent);
        self.sender.send(
            &ConversionProgress::new(Stage::Processing, self.percent, "Converting image")
                .with_elapsed(elapsed_secs),
        );
    }

    fn error(&mut self, message: String) {
        self.percent = 0.0;
        self.sender.send(&ConversionProgress::error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::OutputDir;
    use chrono::Utc;
    use pf_av::ToolRegistry;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn file(path: PathBuf) -> FileDescriptor {
        FileDescriptor {
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            path,
            size: 1000,
            mime_type: "image/jpeg".into(),
            last_modified: Utc::now(),
        }
    }

    fn recorder() -> (ProgressSender, Arc<Mutex<Vec<ConversionProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sender = ProgressSender::new(move |p| sink.lock().unwrap().push(p.clone()));
        (sender, seen)
    }

    #[test]
    fn tick_is_capped_and_monotonic() {
        let (sender, seen) = recorder();
        let mut reporter = StageReporter::new(&sender);
        reporter.report(Stage::Processing, 25.0, "start");
        reporter.tick(1.0);
        reporter.tick(0.5);
        reporter.tick(100.0);

        let percents: Vec<f32> = seen.lock().unwrap().iter().map(|p| p.percent).collect();
        assert_eq!(percents, vec![25.0, 35.0, 35.0, 85.0]);
    }

    #[tokio::test]
    async fn declined_destination_is_a_failed_result() {
        let converter = Converter::new(
            Transcoder::new(Arc::new(ToolRegistry::empty())),
            |_: &FileDescriptor, _: &ConversionSettings| -> Option<PathBuf> { None },
        );
        let (sender, seen) = recorder();

        let result = converter
            .convert(
                &file(PathBuf::from("/photos/a.jpg")),
                &ConversionSettings::default(),
                &sender,
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert!(!result.cancelled);
        assert_eq!(result.error.as_deref(), Some("No output destination selected"));
        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.stage, Stage::Error);
        assert_eq!(last.percent, 0.0);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_runs_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(
            Transcoder::new(Arc::new(ToolRegistry::empty())),
            OutputDir::new(Some(dir.path().to_path_buf()), "_optimized"),
        );
        let token = CancellationToken::new();
        token.cancel();

        let result = converter
            .convert(
                &file(dir.path().join("a.jpg")),
                &ConversionSettings::default(),
                &ProgressSender::noop(),
                &token,
            )
            .await;

        assert!(result.cancelled);
        assert_eq!(result.original_size, 1000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_after_tool_exit_is_honored_before_finalizing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(&ffmpeg, "#!/bin/sh\nfor last; do :; done\nprintf 'x' > \"$last\"\n")
            .unwrap();
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = Converter::new(
            Transcoder::new(Arc::new(ToolRegistry::empty().with_tool(pf_av::FFMPEG, ffmpeg))),
            OutputDir::new(Some(dir.path().join("out")), "_optimized"),
        );
        let token = CancellationToken::new();
        let trigger = token.clone();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let sender = ProgressSender::new(move |p| {
            if p.message == "Conversion finished" {
                trigger.cancel();
            }
            sink.lock().unwrap().push(p.stage);
        });

        let result = converter
            .convert(
                &file(dir.path().join("a.jpg")),
                &ConversionSettings::default(),
                &sender,
                &token,
            )
            .await;

        assert!(result.cancelled, "{result:?}");
        assert!(!result.success);
        let stages = stages.lock().unwrap();
        assert!(!stages.contains(&Stage::Finalizing));
        assert!(!stages.contains(&Stage::Completed));
        assert_eq!(stages.last(), Some(&Stage::Error));
    }

    #[tokio::test]
    async fn missing_transcoder_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(
            Transcoder::new(Arc::new(ToolRegistry::empty())),
            OutputDir::new(Some(dir.path().join("out")), "_optimized"),
        );

        let result = converter
            .convert(
                &file(dir.path().join("a.jpg")),
                &ConversionSettings::default(),
                &ProgressSender::noop(),
                &CancellationToken::new(),
            )
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("ffmpeg not found"));
        assert!(dir.path().join("out").is_dir());
    }
}
