//! Batch pipeline integration tests
//!
//! Drives full batches through the pipeline with a shell script standing in
//! for ffmpeg, covering aggregate progress and both kinds of cancellation.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pf_av::{ToolRegistry, Transcoder, FFMPEG};
use pf_core::{
    BatchProgress, ConversionProgress, ConversionSettings, FileDescriptor, FileId, FileStatus,
    OutputFormat, QualityTier, ResizeTier, Stage,
};
use pf_pipeline::{BatchProgressSender, Converter, OutputDir, Pipeline, ProgressSender};
use serial_test::serial;
use tempfile::{tempdir, TempDir};

// -- Helpers ---------------------------------------------------------------

/// Inputs named `slow*` hang after reporting progress, `late*` write their
/// output after a second, `bad*` fail; everything else is written
/// immediately.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
input="$2"
for last; do :; done
case "${input##*/}" in
  *bad*) echo "Invalid data found when processing input" >&2; exit 1 ;;
  *slow*) echo "time=00:00:01.00" >&2; exec sleep 10 ;;
  *late*) sleep 1; printf 'optimized' > "$last"; exit 0 ;;
esac
echo "frame=    1 time=00:00:00.50 bitrate=N/A" >&2
printf 'optimized' > "$last"
"#;

struct Fixture {
    dir: TempDir,
    pipeline: Pipeline,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        fs::write(&ffmpeg, FAKE_FFMPEG).unwrap();
        fs::set_permissions(&ffmpeg, fs::Permissions::from_mode(0o755)).unwrap();

        let registry = ToolRegistry::empty().with_tool(FFMPEG, ffmpeg);
        let converter = Converter::new(
            Transcoder::new(Arc::new(registry)),
            OutputDir::new(Some(dir.path().join("out")), "_optimized"),
        );
        Self {
            dir,
            pipeline: Pipeline::new(converter),
        }
    }

    fn inputs(&self, names: &[&str]) -> Vec<FileDescriptor> {
        names
            .iter()
            .map(|name| {
                let path = self.dir.path().join(name);
                fs::write(&path, vec![0u8; 4096]).unwrap();
                FileDescriptor::from_path(&path).unwrap()
            })
            .collect()
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join("out").join(name)
    }
}

fn settings() -> ConversionSettings {
    ConversionSettings {
        quality: QualityTier::Standard,
        resize: ResizeTier::Original,
        format: OutputFormat::Auto,
    }
}

fn recorder() -> (BatchProgressSender, Arc<Mutex<Vec<BatchProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sender = BatchProgressSender::new(move |snap| sink.lock().unwrap().push(snap.clone()));
    (sender, seen)
}

fn assert_snapshots_consistent(snapshots: &[BatchProgress]) {
    let mut last_completed = 0;
    for snap in snapshots {
        assert!(snap.completed_files >= last_completed, "completed went backwards");
        assert!((0.0..=100.0).contains(&snap.overall_percent));
        last_completed = snap.completed_files;
    }
}

fn exists(path: &Path) -> bool {
    path.is_file()
}

// -- Tests -----------------------------------------------------------------

#[tokio::test]
#[serial]
async fn batch_converts_every_file_in_order() {
    let fx = Fixture::new();
    let files = fx.inputs(&["a.jpg", "b.png", "c.webp"]);
    let (sender, seen) = recorder();

    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert!(exists(&fx.output("a_optimized.jpg")));
    assert!(exists(&fx.output("b_optimized.png")));
    assert!(exists(&fx.output("c_optimized.webp")));

    let first = &results[0];
    assert_eq!(first.output_size, Some(9));
    assert_eq!(first.output_format, Some(OutputFormat::Jpeg));
    let expected_ratio = (1.0 - 9.0 / 4096.0) * 100.0;
    assert!((first.compression_ratio.unwrap() - expected_ratio).abs() < 1e-6);

    let snapshots = seen.lock().unwrap();
    assert_snapshots_consistent(&snapshots);
    let last = snapshots.last().unwrap();
    assert_eq!(last.completed_files, 3);
    assert_eq!(last.overall_percent, 100.0);
    assert_eq!(last.files[1].file_id, FileId::new("b.png", 1));
    assert!(last.files.iter().all(|f| f.status == FileStatus::Completed));
    assert!(last.files.iter().all(|f| f.progress.stage == Stage::Completed));
}

#[tokio::test]
#[serial]
async fn cancelling_a_pending_file_skips_only_that_file() {
    let fx = Fixture::new();
    let files = fx.inputs(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);
    let handle = fx.pipeline.cancel_handle();
    let fired = AtomicBool::new(false);
    let (record, seen) = recorder();
    let sender = BatchProgressSender::new(move |snap| {
        if !fired.swap(true, Ordering::SeqCst) {
            handle.cancel_one(&FileId::new("c.jpg", 2));
        }
        record.send(snap);
    });

    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert_eq!(results.len(), 5);
    assert!(!results[2].success);
    assert!(results[2].cancelled);
    assert!(!exists(&fx.output("c_optimized.jpg")));
    for i in [0, 1, 3, 4] {
        assert!(results[i].success, "file {i}: {:?}", results[i]);
    }

    let snapshots = seen.lock().unwrap();
    assert_snapshots_consistent(&snapshots);
    let last = snapshots.last().unwrap();
    assert_eq!(last.files[2].status, FileStatus::Cancelled);
    assert_eq!(last.files[3].status, FileStatus::Completed);
    assert_eq!(last.files[4].status, FileStatus::Completed);
    assert!(snapshots
        .iter()
        .all(|s| s.files[2].status != FileStatus::Processing));
}

#[tokio::test]
#[serial]
async fn cancelling_the_batch_stops_before_the_next_file() {
    let fx = Fixture::new();
    let files = fx.inputs(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);
    let handle = fx.pipeline.cancel_handle();
    let (record, seen) = recorder();
    let sender = BatchProgressSender::new(move |snap| {
        if snap.completed_files == 1 {
            handle.cancel_all();
        }
        record.send(snap);
    });

    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert!((1..=2).contains(&results.len()), "{} results", results.len());
    assert!(results[0].success);

    let snapshots = seen.lock().unwrap();
    assert_snapshots_consistent(&snapshots);
    for snap in snapshots.iter() {
        for idx in 2..5 {
            assert_ne!(snap.files[idx].status, FileStatus::Processing);
        }
    }
    assert!(!exists(&fx.output("e_optimized.jpg")));
}

#[tokio::test]
#[serial]
async fn cancelling_a_running_file_kills_the_tool() {
    let fx = Fixture::new();
    let files = fx.inputs(&["slow.jpg", "fast.jpg"]);
    let handle = fx.pipeline.cancel_handle();
    let sender = BatchProgressSender::new(move |snap| {
        let slow = &snap.files[0];
        if slow.status == FileStatus::Processing && slow.progress.elapsed_secs.is_some() {
            handle.cancel_one(&slow.file_id);
        }
    });

    let started = Instant::now();
    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results.len(), 2);
    assert!(results[0].cancelled);
    assert_eq!(results[0].error.as_deref(), Some("Conversion cancelled"));
    assert!(results[1].success);
}

#[tokio::test]
#[serial]
async fn cancelling_the_batch_kills_the_running_tool() {
    let fx = Fixture::new();
    let files = fx.inputs(&["slow.jpg", "b.jpg", "c.jpg"]);
    let handle = fx.pipeline.cancel_handle();
    let (record, seen) = recorder();
    let sender = BatchProgressSender::new(move |snap| {
        let slow = &snap.files[0];
        if slow.status == FileStatus::Processing && slow.progress.elapsed_secs.is_some() {
            handle.cancel_all();
        }
        record.send(snap);
    });

    let started = Instant::now();
    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results.len(), 1);
    assert!(results[0].cancelled);
    assert!(!results[0].success);

    let snapshots = seen.lock().unwrap();
    let last = snapshots.last().unwrap();
    assert_eq!(last.files[0].status, FileStatus::Cancelled);
    assert_eq!(last.files[1].status, FileStatus::Pending);
    assert_eq!(last.files[2].status, FileStatus::Pending);
    assert!(!exists(&fx.output("b_optimized.jpg")));
}

#[tokio::test]
#[serial]
async fn cancel_all_before_the_run_starts_is_kept() {
    let fx = Fixture::new();
    let files = fx.inputs(&["a.jpg", "b.jpg"]);

    fx.pipeline.cancel_all();
    let results = fx
        .pipeline
        .convert_batch(&files, &settings(), &BatchProgressSender::noop())
        .await;
    assert!(results.is_empty());
    assert!(!exists(&fx.output("a_optimized.jpg")));

    // The request was consumed by that run.
    let results = fx
        .pipeline
        .convert_batch(&files, &settings(), &BatchProgressSender::noop())
        .await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
#[serial]
async fn dropping_the_batch_future_stops_the_tool() {
    let fx = Fixture::new();
    let files = fx.inputs(&["late.jpg"]);

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        fx.pipeline
            .convert_batch(&files, &settings(), &BatchProgressSender::noop()),
    )
    .await;
    assert!(outcome.is_err(), "batch should still have been running");

    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(!exists(&fx.output("late_optimized.jpg")));

    // The abandoned run no longer holds the pipeline.
    let files = fx.inputs(&["a.jpg"]);
    let results = fx
        .pipeline
        .convert_batch(&files, &settings(), &BatchProgressSender::noop())
        .await;
    assert!(results[0].success);
}

#[tokio::test]
#[serial]
async fn dropping_a_single_conversion_stops_the_tool() {
    let fx = Fixture::new();
    let file = fx.inputs(&["late.jpg"]).remove(0);

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        fx.pipeline
            .convert_one(&file, &settings(), ProgressSender::noop()),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert!(!exists(&fx.output("late_optimized.jpg")));
}

#[tokio::test]
#[serial]
async fn a_failed_file_does_not_stop_the_batch() {
    let fx = Fixture::new();
    let files = fx.inputs(&["a.jpg", "bad.jpg", "c.jpg"]);
    let (sender, seen) = recorder();

    let results = fx.pipeline.convert_batch(&files, &settings(), &sender).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(!results[1].cancelled);
    assert!(results[1]
        .error
        .as_deref()
        .unwrap()
        .contains("Invalid data found"));
    assert!(results[2].success);

    let snapshots = seen.lock().unwrap();
    let last = snapshots.last().unwrap();
    assert_eq!(last.files[1].status, FileStatus::Error);
    assert_eq!(last.files[1].progress.stage, Stage::Error);
    assert_eq!(last.files[1].progress.percent, 0.0);
    assert_eq!(last.completed_files, 3);
}

#[tokio::test]
#[serial]
async fn single_conversion_reports_monotonic_stages() {
    let fx = Fixture::new();
    let file = fx.inputs(&["photo.jpg"]).remove(0);
    let seen = Arc::new(Mutex::new(Vec::<ConversionProgress>::new()));
    let sink = Arc::clone(&seen);

    let result = fx
        .pipeline
        .convert_one(
            &file,
            &settings(),
            ProgressSender::new(move |p| sink.lock().unwrap().push(p.clone())),
        )
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.output_path.as_deref(), Some(fx.output("photo_optimized.jpg").as_path()));

    let reports = seen.lock().unwrap();
    let percents: Vec<f32> = reports.iter().map(|p| p.percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    let stages: Vec<Stage> = reports.iter().map(|p| p.stage).collect();
    assert!(stages.windows(2).all(|w| w[0] <= w[1]), "{stages:?}");
    assert_eq!(stages.first(), Some(&Stage::Preparing));
    let last = reports.last().unwrap();
    assert_eq!(last.stage, Stage::Completed);
    assert_eq!(last.percent, 100.0);
    assert!(reports
        .iter()
        .any(|p| p.stage == Stage::Processing && p.elapsed_secs == Some(0.5)));
}

#[tokio::test]
#[serial]
async fn empty_batch_returns_nothing() {
    let fx = Fixture::new();
    let (sender, seen) = recorder();
    let results = fx.pipeline.convert_batch(&[], &settings(), &sender).await;
    assert!(results.is_empty());
    assert!(seen.lock().unwrap().is_empty());
}
