//! Batch orchestration: sequential conversion with aggregate progress and
//! cancellation.
//!
//! [`Pipeline`] drives a [`Converter`] over an ordered list of files, one
//! at a time. Each conversion runs in its own task and streams progress back
//! over a channel, so the per-file records are only ever touched by the
//! orchestrating loop. Every change produces a fresh [`BatchProgress`]
//! snapshot for the subscriber.
//!
//! Cancellation goes through a [`CancelHandle`]: one token for the batch and
//! a child token per started file. Cancelling the batch therefore also kills
//! whatever tool is running at that moment. The conversion task is owned by
//! the caller's future: dropping that future aborts the task and kills the
//! tool with it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use pf_core::progress::estimate_remaining;
use pf_core::{
    BatchId, BatchProgress, ConversionProgress, ConversionResult, ConversionSettings,
    FileDescriptor, FileId, FileProgress, FileStatus, Stage,
};

use pf_av::{ToolRegistry, Transcoder};
use pf_core::config::Config;

use crate::context::{BatchProgressSender, ProgressSender};
use crate::converter::Converter;
use crate::destination::OutputDir;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CancelState {
    batch: CancellationToken,
    running: HashMap<FileId, CancellationToken>,
    cancelled: HashSet<FileId>,
}

/// Cloneable handle for cancelling a running batch or individual files.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    state: Arc<Mutex<CancelState>>,
}

impl CancelHandle {
    /// Cancel one file. A file that has not started yet is skipped when the
    /// batch reaches it; a running file has its tool killed.
    pub fn cancel_one(&self, file_id: &FileId) {
        let mut state = self.state.lock();
        state.cancelled.insert(file_id.clone());
        if let Some(token) = state.running.get(file_id) {
            token.cancel();
        }
        tracing::info!(file_id = %file_id, "File cancellation requested");
    }

    /// Cancel the whole run, including the file currently converting.
    ///
    /// When no run is active the request applies to the next one.
    pub fn cancel_all(&self) {
        self.state.lock().batch.cancel();
        tracing::info!("Batch cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().batch.is_cancelled()
    }

    /// Start a run. Requests made since the last run ended stay in force.
    fn begin_run(&self) -> RunScope {
        let batch = self.state.lock().batch.clone();
        RunScope {
            handle: self.clone(),
            batch,
        }
    }

    fn end_run(&self) {
        *self.state.lock() = CancelState::default();
    }

    /// Token for a file about to start, or `None` if it was cancelled.
    fn begin_file(&self, file_id: &FileId) -> Option<CancellationToken> {
        let mut state = self.state.lock();
        if state.cancelled.contains(file_id) {
            return None;
        }
        let token = state.batch.child_token();
        state.running.insert(file_id.clone(), token.clone());
        Some(token)
    }

    fn end_file(&self, file_id: &FileId) {
        self.state.lock().running.remove(file_id);
    }
}

/// One run's view of the cancellation state; clears it when dropped, whether
/// the run finished or its future was dropped.
struct RunScope {
    handle: CancelHandle,
    batch: CancellationToken,
}

impl Drop for RunScope {
    fn drop(&mut self) {
        self.handle.end_run();
    }
}

// ---------------------------------------------------------------------------
// Batch state
// ---------------------------------------------------------------------------

/// Per-file records for one run, indexed by submission position.
struct BatchState {
    files: Vec<FileProgress>,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl BatchState {
    fn new(files: &[FileDescriptor]) -> Self {
        Self {
            files: files
                .iter()
                .enumerate()
                .map(|(i, f)| FileProgress::pending(FileId::new(&f.name, i), f.name.clone()))
                .collect(),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    fn file_id(&self, index: usize) -> &FileId {
        &self.files[index].file_id
    }

    fn start(&mut self, index: usize) {
        let record = &mut self.files[index];
        record.status = FileStatus::Processing;
        record.progress = ConversionProgress::new(Stage::Preparing, 0.0, "Starting");
    }

    fn update(&mut self, index: usize, progress: ConversionProgress) {
        let record = &mut self.files[index];
        if record.status == FileStatus::Processing {
            record.progress = progress;
        }
    }

    fn finish(&mut self, index: usize, status: FileStatus, result: ConversionResult) {
        let record = &mut self.files[index];
        if record.status.is_terminal() {
            return;
        }
        if !result.success && record.progress.stage != Stage::Error {
            record.progress =
                ConversionProgress::error(result.error.clone().unwrap_or_default());
        }
        record.status = status;
        record.result = Some(result);
    }

    fn completed(&self) -> usize {
        self.files.iter().filter(|f| f.status.is_terminal()).count()
    }

    fn snapshot(&self, current_index: usize) -> BatchProgress {
        let total = self.files.len();
        let completed = self.completed();
        let overall_percent = if total == 0 {
            0.0
        } else {
            completed as f32 / total as f32 * 100.0
        };
        BatchProgress {
            total_files: total,
            completed_files: completed,
            current_file_index: current_index,
            overall_percent,
            files: self.files.clone(),
            start_time: self.start_time,
            estimated_remaining_secs: estimate_remaining(
                self.started.elapsed().as_secs_f64(),
                completed,
                total,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Entry point for single and batch conversions.
///
/// Runs are serialized: a second call waits until the first returns, so at
/// most one external tool is active per pipeline.
pub struct Pipeline {
    converter: Arc<Converter>,
    cancel: CancelHandle,
    run_lock: tokio::sync::Mutex<()>,
}

impl Pipeline {
    pub fn new(converter: Converter) -> Self {
        Self {
            converter: Arc::new(converter),
            cancel: CancelHandle::default(),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a pipeline from configuration: tool timeout, PNG optimizer
    /// switch, output directory and suffix.
    pub fn from_config(config: &Config, tools: Arc<ToolRegistry>) -> Self {
        let transcoder = Transcoder::new(tools)
            .with_timeout(config.tools.timeout())
            .with_png_optimizer(config.conversion.png_optimizer);
        let destination = OutputDir::new(
            config.conversion.output_dir.clone(),
            config.conversion.suffix.clone(),
        );
        Self::new(Converter::new(transcoder, destination))
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// A handle that can cancel from another task or a progress callback.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel_one(&self, file_id: &FileId) {
        self.cancel.cancel_one(file_id);
    }

    pub fn cancel_all(&self) {
        self.cancel.cancel_all();
    }

    /// Convert a single file. Its id is `"{name}-0"`.
    pub async fn convert_one(
        &self,
        file: &FileDescriptor,
        settings: &ConversionSettings,
        progress: ProgressSender,
    ) -> ConversionResult {
        let _guard = self.run_lock.lock().await;
        let run = self.cancel.begin_run();
        let file_id = FileId::new(&file.name, 0);
        let token = match self.cancel.begin_file(&file_id) {
            Some(token) if !run.batch.is_cancelled() => token,
            _ => {
                tracing::info!(file_id = %file_id, "Conversion cancelled before start");
                progress.send(&ConversionProgress::error(pf_core::Error::Cancelled.to_string()));
                return ConversionResult::cancelled(file.size, 0.0);
            }
        };

        let started = Instant::now();
        let item_guard = token.clone().drop_guard();
        let joined = self.spawn_item(file, settings, progress, token).await;
        item_guard.disarm();
        self.cancel.end_file(&file_id);
        join_result(joined, file, started)
    }

    /// Convert `files` in order, returning one result per file that was
    /// reached. Files never reached because the batch was cancelled are
    /// omitted.
    pub async fn convert_batch(
        &self,
        files: &[FileDescriptor],
        settings: &ConversionSettings,
        on_progress: &BatchProgressSender,
    ) -> Vec<ConversionResult> {
        let _guard = self.run_lock.lock().await;
        let run = self.cancel.begin_run();
        let batch_id = BatchId::new();
        let mut state = BatchState::new(files);
        let mut results = Vec::with_capacity(files.len());

        tracing::info!(batch = %batch_id, %settings, "Starting batch of {} file(s)", files.len());

        for (index, file) in files.iter().enumerate() {
            if run.batch.is_cancelled() {
                tracing::info!(
                    batch = %batch_id,
                    "Batch cancelled; {} file(s) not started",
                    files.len() - index
                );
                break;
            }

            let file_id = state.file_id(index).clone();
            let Some(token) = self.cancel.begin_file(&file_id) else {
                tracing::info!(batch = %batch_id, file_id = %file_id, "Skipping cancelled file");
                let result = ConversionResult::cancelled(file.size, 0.0);
                state.finish(index, FileStatus::Cancelled, result.clone());
                on_progress.send(&state.snapshot(index));
                results.push(result);
                continue;
            };

            state.start(index);
            on_progress.send(&state.snapshot(index));

            let (tx, mut rx) = mpsc::unbounded_channel::<ConversionProgress>();
            let progress = ProgressSender::new(move |p| {
                let _ = tx.send(p.clone());
            });
            let started = Instant::now();
            let item_guard = token.clone().drop_guard();
            let mut handle = self.spawn_item(file, settings, progress, token.clone());

            let joined = loop {
                tokio::select! {
                    biased;
                    Some(update) = rx.recv() => {
                        state.update(index, update);
                        on_progress.send(&state.snapshot(index));
                    }
                    joined = &mut handle => break joined,
                }
            };
            while let Ok(update) = rx.try_recv() {
                state.update(index, update);
                on_progress.send(&state.snapshot(index));
            }
            item_guard.disarm();
            self.cancel.end_file(&file_id);

            let result = join_result(joined, file, started);
            let status = if result.success {
                FileStatus::Completed
            } else if result.cancelled || token.is_cancelled() {
                FileStatus::Cancelled
            } else {
                FileStatus::Error
            };
            tracing::info!(batch = %batch_id, file_id = %file_id, %status, "File finished");

            state.finish(index, status, result.clone());
            on_progress.send(&state.snapshot(index));
            results.push(result);
        }

        tracing::info!(
            batch = %batch_id,
            "Batch finished: {} of {} succeeded",
            results.iter().filter(|r| r.success).count(),
            files.len()
        );
        results
    }

    /// Run one conversion in its own task. The task is aborted if the
    /// returned handle is dropped before it finishes.
    fn spawn_item(
        &self,
        file: &FileDescriptor,
        settings: &ConversionSettings,
        progress: ProgressSender,
        token: CancellationToken,
    ) -> AbortOnDropHandle<ConversionResult> {
        let converter = Arc::clone(&self.converter);
        let file = file.clone();
        let settings = *settings;
        AbortOnDropHandle::new(tokio::spawn(async move {
            converter.convert(&file, &settings, &progress, &token).await
        }))
    }
}

/// Turn a conversion task's outcome into a result; a panicked task becomes
/// a failed result for that file only.
fn join_result(
    joined: Result<ConversionResult, JoinError>,
    file: &FileDescriptor,
    started: Instant,
) -> ConversionResult {
    match joined {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(file = %file.name, "Conversion task failed: {e}");
            ConversionResult::failed(
                file.size,
                started.elapsed().as_secs_f64(),
                format!("Internal error: {e}"),
            )
        }
    }
}
