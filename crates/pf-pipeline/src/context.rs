//! Progress senders handed to conversions and batches.

use pf_core::{BatchProgress, ConversionProgress};

/// Sender for reporting the progress of a single file.
pub struct ProgressSender {
    callback: Box<dyn Fn(&ConversionProgress) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&ConversionProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report progress.
    pub fn send(&self, progress: &ConversionProgress) {
        (self.callback)(progress);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Sender for whole-batch snapshots.
pub struct BatchProgressSender {
    callback: Box<dyn Fn(&BatchProgress) + Send + Sync>,
}

impl BatchProgressSender {
    pub fn new(callback: impl Fn(&BatchProgress) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, snapshot: &BatchProgress) {
        (self.callback)(snapshot);
    }
}

impl std::fmt::Debug for BatchProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProgressSender").finish_non_exhaustive()
    }
}
