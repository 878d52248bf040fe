//! Parsing of ffmpeg's stderr progress output.

use std::sync::LazyLock;

use regex::Regex;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("valid time regex")
});

/// A normalized event produced while the transcoder runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeEvent {
    /// Media time reached, in seconds.
    pub elapsed_secs: f64,
}

/// Extract the last `time=HH:MM:SS.ff` token in `chunk` as seconds.
///
/// Chunks without a time token yield `None`.
pub fn parse_time(chunk: &str) -> Option<f64> {
    let caps = TIME_RE.captures_iter(chunk).last()?;
    let field = |i: usize| caps[i].parse::<f64>().ok();
    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let hundredths = field(4)?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds + hundredths / 100.0)
}

/// Map one stderr chunk to a [`TranscodeEvent`], if it reports progress.
pub fn parse_event(chunk: &str) -> Option<TranscodeEvent> {
    parse_time(chunk).map(|elapsed_secs| TranscodeEvent { elapsed_secs })
}
