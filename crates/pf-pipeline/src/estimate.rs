//! Rough output-size estimates shown before a conversion starts.
//!
//! The figures are heuristics, not predictions of what the encoder will
//! actually produce.

use serde::Serialize;

use pf_core::{ConversionSettings, FileDescriptor, QualityTier, ResizeTier};

/// Never promise more than this share of savings.
const MAX_REDUCTION: f64 = 0.95;

/// Expected share of bytes saved by the quality tier alone.
pub fn quality_reduction(q: QualityTier) -> f64 {
    match q {
        QualityTier::Highest => 0.1,
        QualityTier::High => 0.25,
        QualityTier::Standard => 0.4,
        QualityTier::Compressed => 0.55,
        QualityTier::MaximumCompression => 0.7,
    }
}

/// Share of pixels removed by the resize tier.
pub fn resize_reduction(r: ResizeTier) -> f64 {
    let f = r.factor();
    1.0 - f * f
}

/// Combined reduction, capped at 95%.
pub fn estimated_reduction(settings: &ConversionSettings) -> f64 {
    (quality_reduction(settings.quality) + resize_reduction(settings.resize)).min(MAX_REDUCTION)
}

/// Estimated output size in bytes for an input of `original` bytes.
pub fn estimate_size(original: u64, settings: &ConversionSettings) -> u64 {
    (original as f64 * (1.0 - estimated_reduction(settings))).round() as u64
}

/// Totals for a set of files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchEstimate {
    pub original_size: u64,
    pub estimated_size: u64,
    /// `(1 - estimated / original) * 100`.
    pub savings_percent: f64,
}

pub fn estimate_batch(files: &[FileDescriptor], settings: &ConversionSettings) -> BatchEstimate {
    let original_size = files.iter().map(|f| f.size).sum();
    let estimated_size = files.iter().map(|f| estimate_size(f.size, settings)).sum();
    BatchEstimate {
        original_size,
        estimated_size,
        savings_percent: pf_core::compression_ratio(original_size, estimated_size),
    }
}
