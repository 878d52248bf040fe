//! Conversion settings: quality tiers, resize tiers, and output formats.
//!
//! All enums serialize in the lowercase form users type on the command line
//! and in config files, and implement `Display` and `FromStr` with the same
//! spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// QualityTier
// ---------------------------------------------------------------------------

/// One of five quality presets, from least to most aggressive compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Highest,
    High,
    Standard,
    Compressed,
    MaximumCompression,
}

impl QualityTier {
    /// Every tier, highest fidelity first.
    pub const ALL: [QualityTier; 5] = [
        Self::Highest,
        Self::High,
        Self::Standard,
        Self::Compressed,
        Self::MaximumCompression,
    ];
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highest => write!(f, "highest"),
            Self::High => write!(f, "high"),
            Self::Standard => write!(f, "standard"),
            Self::Compressed => write!(f, "compressed"),
            Self::MaximumCompression => write!(f, "maximum_compression"),
        }
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "highest" => Ok(Self::Highest),
            "high" => Ok(Self::High),
            "standard" => Ok(Self::Standard),
            "compressed" => Ok(Self::Compressed),
            "maximum_compression" | "max" => Ok(Self::MaximumCompression),
            other => Err(format!(
                "unknown quality '{other}' (expected highest, high, standard, compressed, maximum_compression)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ResizeTier
// ---------------------------------------------------------------------------

/// Uniform downscale applied to both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeTier {
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1/3")]
    Third,
    #[serde(rename = "1/4")]
    Quarter,
    #[serde(rename = "1/8")]
    Eighth,
}

impl ResizeTier {
    /// Every tier, largest output first.
    pub const ALL: [ResizeTier; 5] = [
        Self::Original,
        Self::Half,
        Self::Third,
        Self::Quarter,
        Self::Eighth,
    ];

    /// Integer divisor for each axis, or `None` for [`ResizeTier::Original`].
    pub fn divisor(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Half => Some(2),
            Self::Third => Some(3),
            Self::Quarter => Some(4),
            Self::Eighth => Some(8),
        }
    }

    /// Scale factor applied to width and height.
    pub fn factor(self) -> f64 {
        self.divisor().map_or(1.0, |d| 1.0 / f64::from(d))
    }
}

impl fmt::Display for ResizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.divisor() {
            None => write!(f, "original"),
            Some(d) => write!(f, "1/{d}"),
        }
    }
}

impl FromStr for ResizeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" | "1" | "1/1" => Ok(Self::Original),
            "1/2" | "half" => Ok(Self::Half),
            "1/3" | "third" => Ok(Self::Third),
            "1/4" | "quarter" => Ok(Self::Quarter),
            "1/8" | "eighth" => Ok(Self::Eighth),
            other => Err(format!(
                "unknown resize '{other}' (expected original, 1/2, 1/3, 1/4, 1/8)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Requested output format. `Auto` keeps the input's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Auto,
    Jpeg,
    Png,
    Webp,
    Avif,
    Gif,
    Heic,
}

impl OutputFormat {
    /// Every format, `Auto` first.
    pub const ALL: [OutputFormat; 7] = [
        Self::Auto,
        Self::Jpeg,
        Self::Png,
        Self::Webp,
        Self::Avif,
        Self::Gif,
        Self::Heic,
    ];

    /// Canonical file extension, or `None` for `Auto`.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            Self::Jpeg => Some("jpg"),
            Self::Png => Some("png"),
            Self::Webp => Some("webp"),
            Self::Avif => Some("avif"),
            Self::Gif => Some("gif"),
            Self::Heic => Some("heic"),
        }
    }

    /// Map a file extension (case-insensitive, without the dot) to a concrete
    /// format. Never returns `Auto`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "gif" => Some(Self::Gif),
            "heic" | "heif" => Some(Self::Heic),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
            Self::Webp => write!(f, "webp"),
            Self::Avif => write!(f, "avif"),
            Self::Gif => write!(f, "gif"),
            Self::Heic => write!(f, "heic"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        Self::from_extension(s).ok_or_else(|| {
            format!("unknown format '{s}' (expected auto, jpeg, png, webp, avif, gif, heic)")
        })
    }
}

// ---------------------------------------------------------------------------
// ConversionSettings
// ---------------------------------------------------------------------------

/// The settings shared by every file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub quality: QualityTier,
    pub resize: ResizeTier,
    pub format: OutputFormat,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            quality: QualityTier::Standard,
            resize: ResizeTier::Original,
            format: OutputFormat::Auto,
        }
    }
}

impl fmt::Display for ConversionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quality={} resize={} format={}",
            self.quality, self.resize, self.format
        )
    }
}
