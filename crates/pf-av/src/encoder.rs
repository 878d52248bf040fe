//! Settings resolution: quality tier and output format to encoder parameters.
//!
//! [`resolve`] is pure and total. Every combination of tier and format maps
//! to exactly one [`EncoderParams`] variant, and the variant alone decides
//! the codec arguments handed to ffmpeg.

use pf_core::{ConversionSettings, OutputFormat, QualityTier};

/// Concrete encoder parameters for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderParams {
    /// mjpeg with a `-q:v` scale of 1 (best) to 31 (worst).
    Jpeg { qscale: u8 },
    /// Lossless PNG; `compression_level` is 0..=9.
    Png { compression_level: u8, force_rgb24: bool },
    /// libwebp with quality 0..=100.
    Webp { quality: u8, lossless: bool },
    /// libaom-av1 with CRF 0..=63.
    Avif { crf: u8 },
    /// libx265 with CRF 0..=51.
    Heic { crf: u8 },
    /// GIF has no quality knob.
    Gif,
    /// Inputs the table does not cover: ffmpeg picks the codec from the
    /// extension and gets the JPEG scale as a hint.
    Generic { qscale: u8 },
}

impl EncoderParams {
    /// The codec and quality arguments, in the order ffmpeg expects them.
    pub fn codec_args(&self) -> Vec<String> {
        match *self {
            Self::Jpeg { qscale } => vec![
                "-codec:v".into(),
                "mjpeg".into(),
                "-q:v".into(),
                qscale.to_string(),
                "-huffman".into(),
                "optimal".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ],
            Self::Png {
                compression_level,
                force_rgb24,
            } => {
                let mut a = vec![
                    "-codec:v".into(),
                    "png".into(),
                    "-compression_level".into(),
                    compression_level.to_string(),
                    "-pred".into(),
                    "mixed".into(),
                ];
                if force_rgb24 {
                    a.extend(["-pix_fmt".into(), "rgb24".into()]);
                }
                a
            }
            Self::Webp { quality, lossless } => {
                let mut a = vec![
                    "-codec:v".into(),
                    "libwebp".into(),
                    "-q:v".into(),
                    quality.to_string(),
                    "-lossless".into(),
                    if lossless { "1" } else { "0" }.into(),
                ];
                if !lossless {
                    a.extend([
                        "-preset".into(),
                        "photo".into(),
                        "-method".into(),
                        "6".into(),
                        "-pix_fmt".into(),
                        "yuv420p".into(),
                    ]);
                }
                a
            }
            Self::Avif { crf } => vec![
                "-codec:v".into(),
                "libaom-av1".into(),
                "-crf".into(),
                crf.to_string(),
                "-cpu-used".into(),
                "4".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ],
            Self::Heic { crf } => vec![
                "-codec:v".into(),
                "libx265".into(),
                "-crf".into(),
                crf.to_string(),
                "-preset".into(),
                "medium".into(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ],
            Self::Gif => vec!["-codec:v".into(), "gif".into()],
            Self::Generic { qscale } => vec![
                "-q:v".into(),
                qscale.to_string(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ],
        }
    }
}

/// Resolve the encoder parameters for one file.
///
/// The output extension decides the codec. `Gif` is only used when it was
/// asked for explicitly; an `auto` conversion of a GIF (or any extension
/// outside the table) takes the generic path.
pub fn resolve(
    settings: &ConversionSettings,
    output_extension: Option<&str>,
    input_extension: Option<&str>,
) -> EncoderParams {
    let q = settings.quality;
    let target = output_extension
        .or(input_extension)
        .and_then(OutputFormat::from_extension);

    match (target, settings.format) {
        (Some(OutputFormat::Jpeg), _) => EncoderParams::Jpeg {
            qscale: jpeg_qscale(q),
        },
        (Some(OutputFormat::Png), _) => EncoderParams::Png {
            compression_level: png_compression_level(q),
            force_rgb24: png_forces_rgb24(q),
        },
        (Some(OutputFormat::Webp), _) => EncoderParams::Webp {
            quality: webp_quality(q),
            lossless: q == QualityTier::Highest,
        },
        (Some(OutputFormat::Avif), _) => EncoderParams::Avif { crf: avif_crf(q) },
        (Some(OutputFormat::Heic), _) => EncoderParams::Heic { crf: heic_crf(q) },
        (Some(OutputFormat::Gif), OutputFormat::Gif) => EncoderParams::Gif,
        _ => EncoderParams::Generic {
            qscale: jpeg_qscale(q),
        },
    }
}

pub fn jpeg_qscale(q: QualityTier) -> u8 {
    match q {
        QualityTier::Highest => 3,
        QualityTier::High => 8,
        QualityTier::Standard => 12,
        QualityTier::Compressed => 18,
        QualityTier::MaximumCompression => 28,
    }
}

pub fn png_compression_level(q: QualityTier) -> u8 {
    match q {
        QualityTier::Highest => 6,
        QualityTier::High => 7,
        QualityTier::Standard => 8,
        QualityTier::Compressed | QualityTier::MaximumCompression => 9,
    }
}

/// The two most aggressive tiers drop PNG to 8 bits per channel.
pub fn png_forces_rgb24(q: QualityTier) -> bool {
    matches!(q, QualityTier::Compressed | QualityTier::MaximumCompression)
}

pub fn webp_quality(q: QualityTier) -> u8 {
    match q {
        QualityTier::Highest => 95,
        QualityTier::High => 85,
        QualityTier::Standard => 75,
        QualityTier::Compressed => 65,
        QualityTier::MaximumCompression => 50,
    }
}

pub fn avif_crf(q: QualityTier) -> u8 {
    match q {
        QualityTier::Highest => 18,
        QualityTier::High => 25,
        QualityTier::Standard => 32,
        QualityTier::Compressed => 40,
        QualityTier::MaximumCompression => 50,
    }
}

pub fn heic_crf(q: QualityTier) -> u8 {
    match q {
        QualityTier::Highest => 18,
        QualityTier::High => 23,
        QualityTier::Standard => 28,
        QualityTier::Compressed => 35,
        QualityTier::MaximumCompression => 45,
    }
}

/// pngquant `--quality` range as `(min, max)`.
pub fn pngquant_quality(q: QualityTier) -> (u8, u8) {
    match q {
        QualityTier::Highest => (85, 95),
        QualityTier::High => (75, 90),
        QualityTier::Standard => (65, 85),
        QualityTier::Compressed => (50, 75),
        QualityTier::MaximumCompression => (25, 60),
    }
}
