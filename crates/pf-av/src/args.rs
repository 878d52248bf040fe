//! ffmpeg argument synthesis.
//!
//! [`FfmpegArgs`] collects the pieces of one invocation and renders them in
//! a fixed order: input, overwrite, stream map, metadata strip, codec
//! arguments, a single `-vf` with every filter joined by `,`, then the
//! output path. Filters are accumulated rather than appended as flags, so a
//! rendered argument list can never carry two filter options.

use std::path::{Path, PathBuf};

use pf_core::{ConversionSettings, ResizeTier};

use crate::encoder::{self, EncoderParams};

/// Builder for one ffmpeg argument list.
#[derive(Debug, Clone)]
pub struct FfmpegArgs {
    input: PathBuf,
    output: PathBuf,
    codec: Vec<String>,
    filters: Vec<String>,
}

impl FfmpegArgs {
    pub fn new(input: &Path, output: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            codec: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// Use the codec arguments of `params`.
    pub fn codec(mut self, params: &EncoderParams) -> Self {
        self.codec = params.codec_args();
        self
    }

    /// Add a filter to the filter chain.
    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filters.push(expr.into());
        self
    }

    /// Add the scale filter for `resize`, if it shrinks the image.
    pub fn resize(self, resize: ResizeTier) -> Self {
        match scale_filter(resize) {
            Some(expr) => self.filter(expr),
            None => self,
        }
    }

    /// Render the final argument list.
    pub fn build(self) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.input.to_string_lossy().to_string(),
            "-y".to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
        ];
        args.extend(self.codec);
        if !self.filters.is_empty() {
            args.push("-vf".to_string());
            args.push(self.filters.join(","));
        }
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// `scale=iw/N:ih/N` for a downscale, nothing for the original size.
pub fn scale_filter(resize: ResizeTier) -> Option<String> {
    resize.divisor().map(|d| format!("scale=iw/{d}:ih/{d}"))
}

/// Arguments for converting `input` to `output` with `settings`.
pub fn build(input: &Path, output: &Path, settings: &ConversionSettings) -> Vec<String> {
    let params = encoder::resolve(
        settings,
        pf_core::file::extension_of(output).as_deref(),
        pf_core::file::extension_of(input).as_deref(),
    );
    FfmpegArgs::new(input, output)
        .codec(&params)
        .resize(settings.resize)
        .build()
}

/// Arguments for the first stage of the PNG path: maximum lossless
/// compression into a scratch file that the quantizer reads next.
pub fn build_png_scratch(input: &Path, scratch: &Path, settings: &ConversionSettings) -> Vec<String> {
    let params = EncoderParams::Png {
        compression_level: 9,
        force_rgb24: encoder::png_forces_rgb24(settings.quality),
    };
    FfmpegArgs::new(input, scratch)
        .codec(&params)
        .resize(settings.resize)
        .build()
}
