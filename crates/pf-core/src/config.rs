//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! tool overrides and conversion defaults. Every section defaults sensibly
//! so a completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::file::MAX_FILE_SIZE;
use crate::settings::{ConversionSettings, OutputFormat, QualityTier, ResizeTier};
use crate::Error;

/// Locations searched, in order, when no config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./pixforged.toml",
    "~/.config/pixforged/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from `path`, or from the first existing entry of
    /// [`DEFAULT_CONFIG_PATHS`] when `path` is `None`, falling back to
    /// defaults when nothing usable is found.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };
        let Some(path) = candidate else {
            tracing::debug!("No config file found; using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::from_toml(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.pngquant_path", &self.tools.pngquant_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} '{}' does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.tools.timeout_secs == 0 {
            warnings.push("tools.timeout_secs is 0; every conversion will time out".into());
        }

        if self.conversion.suffix.is_empty() && self.conversion.output_dir.is_none() {
            warnings.push(
                "conversion.suffix is empty and no output_dir is set; outputs may overwrite inputs"
                    .into(),
            );
        }

        if let Some(dir) = &self.conversion.output_dir {
            if dir.exists() && !dir.is_dir() {
                warnings.push(format!(
                    "conversion.output_dir '{}' is not a directory",
                    dir.display()
                ));
            }
        }

        if self.conversion.max_file_size == 0 {
            warnings.push("conversion.max_file_size is 0; every file will be rejected".into());
        }

        warnings
    }
}

/// First existing entry of [`DEFAULT_CONFIG_PATHS`], tilde-expanded.
pub fn default_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
        .find(|p| p.exists())
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Overrides for external tool locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub pngquant_path: Option<PathBuf>,
    /// Per-invocation limit before a tool is killed.
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            pngquant_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Defaults applied to conversions started from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub quality: QualityTier,
    pub resize: ResizeTier,
    pub format: OutputFormat,
    /// Directory for outputs; next to each input when unset.
    pub output_dir: Option<PathBuf>,
    /// Appended to the input stem to name the output.
    pub suffix: String,
    /// Route PNG output through the scratch + pngquant path.
    pub png_optimizer: bool,
    pub max_file_size: u64,
}

fn default_suffix() -> String {
    "_optimized".to_string()
}

impl Default for ConversionConfig {
    fn default() -> Self {
        let settings = ConversionSettings::default();
        Self {
            quality: settings.quality,
            resize: settings.resize,
            format: settings.format,
            output_dir: None,
            suffix: default_suffix(),
            png_optimizer: true,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl ConversionConfig {
    /// The configured defaults as a settings value.
    pub fn settings(&self) -> ConversionSettings {
        ConversionSettings {
            quality: self.quality,
            resize: self.resize,
            format: self.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.conversion.suffix, "_optimized");
        assert_eq!(cfg.conversion.max_file_size, 100 * 1024 * 1024);
        assert!(cfg.conversion.png_optimizer);
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.conversion.settings(), ConversionSettings::default());
        assert_eq!(cfg.tools.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn parse_toml_config() {
        let cfg = Config::from_toml(
            r#"
            [tools]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            timeout_secs = 30

            [conversion]
            quality = "maximum_compression"
            resize = "1/4"
            format = "webp"
            output_dir = "/tmp/out"
            png_optimizer = false
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.tools.ffmpeg_path.as_deref(),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(cfg.tools.timeout_secs, 30);
        assert_eq!(cfg.conversion.quality, QualityTier::MaximumCompression);
        assert_eq!(cfg.conversion.resize, ResizeTier::Quarter);
        assert_eq!(cfg.conversion.format, OutputFormat::Webp);
        assert!(!cfg.conversion.png_optimizer);
        assert_eq!(cfg.conversion.suffix, "_optimized");
    }

    #[test]
    fn parse_invalid_toml_is_config_error() {
        let err = Config::from_toml("[conversion]\nquality = \"ultra\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn load_explicit_missing_file_errors() {
        assert!(Config::load(Path::new("/nonexistent/pixforged.toml")).is_err());
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/pixforged.toml")));
        assert_eq!(cfg.conversion.suffix, "_optimized");
    }

    #[test]
    fn load_or_default_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixforged.toml");
        std::fs::write(&path, "[conversion]\nsuffix = \"_small\"\n").unwrap();

        let cfg = Config::load_or_default(Some(&path));
        assert_eq!(cfg.conversion.suffix, "_small");
    }

    #[test]
    fn missing_tool_override_warns() {
        let mut cfg = Config::default();
        cfg.tools.pngquant_path = Some(PathBuf::from("/nonexistent/pngquant"));
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("tools.pngquant_path"));
    }

    #[test]
    fn empty_suffix_without_output_dir_warns() {
        let mut cfg = Config::default();
        cfg.conversion.suffix.clear();
        assert!(cfg.validate().iter().any(|w| w.contains("overwrite")));
    }

    #[test]
    fn zero_limits_warn() {
        let mut cfg = Config::default();
        cfg.tools.timeout_secs = 0;
        cfg.conversion.max_file_size = 0;
        assert_eq!(cfg.validate().len(), 2);
    }
}
