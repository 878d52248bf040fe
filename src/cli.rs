use clap::{Args, Parser, Subcommand};
use pf_core::{OutputFormat, QualityTier, ResizeTier};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pixforged")]
#[command(author, version, about = "Batch image optimizer built on ffmpeg and pngquant")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the configured conversion defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct TierArgs {
    /// Quality tier: highest, high, standard, compressed, maximum-compression
    #[arg(short, long)]
    pub quality: Option<QualityTier>,

    /// Resize tier: original, 1/2, 1/3, 1/4, 1/8
    #[arg(short, long)]
    pub resize: Option<ResizeTier>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert one or more images as a batch
    Convert {
        /// Images to convert, processed in the order given
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        tiers: TierArgs,

        /// Output format: auto, jpeg, png, webp, avif, gif, heic
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Directory for converted files (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip the two-stage PNG optimizer
        #[arg(long)]
        no_png_optimizer: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate output sizes without converting
    Estimate {
        /// Images to estimate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        tiers: TierArgs,

        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
