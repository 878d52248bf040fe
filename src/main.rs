mod cli;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, TierArgs};
use serde::Serialize;

use pf_av::{ToolRegistry, FFMPEG};
use pf_core::config::{default_config_path, Config};
use pf_core::{
    BatchProgress, ConversionResult, ConversionSettings, FileDescriptor, FileStatus, OutputFormat,
    Stage,
};
use pf_pipeline::{estimate_batch, estimate_size, BatchProgressSender, Destination, Pipeline};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick levels from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "pixforged=debug,pf_pipeline=debug,pf_av=debug,pf_core=debug".to_string()
        } else {
            "pixforged=info,pf_pipeline=warn,pf_av=warn,pf_core=warn".to_string()
        }
    });

    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            files,
            tiers,
            format,
            output_dir,
            no_png_optimizer,
            json,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(dir) = output_dir {
                config.conversion.output_dir = Some(dir);
            }
            if no_png_optimizer {
                config.conversion.png_optimizer = false;
            }
            let settings = resolve_settings(&config, &tiers, format);

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_files(&files, &config, settings, json))
        }
        Commands::Estimate { files, tiers, json } => {
            let config = load_config(cli.config.as_deref())?;
            let settings = resolve_settings(&config, &tiers, None);
            estimate_files(&files, &config, &settings, json)
        }
        Commands::CheckTools => {
            let config = load_config(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("pixforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// An explicit path must load; otherwise fall back to the default search.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::load(p).with_context(|| format!("Failed to load config {:?}", p))?,
        None => Config::load_or_default(None),
    };
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    Ok(config)
}

fn resolve_settings(
    config: &Config,
    tiers: &TierArgs,
    format: Option<OutputFormat>,
) -> ConversionSettings {
    let defaults = config.conversion.settings();
    ConversionSettings {
        quality: tiers.quality.unwrap_or(defaults.quality),
        resize: tiers.resize.unwrap_or(defaults.resize),
        format: format.unwrap_or(defaults.format),
    }
}

/// Turn paths into descriptors, rejecting anything the pipeline would not
/// accept and dropping repeats of the same name and size.
fn collect_inputs(paths: &[PathBuf], max_file_size: u64) -> Result<Vec<FileDescriptor>> {
    let mut files: Vec<FileDescriptor> = Vec::with_capacity(paths.len());
    let mut seen = HashSet::new();

    for path in paths {
        if !path.exists() {
            anyhow::bail!("Input file does not exist: {:?}", path);
        }
        let file = FileDescriptor::from_path(path)
            .with_context(|| format!("Cannot read input {:?}", path))?;

        if !file.is_supported() {
            anyhow::bail!(
                "Unsupported file type for {:?} ({}); expected one of: {}",
                path,
                file.mime_type,
                pf_core::file::SUPPORTED_EXTENSIONS.join(", ")
            );
        }
        if file.size > max_file_size {
            anyhow::bail!(
                "{:?} is {} bytes, over the {} byte limit",
                path,
                file.size,
                max_file_size
            );
        }

        let (name, size) = file.duplicate_key();
        if !seen.insert((name.to_string(), size)) {
            tracing::warn!("Skipping duplicate file: {}", file.name);
            continue;
        }
        files.push(file);
    }

    Ok(files)
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FileReport<'a> {
    file: &'a str,
    input: &'a Path,
    #[serde(flatten)]
    result: &'a ConversionResult,
}

async fn convert_files(
    paths: &[PathBuf],
    config: &Config,
    settings: ConversionSettings,
    json: bool,
) -> Result<()> {
    let files = collect_inputs(paths, config.conversion.max_file_size)?;

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    tools.require(FFMPEG)?;
    let pipeline = Pipeline::from_config(config, tools);

    warn_on_collisions(&pipeline, &files, &settings);

    tracing::info!("Converting {} file(s) with {}", files.len(), settings);

    let handle = pipeline.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            handle.cancel_all();
        }
    });

    let progress = if json {
        BatchProgressSender::noop()
    } else {
        BatchProgressSender::new(print_file_start)
    };
    let results = pipeline.convert_batch(&files, &settings, &progress).await;
    ctrl_c.abort();

    if json {
        let reports: Vec<FileReport<'_>> = files
            .iter()
            .zip(&results)
            .map(|(file, result)| FileReport {
                file: &file.name,
                input: &file.path,
                result,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_results(&files, &results);
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    if succeeded < files.len() {
        anyhow::bail!("{} of {} file(s) did not convert", files.len() - succeeded, files.len());
    }
    Ok(())
}

/// Warn when two inputs would be written to the same output path.
fn warn_on_collisions(pipeline: &Pipeline, files: &[FileDescriptor], settings: &ConversionSettings) {
    let destination = pipeline.converter().destination();
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
    for file in files {
        let Some(output) = destination.resolve(file, settings) else {
            continue;
        };
        if let Some(previous) = claimed.insert(output.clone(), &file.name) {
            tracing::warn!(
                "{} and {} both write to {}; the later file wins",
                previous,
                file.name,
                output.display()
            );
        }
    }
}

fn print_file_start(snapshot: &BatchProgress) {
    let Some(file) = snapshot.files.get(snapshot.current_file_index) else {
        return;
    };
    if file.status == FileStatus::Processing
        && file.progress.stage == Stage::Preparing
        && file.progress.percent == 0.0
    {
        eprintln!(
            "[{}/{}] {}",
            snapshot.current_file_index + 1,
            snapshot.total_files,
            file.file_name
        );
    }
}

fn print_results(files: &[FileDescriptor], results: &[ConversionResult]) {
    println!();
    for (file, result) in files.iter().zip(results) {
        if result.success {
            print!("✓ {}", file.name);
            if let Some(ref path) = result.output_path {
                print!(" -> {}", path.display());
            }
            if let Some(size) = result.output_size {
                print!(" ({} -> {} bytes", result.original_size, size);
                if let Some(ratio) = result.compression_ratio {
                    print!(", {:.1}% smaller", ratio);
                }
                print!(")");
            }
            println!(" in {:.2}s", result.processing_secs);
        } else if result.cancelled {
            println!("- {}: cancelled", file.name);
        } else {
            println!(
                "✗ {}: {}",
                file.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    for file in files.iter().skip(results.len()) {
        println!("- {}: not started", file.name);
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let cancelled = results.iter().filter(|r| r.cancelled).count();
    let original: u64 = results
        .iter()
        .filter(|r| r.success)
        .map(|r| r.original_size)
        .sum();
    let converted: u64 = results.iter().filter_map(|r| r.output_size).sum();

    println!();
    println!("Converted {} of {} file(s)", succeeded, files.len());
    if cancelled > 0 {
        println!("  Cancelled: {}", cancelled);
    }
    if succeeded > 0 {
        println!(
            "  Total: {} -> {} bytes ({:.1}% smaller)",
            original,
            converted,
            pf_core::compression_ratio(original, converted)
        );
    }
}

// ---------------------------------------------------------------------------
// estimate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct FileEstimate<'a> {
    file: &'a str,
    original_size: u64,
    estimated_size: u64,
}

fn estimate_files(
    paths: &[PathBuf],
    config: &Config,
    settings: &ConversionSettings,
    json: bool,
) -> Result<()> {
    let files = collect_inputs(paths, config.conversion.max_file_size)?;
    let total = estimate_batch(&files, settings);

    if json {
        let per_file: Vec<FileEstimate<'_>> = files
            .iter()
            .map(|f| FileEstimate {
                file: &f.name,
                original_size: f.size,
                estimated_size: estimate_size(f.size, settings),
            })
            .collect();
        let body = serde_json::json!({
            "settings": settings,
            "files": per_file,
            "total": total,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("Estimate for {}\n", settings);
    for file in &files {
        println!(
            "  {}: {} -> ~{} bytes",
            file.name,
            file.size,
            estimate_size(file.size, settings)
        );
    }
    println!();
    println!(
        "Total: {} -> ~{} bytes ({:.1}% smaller)",
        total.original_size, total.estimated_size, total.savings_percent
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// check-tools / validate
// ---------------------------------------------------------------------------

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.tools);
    let tools = registry.check_all();
    let mut ffmpeg_ok = false;

    for tool in &tools {
        let status = if tool.available { "✓" } else { "✗" };
        if tool.available && tool.name == FFMPEG {
            ffmpeg_ok = true;
        }

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if !ffmpeg_ok {
        println!("ffmpeg is missing. Install it to enable conversions.");
    } else if tools.iter().all(|t| t.available) {
        println!("All tools are available!");
    } else {
        println!("pngquant is missing. PNG outputs will be written losslessly.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let (config, source) = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config =
                Config::load(&p).with_context(|| format!("Failed to load config {:?}", p))?;
            (config, Some(p))
        }
        None => {
            println!("No config file specified, using defaults");
            (Config::default(), None)
        }
    };

    let warnings = config.validate();
    if source.is_some() {
        println!("✓ Configuration is valid");
    }
    println!("  Quality: {}", config.conversion.quality);
    println!("  Resize: {}", config.conversion.resize);
    println!("  Format: {}", config.conversion.format);
    match &config.conversion.output_dir {
        Some(dir) => println!("  Output dir: {}", dir.display()),
        None => println!("  Output dir: next to each input"),
    }
    println!("  Suffix: {:?}", config.conversion.suffix);
    println!("  PNG optimizer: {}", config.conversion.png_optimizer);
    println!("  Max file size: {} bytes", config.conversion.max_file_size);
    println!("  Tool timeout: {}s", config.tools.timeout_secs);

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  ⚠ {}", warning);
        }
    }

    Ok(())
}
