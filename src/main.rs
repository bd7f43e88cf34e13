//! probescan - decode scanning-probe microscope files from the command line.

use clap::Parser;
use serde_json::json;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use probescan::{
    config::{ChannelsConfig, Cli, Command, InspectConfig, OutputFormat},
    Decoded, DecoderRegistry, ImageData,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.command.verbose());

    // Validate configuration
    if let Err(e) = cli.command.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Inspect(config) => run_inspect(config),
        Command::Channels(config) => run_channels(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "probescan=debug"
    } else {
        "probescan=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    let options = match config.decode.load_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = DecoderRegistry::with_builtin();
    let decoded = match registry.load(config.decode.path(), &config.channel, &options) {
        Ok(decoded) => decoded,
        Err(e) => {
            error!("Failed to decode {}: {}", config.decode.path().display(), e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        OutputFormat::Text => print_summary(&config, &decoded),
        OutputFormat::Json => {
            let summary = json_summary(&config, &decoded);
            match serde_json::to_string_pretty(&summary) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    error!("Failed to serialize output: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

/// Smallest and largest value over every image.
fn value_range(data: &ImageData) -> Option<(f64, f64)> {
    data.images()
        .filter_map(|image| image.min_max())
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
}

fn print_summary(config: &InspectConfig, decoded: &Decoded) {
    let (rows, cols) = decoded.data.shape().unwrap_or((0, 0));

    println!("File:        {}", config.decode.path().display());
    println!("Channel:     {}", config.channel);
    match &decoded.data {
        ImageData::Single(_) => println!("Image:       {} x {} (rows x cols)", rows, cols),
        ImageData::Movie(frames) => println!(
            "Movie:       {} frame(s) of {} x {} (rows x cols)",
            frames.len(),
            rows,
            cols
        ),
    }
    println!(
        "Calibration: {} nm/pixel",
        decoded.calibration.nm_per_pixel()
    );
    if let Some((lo, hi)) = value_range(&decoded.data) {
        println!("Range:       {} .. {}", lo, hi);
    }

    if !config.no_metadata && !decoded.metadata.is_empty() {
        println!();
        println!("Metadata:");
        for (key, value) in &decoded.metadata {
            println!("  {}: {}", key, value);
        }
    }
}

fn json_summary(config: &InspectConfig, decoded: &Decoded) -> serde_json::Value {
    let (rows, cols) = decoded.data.shape().unwrap_or((0, 0));
    let range = value_range(&decoded.data);

    let mut summary = json!({
        "path": config.decode.path().display().to_string(),
        "channel": config.channel,
        "kind": match decoded.data {
            ImageData::Single(_) => "image",
            ImageData::Movie(_) => "movie",
        },
        "frames": decoded.data.frame_count(),
        "rows": rows,
        "cols": cols,
        "nm_per_pixel": decoded.calibration.nm_per_pixel(),
        "min": range.map(|(lo, _)| lo),
        "max": range.map(|(_, hi)| hi),
    });

    if !config.no_metadata {
        summary["metadata"] = json!(decoded.metadata);
    }

    summary
}

// =============================================================================
// Channels Command
// =============================================================================

fn run_channels(config: ChannelsConfig) -> ExitCode {
    let options = match config.decode.load_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = DecoderRegistry::with_builtin();
    match registry.list_channels(config.decode.path(), &options) {
        Ok(channels) => {
            debug!(count = channels.len(), "listed channels");
            for channel in channels {
                println!("{}", channel);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                "Failed to read channels of {}: {}",
                config.decode.path().display(),
                e
            );
            ExitCode::FAILURE
        }
    }
}
