//! Configuration for the `probescan` binary.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks under the `PROBESCAN_` prefix:
//!
//! - `PROBESCAN_TAG_MAP` - JSON document mapping tag-container keys to tag ids
//! - `PROBESCAN_NO_FLIP` - keep tag-container rows in stored order
//! - `PROBESCAN_FORMAT` - output format for `inspect` (`text` or `json`)
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use probescan::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Command::Inspect(config) => println!("decoding {}", config.path.display()),
//!     Command::Channels(config) => println!("listing {}", config.path.display()),
//! }
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::DecodeError;
use crate::loader::LoadOptions;

// =============================================================================
// CLI Arguments
// =============================================================================

/// probescan - decode scanning-probe microscope files.
///
/// Reads Gwyddion (.gwy), JPK (.jpk, .jpk-qi-image) and ASD (.asd) files and
/// reports calibrated image data.
#[derive(Parser, Debug, Clone)]
#[command(name = "probescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode one channel and print its shape, calibration and metadata.
    Inspect(InspectConfig),

    /// List the channels stored in a file.
    Channels(ChannelsConfig),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Inspect(config) => config.decode.verbose,
            Command::Channels(config) => config.decode.verbose,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Command::Inspect(config) => config.validate(),
            Command::Channels(config) => config.decode.validate(),
        }
    }
}

/// Output format for `inspect`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// One JSON document
    Json,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Instrument file to read.
    pub path: PathBuf,

    /// JSON tag-id mapping for tag-container files.
    ///
    /// Keys may be top-level or under a `jpk` section. YAML configuration
    /// files must be converted to JSON. If not specified, the bundled
    /// mapping is used.
    #[arg(long, env = "PROBESCAN_TAG_MAP")]
    pub tag_map: Option<PathBuf>,

    /// Keep tag-container rows in stored (bottom-up) order.
    #[arg(long, default_value_t = false, env = "PROBESCAN_NO_FLIP")]
    pub no_flip: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl DecodeArgs {
    /// Validate the arguments and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("An input path is required".to_string());
        }

        if let Some(ref tag_map) = self.tag_map {
            if !tag_map.is_file() {
                return Err(format!(
                    "Tag map {} does not exist. Check --tag-map or PROBESCAN_TAG_MAP",
                    tag_map.display()
                ));
            }
        }

        Ok(())
    }

    /// Build decode options from the arguments.
    pub fn load_options(&self) -> Result<LoadOptions, DecodeError> {
        let options = LoadOptions::builtin()?.with_flip(!self.no_flip);
        match self.tag_map.as_deref() {
            Some(path) => options.with_tag_map_path(path),
            None => Ok(options),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Arguments of `probescan inspect`.
#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    #[command(flatten)]
    pub decode: DecodeArgs,

    /// Channel to decode (e.g. `Height`, `height_trace`, `TP`).
    #[arg(short, long)]
    pub channel: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "PROBESCAN_FORMAT")]
    pub format: OutputFormat,

    /// Omit acquisition metadata from the output.
    #[arg(long, default_value_t = false)]
    pub no_metadata: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.decode.validate()?;

        if self.channel.trim().is_empty() {
            return Err("Channel name must not be empty".to_string());
        }

        Ok(())
    }
}

/// Arguments of `probescan channels`.
#[derive(Args, Debug, Clone)]
pub struct ChannelsConfig {
    #[command(flatten)]
    pub decode: DecodeArgs,
}

// =============================================================================
// Tests
// =============================================================================
