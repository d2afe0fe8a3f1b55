//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bird species attribution using SpeciesNet with a vision-model fallback.
#[derive(Debug, Parser)]
#[command(name = "avitag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Options for attribution runs.
    #[command(flatten)]
    pub run: RunArgs,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for attribution runs.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Number of images to fetch per batch.
    #[arg(short, long, env = "AVITAG_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Process all unattributed images in batches until none remain.
    #[arg(long)]
    pub continuous: bool,

    /// Minimum confidence threshold (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_confidence, env = "AVITAG_THRESHOLD")]
    pub threshold: Option<f32>,

    /// Generic class token treated as "a bird, species unknown".
    #[arg(long, env = "AVITAG_GENERIC_TOKEN")]
    pub generic_token: Option<String>,

    /// Persistence store base URL.
    #[arg(long, env = "AVITAG_STORE_URL")]
    pub store_url: Option<String>,

    /// Persistence store API key.
    #[arg(long, env = "AVITAG_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// API key for the vision-model fallback. Fallback is disabled
    /// when unset.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// ISO country code for geofencing.
    #[arg(long, env = "AVITAG_COUNTRY")]
    pub country: Option<String>,

    /// First-level administrative region code for geofencing.
    #[arg(long, env = "AVITAG_ADMIN1_REGION")]
    pub admin1_region: Option<String>,

    /// Path to a species reference list file (one name per line).
    /// Species absent from the list are rejected.
    #[arg(long, env = "AVITAG_SPECIES_LIST")]
    pub slist: Option<PathBuf>,

    /// Disable the fallback classifier even when configured.
    #[arg(long)]
    pub no_fallback: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Parse and validate confidence value.
fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(format!(
            "confidence must be between 0.0 and 1.0, got {value}"
        ));
    }

    Ok(value)
}
