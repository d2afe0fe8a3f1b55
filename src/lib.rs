//! Avitag - bird species attribution CLI tool.
//!
//! This crate attributes bird species to images by orchestrating a
//! SpeciesNet-style primary classifier, confidence and geofence filters,
//! a bounded retry loop, and a vision-model fallback, persisting
//! deduplicated results to a PostgREST store.

#![warn(missing_docs)]

pub mod classify;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod pipeline;
pub mod progress;
pub mod store;

use clap::Parser;
use classify::{FallbackClassifier, SpeciesNetClassifier, VisionFallback};
use cli::{Cli, Command, ConfigAction, RunArgs};
use config::{Config, config_file_path, load_default_config, save_default_config, validate_config};
use constants::RETRY_PAUSE;
use fetch::HttpFetcher;
use filter::{ConfidenceGate, GeoFilter};
use pipeline::{AttributionPipeline, BatchRunner, BatchSummary, FallbackThrottle, FilterSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use store::RestStore;
use tracing::{info, warn};

pub use error::{Error, Result};

/// Main entry point for the avitag CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.run.verbose, cli.run.quiet);

    if let Some(command) = cli.command {
        return match command {
            Command::Config { action } => handle_config_command(action),
        };
    }

    let mut config = load_default_config()?;
    apply_overrides(&mut config, &cli.run);
    validate_config(&config)?;

    // Graceful stop: finish the in-flight image, then end the batch.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to install Ctrl+C handler: {e}");
        }
    }

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })?;

    let summary = runtime.block_on(run_attribution(&config, &cli.run, shutdown))?;

    let rendered = serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal {
        message: format!("Failed to render summary: {e}"),
    })?;
    println!("{rendered}");

    Ok(())
}

/// Merge CLI/env overrides into the loaded configuration.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(batch_size) = args.batch_size {
        config.defaults.batch_size = batch_size;
    }
    if let Some(threshold) = args.threshold {
        config.defaults.threshold = threshold;
    }
    if let Some(token) = &args.generic_token {
        config.defaults.generic_token = token.clone();
    }
    if let Some(url) = &args.store_url {
        config.store.url = Some(url.clone());
    }
    if let Some(key) = &args.store_key {
        config.store.key = Some(key.clone());
    }
    if let Some(key) = &args.openai_api_key {
        config.fallback.api_key = Some(key.clone());
    }
    if let Some(country) = &args.country {
        config.region.country = country.clone();
    }
    if let Some(admin1) = &args.admin1_region {
        config.region.admin1_region = admin1.clone();
    }
    if let Some(slist) = &args.slist {
        config.region.species_list = Some(slist.clone());
    }
}

/// Wire up collaborators and run one batch or the continuous loop.
async fn run_attribution(
    config: &Config,
    args: &RunArgs,
    shutdown: Arc<AtomicBool>,
) -> Result<BatchSummary> {
    let geo = match &config.region.species_list {
        Some(path) => {
            info!("Loading species list: {}", path.display());
            GeoFilter::from_list_file(path)?
        }
        None => GeoFilter::unrestricted(),
    };
    if let Some(count) = geo.len() {
        info!("Geofence filter enabled: {count} species loaded");
    }

    let filters = FilterSet::new(
        geo,
        ConfidenceGate::new(config.defaults.threshold),
        config.defaults.generic_token.clone(),
    );

    let primary = SpeciesNetClassifier::new(config.classifier.clone());

    let fallback: Option<Box<dyn FallbackClassifier>> = if args.no_fallback {
        None
    } else {
        VisionFallback::from_config(&config.fallback)
            .map(|client| Box::new(client) as Box<dyn FallbackClassifier>)
    };
    if fallback.is_none() {
        info!("Fallback classifier not configured, generic images will get no attributions");
    }

    let throttle = FallbackThrottle::new(Duration::from_millis(config.fallback.min_interval_ms));
    let pipeline = AttributionPipeline::new(
        Box::new(primary),
        fallback,
        filters,
        config.region.clone(),
        throttle,
        RETRY_PAUSE,
    );

    let store = RestStore::from_config(&config.store)?;
    let fetcher = HttpFetcher::new()?;

    let progress_enabled = !args.quiet && !args.no_progress;
    let mut runner = BatchRunner::new(
        Box::new(store),
        Box::new(fetcher),
        pipeline,
        config.classifier.model_version.clone(),
        config.defaults.batch_size,
        shutdown,
        progress_enabled,
    );

    if args.continuous {
        runner.run_continuous().await
    } else {
        runner.run_batch().await
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).init();
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let config = Config::default();
                let saved_path = save_default_config(&config)?;
                println!("Created configuration file: {}", saved_path.display());
                println!("\nNext steps:");
                println!("  set [store] url/key (or AVITAG_STORE_URL / AVITAG_STORE_KEY)");
                println!("  set [region] country and admin1_region");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config()?;
            println!("{config:#?}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
