//! Configuration validation.

use crate::config::Config;
use crate::constants::confidence;
use crate::error::{Error, Result};

/// Validate the entire configuration before a batch run.
///
/// The pipeline must not run partially configured: a missing store URL or
/// key is fatal here, not at the first store call.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_store(config)?;
    validate_defaults(config)?;
    validate_classifier(config)?;
    validate_region(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<()> {
    let store = &config.store;

    if store.url.as_deref().is_none_or(str::is_empty) {
        return Err(Error::ConfigValidation {
            message: "store.url is required (set [store] url or AVITAG_STORE_URL)".to_string(),
        });
    }

    if store.key.as_deref().is_none_or(str::is_empty) {
        return Err(Error::ConfigValidation {
            message: "store.key is required (set [store] key or AVITAG_STORE_KEY)".to_string(),
        });
    }

    if store.images_table.is_empty() || store.attributions_table.is_empty() {
        return Err(Error::ConfigValidation {
            message: "store table names must not be empty".to_string(),
        });
    }

    Ok(())
}

fn validate_defaults(config: &Config) -> Result<()> {
    let defaults = &config.defaults;

    if !(confidence::MIN..=confidence::MAX).contains(&defaults.threshold) {
        return Err(Error::ConfigValidation {
            message: format!(
                "threshold must be between {} and {}, got {}",
                confidence::MIN,
                confidence::MAX,
                defaults.threshold
            ),
        });
    }

    if defaults.batch_size == 0 {
        return Err(Error::ConfigValidation {
            message: "batch_size must be at least 1".to_string(),
        });
    }

    if defaults.generic_token.trim().is_empty() {
        return Err(Error::ConfigValidation {
            message: "generic_token must not be empty".to_string(),
        });
    }

    Ok(())
}

fn validate_classifier(config: &Config) -> Result<()> {
    if config.classifier.command.is_empty() {
        return Err(Error::ConfigValidation {
            message: "classifier.command must not be empty".to_string(),
        });
    }

    if config.classifier.model_version.is_empty() {
        return Err(Error::ConfigValidation {
            message: "classifier.model_version must not be empty".to_string(),
        });
    }

    Ok(())
}

fn validate_region(config: &Config) -> Result<()> {
    let region = &config.region;

    if region.country.is_empty() {
        return Err(Error::ConfigValidation {
            message: "region.country must not be empty".to_string(),
        });
    }

    if let Some(path) = &region.species_list
        && !path.exists()
    {
        return Err(Error::ConfigValidation {
            message: format!("species list file does not exist: {}", path.display()),
        });
    }

    Ok(())
}
