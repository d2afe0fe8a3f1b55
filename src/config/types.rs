//! Configuration type definitions.

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_FALLBACK_MODEL, DEFAULT_GENERIC_TOKEN, DEFAULT_THRESHOLD,
    FALLBACK_MIN_INTERVAL, MODEL_VERSION,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistence store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Primary classifier settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Fallback classifier settings.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Geofence region settings.
    #[serde(default)]
    pub region: RegionConfig,

    /// Default pipeline settings.
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Persistence store (PostgREST) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the store (e.g. `https://project.supabase.co`).
    pub url: Option<String>,

    /// API key. Usually supplied via the `AVITAG_STORE_KEY` environment
    /// variable rather than the config file.
    pub key: Option<String>,

    /// Table holding candidate images.
    pub images_table: String,

    /// Table holding attribution records.
    pub attributions_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            images_table: "images".to_string(),
            attributions_table: "attributions".to_string(),
        }
    }
}

/// Primary classifier (SpeciesNet runner) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Executable used to launch the classifier.
    pub command: String,

    /// Leading arguments passed before the folder/output flags.
    pub args: Vec<String>,

    /// Model version stamped on persisted attribution records.
    pub model_version: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: "python".to_string(),
            args: vec!["-m".to_string(), "speciesnet.scripts.run_model".to_string()],
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

/// Fallback classifier (vision model) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// API key. Usually supplied via the `OPENAI_API_KEY` environment
    /// variable. The fallback path is disabled when no key is configured.
    pub api_key: Option<String>,

    /// Chat model to use.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// Minimum interval between fallback invocations, in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_FALLBACK_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            min_interval_ms: u64::try_from(FALLBACK_MIN_INTERVAL.as_millis()).unwrap_or(1000),
        }
    }
}

/// Geofence region settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// ISO country code passed to the classifier (e.g. "USA").
    pub country: String,

    /// First-level administrative region code (e.g. "NY").
    pub admin1_region: String,

    /// Human-readable region description used in fallback prompts
    /// (e.g. "Long Island, New York"). Defaults to "admin1, country".
    pub description: Option<String>,

    /// Optional species reference list file, one name per line.
    /// When set, species absent from the list are rejected.
    pub species_list: Option<PathBuf>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            country: "USA".to_string(),
            admin1_region: "NY".to_string(),
            description: None,
            species_list: None,
        }
    }
}

impl RegionConfig {
    /// Region description for fallback prompts.
    pub fn display_name(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{}, {}", self.admin1_region, self.country))
    }
}

/// Default pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Number of images fetched per batch.
    pub batch_size: usize,

    /// Minimum confidence threshold.
    pub threshold: f32,

    /// Generic class token the classifier emits when it cannot name
    /// a species.
    pub generic_token: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            threshold: DEFAULT_THRESHOLD,
            generic_token: DEFAULT_GENERIC_TOKEN.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_config_default_values() {
        let defaults = DefaultsConfig::default();
        assert_eq!(defaults.batch_size, 50);
        assert_eq!(defaults.threshold, 0.30);
        assert_eq!(defaults.generic_token, "Bird");
    }

    #[test]
    fn test_region_display_name() {
        let region = RegionConfig::default();
        assert_eq!(region.display_name(), "NY, USA");

        let region = RegionConfig {
            description: Some("Long Island, New York".to_string()),
            ..RegionConfig::default()
        };
        assert_eq!(region.display_name(), "Long Island, New York");
    }

    #[test]
    fn test_store_config_default_tables() {
        let store = StoreConfig::default();
        assert_eq!(store.images_table, "images");
        assert_eq!(store.attributions_table, "attributions");
        assert!(store.url.is_none());
    }
}
