//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

use std::time::Duration;

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "avitag";

/// Model version stamped on every persisted attribution record.
///
/// Fallback predictions are stamped with the same version so the store's
/// `(image_id, species, model_version)` upsert key dedupes across sources.
pub const MODEL_VERSION: &str = "speciesnet-ensemble";

/// Default number of images fetched per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default minimum confidence threshold for attributions.
pub const DEFAULT_THRESHOLD: f32 = 0.30;

/// Maximum number of primary classifier retries per image.
///
/// The classifier is invoked at most `1 + MAX_RETRIES` times before the
/// pipeline escalates to the fallback classifier.
pub const MAX_RETRIES: u32 = 5;

/// Labels that can never become attributions, matched case-insensitively.
pub const BLOCKLIST: &[&str] = &["blank", "unknown", "vehicle", "human", "person", ""];

/// Default generic class token.
///
/// A prediction carrying only this label means the classifier saw a bird
/// but could not name a species.
pub const DEFAULT_GENERIC_TOKEN: &str = "Bird";

/// Maximum number of alternate classifications taken per prediction entry.
pub const ALTERNATES_TOP_K: usize = 5;

/// Maximum number of candidate species requested from the fallback classifier.
pub const FALLBACK_MAX_CANDIDATES: usize = 3;

/// Default chat model for the fallback classifier.
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o";

/// Minimum interval between fallback classifier invocations.
pub const FALLBACK_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Pause between primary classifier retries for the same image.
pub const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Pause between batches in continuous mode.
pub const BATCH_PAUSE: Duration = Duration::from_secs(2);

/// Cooloff between consecutive image downloads.
pub const DOWNLOAD_COOLOFF: Duration = Duration::from_millis(100);

/// Timeout for a single image download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for a fallback classifier request.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for a persistence store request.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Confidence bounds.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f32 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f32 = 1.0;
}
