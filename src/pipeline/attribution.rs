//! Per-image attribution state machine.
//!
//! One image moves through `PRIMARY_ATTEMPT -> EVALUATE -> {ACCEPT | RETRY |
//! FALLBACK} -> DONE`. Retries exist to escape generic results, not to
//! improve confidence: the first attempt that yields a concrete accepted
//! species ends the loop.

use super::evaluate::{FilterSet, Outcome};
use super::throttle::FallbackThrottle;
use crate::classify::{
    FallbackClassifier, LocalImage, Prediction, PrimaryClassifier, Source, normalize,
};
use crate::config::RegionConfig;
use crate::constants::MAX_RETRIES;
use crate::error::{Error, Result};
use crate::filter::dedup_predictions;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one image's trip through the pipeline.
#[derive(Debug, Default)]
pub struct ImageOutcome {
    /// Accepted, deduplicated predictions. May legitimately be empty.
    pub predictions: Vec<Prediction>,
    /// Set when the fallback classifier reported a rate-limit fault;
    /// the batch runner stops fallback use for the rest of the batch.
    pub fallback_rate_limited: bool,
}

/// Orchestrates primary attempts, retries, and the fallback path for
/// one image at a time.
pub struct AttributionPipeline {
    primary: Box<dyn PrimaryClassifier>,
    fallback: Option<Box<dyn FallbackClassifier>>,
    filters: FilterSet,
    region: RegionConfig,
    throttle: FallbackThrottle,
    retry_pause: Duration,
}

impl AttributionPipeline {
    /// Assemble a pipeline.
    pub fn new(
        primary: Box<dyn PrimaryClassifier>,
        fallback: Option<Box<dyn FallbackClassifier>>,
        filters: FilterSet,
        region: RegionConfig,
        throttle: FallbackThrottle,
        retry_pause: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            filters,
            region,
            throttle,
            retry_pause,
        }
    }

    /// Run one image through the state machine.
    ///
    /// All retries and the fallback are fully resolved before this returns;
    /// no retry state survives across images.
    pub async fn process(
        &mut self,
        image: &LocalImage,
        image_url: &str,
        allow_fallback: bool,
    ) -> Result<ImageOutcome> {
        let mut attempts_used: u32 = 0;
        let accepted_primary;

        loop {
            let accepted = self.primary_attempt(image).await;

            if !accepted.is_empty() {
                // Concrete species accepted; retrying cannot improve this.
                return Ok(ImageOutcome {
                    predictions: accepted,
                    fallback_rate_limited: false,
                });
            }

            if attempts_used < MAX_RETRIES {
                attempts_used += 1;
                info!(
                    "No concrete species for {} yet, retry {attempts_used}/{MAX_RETRIES}",
                    image.image_id
                );
                if !self.retry_pause.is_zero() {
                    tokio::time::sleep(self.retry_pause).await;
                }
                continue;
            }

            accepted_primary = accepted;
            break;
        }

        self.fallback_attempt(image, image_url, accepted_primary, allow_fallback)
            .await
    }

    /// One primary classifier invocation, normalized, deduplicated, and
    /// reduced to the accepted set.
    ///
    /// A classifier fault counts as an empty attempt so it feeds the same
    /// retry bound as a generic result.
    async fn primary_attempt(&self, image: &LocalImage) -> Vec<Prediction> {
        let images = std::slice::from_ref(image);
        let entries = match self.primary.classify(images, &self.region).await {
            Ok(mut per_image) => per_image.remove(&image.image_id).unwrap_or_default(),
            Err(e) => {
                warn!("Primary classifier failed for {}: {e}", image.image_id);
                return Vec::new();
            }
        };

        let predictions = normalize(&image.image_id, entries, Source::Primary);
        let deduped = dedup_predictions(predictions);
        self.screen(&image.image_id, deduped)
    }

    /// FALLBACK state: invoked once retries are exhausted with nothing
    /// accepted.
    async fn fallback_attempt(
        &mut self,
        image: &LocalImage,
        image_url: &str,
        accepted_primary: Vec<Prediction>,
        allow_fallback: bool,
    ) -> Result<ImageOutcome> {
        let Some(fallback) = self.fallback.as_ref().filter(|_| allow_fallback) else {
            if self.fallback.is_none() {
                info!(
                    "Still generic after {} retries and no fallback configured, {} gets no attributions",
                    MAX_RETRIES, image.image_id
                );
            }
            return Ok(ImageOutcome {
                predictions: accepted_primary,
                fallback_rate_limited: false,
            });
        };

        info!("Falling back to vision model for {}", image.image_id);
        self.throttle.acquire().await;

        let region_name = self.region.display_name();
        let entries = match fallback.identify(image_url, &region_name).await {
            Ok(entries) => entries,
            Err(Error::FallbackRateLimited) => {
                warn!("Fallback rate limited on {}", image.image_id);
                return Ok(ImageOutcome {
                    predictions: accepted_primary,
                    fallback_rate_limited: true,
                });
            }
            Err(e) => {
                warn!("Fallback failed for {}: {e}", image.image_id);
                return Ok(ImageOutcome {
                    predictions: accepted_primary,
                    fallback_rate_limited: false,
                });
            }
        };

        let fallback_predictions = normalize(&image.image_id, entries, Source::Fallback);
        let accepted_fallback = self.screen(&image.image_id, fallback_predictions);

        // Dedup across the union so the fallback cannot silently duplicate
        // an already-accepted primary result.
        let merged = dedup_predictions(
            accepted_primary
                .into_iter()
                .chain(accepted_fallback)
                .collect(),
        );

        Ok(ImageOutcome {
            predictions: merged,
            fallback_rate_limited: false,
        })
    }

    /// EVALUATE state: fold per-prediction outcome tags into the accepted
    /// set.
    fn screen(&self, image_id: &str, predictions: Vec<Prediction>) -> Vec<Prediction> {
        let mut accepted = Vec::new();

        for prediction in predictions {
            match self.filters.evaluate(&prediction) {
                Outcome::Accepted => accepted.push(prediction),
                outcome => {
                    debug!(
                        "Rejected '{}' ({:.2}%) for {image_id}: {outcome:?}",
                        prediction.species,
                        f64::from(prediction.confidence) * 100.0
                    );
                }
            }
        }

        accepted
    }
}
