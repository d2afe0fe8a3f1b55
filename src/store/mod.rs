//! Persistence store types and interface.

mod rest;

pub use rest::RestStore;

use crate::classify::Prediction;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of work: an image awaiting attribution.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageTask {
    /// Store identity of the image.
    pub id: String,
    /// Publicly fetchable image URL.
    pub image_url: String,
    /// Capture timestamp, newest first in fetch order.
    pub taken_on: Option<DateTime<Utc>>,
}

/// A finalized, persistable attribution result.
///
/// Unique per `(image_id, species, model_version)`; upserts on that key
/// are idempotent replacements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionRecord {
    /// Image the attribution belongs to.
    pub image_id: String,
    /// Species common name. Never empty or blocklisted.
    pub species: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Model version that produced the record.
    pub model_version: String,
    /// Opaque metadata.
    pub extra: Option<serde_json::Value>,
}

impl AttributionRecord {
    /// Build a record from an accepted prediction.
    pub fn from_prediction(image_id: &str, prediction: &Prediction, model_version: &str) -> Self {
        Self {
            image_id: image_id.to_string(),
            species: prediction.species.clone(),
            confidence: prediction.confidence,
            model_version: model_version.to_string(),
            extra: prediction.raw.clone(),
        }
    }
}

/// Persistence store the pipeline reads tasks from and writes records to.
#[async_trait]
pub trait AttributionStore: Send + Sync {
    /// Fetch up to `limit` images that have no attribution record yet,
    /// newest first by capture time.
    async fn fetch_unattributed(&self, limit: usize) -> Result<Vec<ImageTask>>;

    /// Insert or replace one attribution record, keyed on
    /// `(image_id, species, model_version)`.
    async fn upsert(&self, record: &AttributionRecord) -> Result<()>;
}
