//! Classifier interfaces and prediction types.

pub mod normalize;
mod speciesnet;
mod vision;

pub use normalize::normalize;
pub use speciesnet::SpeciesNetClassifier;
pub use vision::VisionFallback;

use crate::config::RegionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Which classifier produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The primary (SpeciesNet-style) classifier.
    Primary,
    /// The fallback (vision model) classifier.
    Fallback,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// One classifier's guess for one image, normalized to a uniform shape.
///
/// Immutable once created by [`normalize`].
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Species common name.
    pub species: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    /// Which classifier produced this prediction.
    pub source: Source,
    /// Opaque classifier-specific metadata.
    pub raw: Option<serde_json::Value>,
}

/// One raw classifier output entry, before normalization.
///
/// Fields are optional because classifier payloads may be malformed;
/// the normalizer drops incomplete entries instead of failing the batch.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    /// Species label as emitted by the classifier.
    pub species: Option<String>,
    /// Self-reported confidence.
    pub confidence: Option<f64>,
    /// Classifier-specific metadata carried through to the prediction.
    pub detail: Option<serde_json::Value>,
}

/// An image staged on local disk for primary classification.
#[derive(Debug, Clone)]
pub struct LocalImage {
    /// Store identity of the image.
    pub image_id: String,
    /// Local path of the downloaded file.
    pub path: PathBuf,
}

/// Primary classifier: local image paths in, raw entries per image out.
#[async_trait]
pub trait PrimaryClassifier: Send + Sync {
    /// Classify a set of local images under a region constraint.
    ///
    /// Images without predictions may be absent from the result map.
    async fn classify(
        &self,
        images: &[LocalImage],
        region: &RegionConfig,
    ) -> Result<HashMap<String, Vec<RawEntry>>>;
}

/// Fallback classifier: one image URL plus a region-constrained prompt.
#[async_trait]
pub trait FallbackClassifier: Send + Sync {
    /// Identify the bird in one image, constrained to the named region.
    ///
    /// Returns [`crate::Error::FallbackRateLimited`] on an HTTP 429 so the
    /// caller can stop fallback use for the rest of the batch.
    async fn identify(&self, image_url: &str, region_name: &str) -> Result<Vec<RawEntry>>;
}
