//! Per-image species deduplication.

use crate::classify::Prediction;
use std::collections::HashMap;

/// Collapse predictions to at most one per distinct species.
///
/// Species are keyed case-insensitively and the highest-confidence
/// instance wins. Equal confidences keep whichever entry the fold sees
/// last; the tie-break is deliberately unspecified. Output order is
/// unspecified and callers must not rely on it.
pub fn dedup_predictions(predictions: Vec<Prediction>) -> Vec<Prediction> {
    let mut best: HashMap<String, Prediction> = HashMap::with_capacity(predictions.len());

    for prediction in predictions {
        let key = prediction.species.to_lowercase();
        match best.get(&key) {
            Some(existing) if existing.confidence > prediction.confidence => {}
            _ => {
                best.insert(key, prediction);
            }
        }
    }

    best.into_values().collect()
}
