//! Prediction filters: geofence, confidence gate, deduplication.

mod confidence;
mod dedup;
mod geo;

pub use confidence::ConfidenceGate;
pub use dedup::dedup_predictions;
pub use geo::GeoFilter;
