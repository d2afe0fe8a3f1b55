//! Per-prediction evaluation into a tagged outcome.

use crate::classify::Prediction;
use crate::constants::BLOCKLIST;
use crate::filter::{ConfidenceGate, GeoFilter};

/// What the filters decided about one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Concrete species that passed every filter.
    Accepted,
    /// The generic class token; the classifier saw a bird but named none.
    Generic,
    /// Blocklisted label, dropped unconditionally.
    Blocked,
    /// Below the confidence threshold.
    LowConfidence,
    /// Not plausible for the configured region.
    OutOfRegion,
}

/// The filter configuration applied to every prediction of a run.
#[derive(Debug, Clone)]
pub struct FilterSet {
    geo: GeoFilter,
    gate: ConfidenceGate,
    generic_token: String,
}

impl FilterSet {
    /// Assemble the filter set.
    pub fn new(geo: GeoFilter, gate: ConfidenceGate, generic_token: impl Into<String>) -> Self {
        Self {
            geo,
            gate,
            generic_token: generic_token.into(),
        }
    }

    /// Evaluate one prediction. Pure; the retry/fallback decision is a
    /// fold over these tags.
    ///
    /// The blocklist is checked before everything else. The generic token
    /// is tagged before the geofence check because a generic label never
    /// appears in a species reference list, and the retry decision needs
    /// "saw a bird" kept distinct from "species not local".
    pub fn evaluate(&self, prediction: &Prediction) -> Outcome {
        let species = prediction.species.trim();

        if BLOCKLIST
            .iter()
            .any(|blocked| species.eq_ignore_ascii_case(blocked))
        {
            return Outcome::Blocked;
        }

        if species.eq_ignore_ascii_case(&self.generic_token) {
            return Outcome::Generic;
        }

        if !self.gate.accepts(prediction.confidence) {
            return Outcome::LowConfidence;
        }

        if !self.geo.accepts(species) {
            return Outcome::OutOfRegion;
        }

        Outcome::Accepted
    }
}
