//! Minimum confidence gating.

/// Gate predictions on a process-wide confidence threshold.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceGate {
    threshold: f32,
}

impl ConfidenceGate {
    /// Create a gate with the given threshold.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Whether a confidence value meets the threshold (inclusive).
    pub fn accepts(&self, confidence: f32) -> bool {
        confidence >= self.threshold
    }
}
