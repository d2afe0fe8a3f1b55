//! Attribution decision pipeline.

mod attribution;
mod batch;
mod evaluate;
mod throttle;

pub use attribution::{AttributionPipeline, ImageOutcome};
pub use batch::{BatchRunner, BatchSummary, Pacing};
pub use evaluate::{FilterSet, Outcome};
pub use throttle::FallbackThrottle;
