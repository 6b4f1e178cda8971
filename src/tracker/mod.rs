pub mod analyzer;
pub mod extrapolate;
pub mod phase;
pub mod rep;
pub mod smooth;

pub use analyzer::{MetricCalculator, MetricSnapshot, PoseAnalyzer};
pub use extrapolate::Extrapolate;
pub use phase::{Phase, PhaseDetector, PhaseTransition};
pub use rep::{RepCompletion, RepCounter};
pub use smooth::AdaptiveSmoother;
