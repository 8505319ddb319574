// Gap detection and observation
pub mod gap_detector;
pub mod lifecycle;
pub mod register;

pub use gap_detector::GapDetector;
pub use lifecycle::{GapLifecycle, LifecycleState, ObservationBudget};
pub use register::GapRegister;
