//! Workout session recording and export.

pub mod accumulator;
pub mod exporter_tcx;
pub mod session;
pub mod types;

pub use accumulator::SessionAccumulator;
pub use session::WorkoutSession;
pub use types::{
    ExportError, SessionConfig, SessionError, SessionHistory, SessionSnapshot, SessionState,
    WorkoutSummary,
};
