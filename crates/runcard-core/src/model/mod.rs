//! Project / Lot / StressGroup / Step records as persisted in the store.

pub mod project;
pub mod step;

pub use project::{Header, Lot, Project, StressGroup};
pub use step::{SKIPPED, Step, StepField, StepPatch, TimeMark};
