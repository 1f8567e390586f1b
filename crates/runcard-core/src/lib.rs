//! runcard-core library.
//!
//! Reliability-test run cards: a [`model::Project`] owns lots, each lot owns
//! stress groups, each group owns ordered [`model::Step`]s with start/end
//! timestamps. Status is always derived from step timestamps
//! ([`status`]); every mutation commits through [`sync::SyncEngine`] onto a
//! [`store::RecordStore`].
//!
//! # Conventions
//!
//! - **Errors**: engine operations return [`error::RunCardError`]; config and
//!   CLI glue use `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod flatten;
pub mod hierarchy;
pub mod ids;
pub mod lock;
pub mod model;
pub mod status;
pub mod store;
pub mod sync;
pub mod template;

pub use error::{ErrorCode, Result, RunCardError};
pub use sync::{StepAction, StepLocation, SyncEngine};
