//! Identity generation for projects, lots, stress groups and steps.
//!
//! Ids combine wall-clock milliseconds with a random 32-bit suffix. Collisions
//! are not detected; the suffix makes them vanishingly unlikely at the rates a
//! single operator creates rows.

use chrono::Utc;

pub const PROJECT_PREFIX: &str = "proj";
pub const LOT_PREFIX: &str = "lot";
pub const STRESS_PREFIX: &str = "str";
pub const STEP_PREFIX: &str = "row";

/// Generate a fresh id of the form `<prefix>_<millis>_<8 hex>`.
#[must_use]
pub fn new_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::random();
    format!("{prefix}_{millis}_{suffix:08x}")
}

#[must_use]
pub fn project_id() -> String {
    new_id(PROJECT_PREFIX)
}

#[must_use]
pub fn lot_id() -> String {
    new_id(LOT_PREFIX)
}

#[must_use]
pub fn stress_id() -> String {
    new_id(STRESS_PREFIX)
}

#[must_use]
pub fn step_rid() -> String {
    new_id(STEP_PREFIX)
}
