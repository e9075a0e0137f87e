// src/run/mod.rs
// =============================================================================
// Check runs: the coordinator that drives one run end to end, and the
// single-flight guard that keeps runs from overlapping.
// =============================================================================

mod coordinator;
mod guard;

pub use coordinator::{Coordinator, Trigger};
