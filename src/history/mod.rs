// src/history/mod.rs
// =============================================================================
// Persisted results and their continuity across runs.
//
// Submodules:
// - merge: Carries "first broken" timestamps forward and sorts results
// - store: Snapshot JSON + CSV exports, written replace-on-write
// =============================================================================

mod merge;
mod store;

pub use merge::merge;
pub use store::SnapshotStore;
