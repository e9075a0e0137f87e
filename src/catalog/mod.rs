// src/catalog/mod.rs
// =============================================================================
// This module handles the upstream link catalogs.
//
// Submodules:
// - fetch: Downloads a catalog (with a bounded retry policy)
// - normalize: Turns raw catalog items into LinkRecords
//
// The catalog is only ever read. If it cannot be fetched the run keeps the
// previous results instead of replacing them with nothing.
// =============================================================================

mod fetch;
mod normalize;

pub use fetch::{fetch_with_retry, CatalogSource, HttpCatalog, RetryPolicy};
pub use normalize::normalize;
