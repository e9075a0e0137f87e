// src/error.rs
// =============================================================================
// Typed errors for the subsystems.
//
// The binary edge (main.rs and the CLI handlers) uses anyhow::Result; the
// pieces underneath return these enums so callers can tell "already running"
// apart from "catalog unreachable" apart from "snapshot unreadable".
//
// Note what is NOT here: probing a link never fails, a dead link is a
// LinkStatus.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Dataset;

// Fetching the upstream link catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Catalog returned HTTP {0}")]
    Status(u16),

    #[error("Catalog payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog payload is not a JSON array")]
    NotAnArray,

    #[error("Catalog payload is empty")]
    Empty,

    #[error("No catalog endpoint configured for {0}")]
    NotConfigured(Dataset),
}

// Reading and writing snapshot / export files
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not serialise snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No export has been generated for {0} yet")]
    NoExport(Dataset),
}

// Running a check
#[derive(Error, Debug)]
pub enum RunError {
    /// Another run holds the single-flight guard
    #[error("Another check is in progress")]
    AlreadyRunning,

    #[error("Could not load previous results: {0}")]
    History(#[from] StoreError),
}

// Validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid catalog URL for {dataset}: {source}")]
    CatalogUrl {
        dataset: Dataset,
        #[source]
        source: url::ParseError,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_message() {
        assert_eq!(
            RunError::AlreadyRunning.to_string(),
            "Another check is in progress"
        );
    }

    #[test]
    fn test_store_error_wraps_into_run_error() {
        let err: RunError = StoreError::NoExport(Dataset::Eforms).into();
        assert!(matches!(err, RunError::History(_)));
        assert!(err.to_string().contains("eforms"));
    }
}
