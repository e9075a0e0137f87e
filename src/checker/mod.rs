// src/checker/mod.rs
// =============================================================================
// This module contains all link checking logic.
//
// Submodules:
// - http: Probes a single URL (HEAD, GET fallback, TLS handling)
// - status: The LinkStatus taxonomy and its sort rank
// - tls: Recognises TLS failure signatures in request errors
// - audit: Optional append-only CSV log of every probe
//
// This file (mod.rs) is the module root - it ties everything together and
// exports the public API that other parts of our application can use.
// =============================================================================

mod audit;
mod http;
mod status;
mod tls;

// Re-export public items from submodules
// This lets users write `checker::HttpProber` instead of
// `checker::http::HttpProber`
pub use audit::AuditLog;
pub use http::{Attempt, HttpProber, ProbeOutcome, Prober};
pub use status::{LinkStatus, Severity};
