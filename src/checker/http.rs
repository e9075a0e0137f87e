// src/checker/http.rs
// =============================================================================
// This module checks if URLs are alive by making HTTP requests.
//
// Key functionality:
// - Makes an HTTP HEAD request first (lightweight, no body download)
// - Falls back to GET when HEAD gives no usable answer or a code >= 400
//   (plenty of government servers reject HEAD with 403/405)
// - Classifies TLS failures: legacy renegotiation and handshake failures are
//   reported as-is, other certificate problems get one retry without
//   verification so we can still tell whether the page exists
// - Never returns an error: every failure becomes a LinkStatus
//
// Rust concepts:
// - Traits: `Prober` lets the run coordinator use a fake in tests
// - async/await: For network I/O
// - Option<T>: An attempt may or may not have produced a status code
// =============================================================================

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;

use super::audit::AuditLog;
use super::status::LinkStatus;
use super::tls::{self, TlsFailure};
use crate::model::LinkRecord;

// Anything that can classify a single link
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, record: &LinkRecord) -> ProbeOutcome;
}

// What happened during one request (HEAD or GET), including a possible
// verification-bypass retry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attempt {
    /// Final HTTP status code, if any response arrived
    pub code: Option<u16>,
    /// Error text when no response arrived (or the bypass retry failed)
    pub error: Option<String>,
    /// True when the code came from (or was sought by) the no-verify retry
    pub verify_bypassed: bool,
    /// Terminal TLS classification, if any
    pub tls: Option<TlsFailure>,
}

impl Attempt {
    // A response worth keeping: any code below 400
    fn is_usable(&self) -> bool {
        matches!(self.code, Some(code) if code < 400)
    }

    fn is_terminal_tls(&self) -> bool {
        matches!(
            self.tls,
            Some(TlsFailure::LegacyRenegotiation) | Some(TlsFailure::HandshakeFailure)
        )
    }
}

// The complete result of probing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: LinkStatus,
    pub head: Attempt,
    /// Only present when the GET fallback ran
    pub get: Option<Attempt>,
}

// Sends one request. Ok is the final status code (redirects followed, body
// never read); Err is the flattened error chain, URL stripped.
#[async_trait]
trait Transport: Send + Sync {
    async fn send(&self, method: Method, url: &str, verify: bool) -> Result<u16, String>;
}

// The real transport: a verifying client, plus one that accepts invalid
// certificates for the single retry after a generic verification failure
struct Clients {
    client: Client,
    insecure_client: Client,
}

#[async_trait]
impl Transport for Clients {
    async fn send(&self, method: Method, url: &str, verify: bool) -> Result<u16, String> {
        let client = if verify {
            &self.client
        } else {
            &self.insecure_client
        };
        match client.request(method, url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(tls::error_chain_text(&e.without_url())),
        }
    }
}

// Probes links over real HTTP
pub struct HttpProber {
    transport: Box<dyn Transport>,
    audit: Option<Arc<AuditLog>>,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let build = |accept_invalid: bool| {
            Client::builder()
                .timeout(timeout)
                .redirect(reqwest::redirect::Policy::limited(10))
                .danger_accept_invalid_certs(accept_invalid)
                .build()
        };

        Ok(Self::with_transport(Clients {
            client: build(false)?,
            insecure_client: build(true)?,
        }))
    }

    fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            audit: None,
        }
    }

    // Enables the per-probe diagnostic log
    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    // One request with the TLS handling described at the top of this file
    async fn attempt(&self, method: Method, url: &str) -> Attempt {
        let signature = match self.transport.send(method.clone(), url, true).await {
            Ok(code) => {
                return Attempt {
                    code: Some(code),
                    ..Attempt::default()
                }
            }
            Err(signature) => signature,
        };

        match tls::classify(&signature) {
            Some(failure @ TlsFailure::LegacyRenegotiation)
            | Some(failure @ TlsFailure::HandshakeFailure) => Attempt {
                code: None,
                error: Some(signature),
                verify_bypassed: false,
                tls: Some(failure),
            },
            Some(TlsFailure::Verification) => {
                log::debug!("TLS verification failed for {}, retrying without verification", url);
                match self.transport.send(method, url, false).await {
                    Ok(code) => Attempt {
                        code: Some(code),
                        error: None,
                        verify_bypassed: true,
                        tls: None,
                    },
                    Err(retry_signature) => Attempt {
                        code: None,
                        // A bypass that hits a terminal signature still counts
                        tls: tls::classify(&retry_signature)
                            .filter(|f| *f != TlsFailure::Verification),
                        error: Some(format!("bypass failed: {}", retry_signature)),
                        verify_bypassed: true,
                    },
                }
            }
            None => Attempt {
                code: None,
                error: Some(signature),
                verify_bypassed: false,
                tls: None,
            },
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, record: &LinkRecord) -> ProbeOutcome {
        let head = self.attempt(Method::HEAD, &record.url).await;

        // Some servers don't like HEAD; fall back to GET when we got nothing
        // usable, unless the TLS layer already gave a terminal verdict
        let get = if head.is_usable() || head.is_terminal_tls() {
            None
        } else {
            Some(self.attempt(Method::GET, &record.url).await)
        };

        let status = derive_status(&head, get.as_ref());
        let outcome = ProbeOutcome { status, head, get };

        log::debug!("{} -> {}", record.url, outcome.status);
        if let Some(audit) = &self.audit {
            audit.record(record, &outcome).await;
        }

        outcome
    }
}

// Combines the HEAD attempt and the optional GET attempt into one status.
//
// Priority:
// 1. legacy renegotiation on either attempt
// 2. handshake failure on either attempt
// 3. if GET ran, its code decides; no response from GET -> Broken
// 4. otherwise the HEAD code; no response -> Broken
pub fn derive_status(head: &Attempt, get: Option<&Attempt>) -> LinkStatus {
    let attempts = || std::iter::once(head).chain(get);

    if attempts().any(|a| a.tls == Some(TlsFailure::LegacyRenegotiation)) {
        return LinkStatus::TlsLegacyRenegotiation;
    }
    if attempts().any(|a| a.tls == Some(TlsFailure::HandshakeFailure)) {
        return LinkStatus::TlsHandshakeFailure;
    }

    // A HEAD code is never carried over a GET that failed outright
    match get.map_or(head.code, |g| g.code) {
        Some(code) => LinkStatus::from_code(code),
        None => LinkStatus::Broken,
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why two clients?
//    - reqwest fixes certificate verification when the client is built
//    - Cloning a Client is cheap but does not let you change its settings
//    - So we build both up front and the transport picks one per request
//    - Tests swap the transport for a scripted one to reach the TLS paths
//
// 2. Why `without_url()`?
//    - reqwest puts the URL into the error message
//    - A host like ssl.example.gov would otherwise look like a TLS failure
//
// 3. Why never return Err from probe()?
//    - A dead link is a *result*, not an error
//    - The run keeps going no matter what a single server does
// -----------------------------------------------------------------------------
