// src/catalog/fetch.rs
// =============================================================================
// Downloads the upstream link catalogs.
//
// Each dataset is published as a JSON array (served as .txt). Anything else
// (HTTP error, bad JSON, an object, an empty array) counts as a failed
// fetch so a broken upstream can never wipe out our history.
//
// Retrying lives here too, as an explicit policy (attempts + delay) that
// the run coordinator applies around any CatalogSource.
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use url::Url;

use crate::error::CatalogError;
use crate::model::Dataset;

// Anything that can produce the raw items of a catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, dataset: Dataset) -> Result<Vec<Value>, CatalogError>;
}

// Bounded retry: `max_attempts` tries in total, `delay` between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    // Delays between attempts; empty when only one attempt is allowed
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        FixedInterval::new(self.delay).take(self.max_attempts.saturating_sub(1))
    }
}

// Fetches a catalog, retrying per the policy
pub async fn fetch_with_retry(
    source: &dyn CatalogSource,
    dataset: Dataset,
    policy: RetryPolicy,
) -> Result<Vec<Value>, CatalogError> {
    let mut attempt = 0;
    Retry::spawn(policy.strategy(), || {
        attempt += 1;
        let current = attempt;
        async move {
            log::info!("[{}] Fetching catalog, attempt {}...", dataset, current);
            source.fetch(dataset).await.map_err(|e| {
                log::warn!("[{}] Catalog fetch failed: {}", dataset, e);
                e
            })
        }
    })
    .await
}

// Fetches catalogs from their published HTTP endpoints
pub struct HttpCatalog {
    client: Client,
    endpoints: HashMap<Dataset, Url>,
}

impl HttpCatalog {
    pub fn new(timeout: Duration, endpoints: HashMap<Dataset, Url>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch(&self, dataset: Dataset) -> Result<Vec<Value>, CatalogError> {
        let Some(endpoint) = self.endpoints.get(&dataset) else {
            return Err(CatalogError::NotConfigured(dataset));
        };

        let response = self.client.get(endpoint.clone()).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        // Always decode as UTF-8, whatever charset the server claims
        let body = response.bytes().await?;
        parse_items(&body)
    }
}

// Validates a catalog payload: must be a non-empty JSON array
pub fn parse_items(body: &[u8]) -> Result<Vec<Value>, CatalogError> {
    // Tolerate a UTF-8 byte order mark
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);

    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) if items.is_empty() => Err(CatalogError::Empty),
        Value::Array(items) => Ok(items),
        _ => Err(CatalogError::NotAnArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Fails a fixed number of times, then returns one item
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogSource for Flaky {
        async fn fetch(&self, _dataset: Dataset) -> Result<Vec<Value>, CatalogError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(CatalogError::Status(503))
            } else {
                Ok(vec![json!({"en_url": "https://x/1"})])
            }
        }
    }

    fn quick(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_parse_items() {
        assert_eq!(parse_items(b"[{\"a\":1}]").unwrap().len(), 1);
        assert!(matches!(parse_items(b"[]"), Err(CatalogError::Empty)));
        assert!(matches!(parse_items(b"{}"), Err(CatalogError::NotAnArray)));
        assert!(matches!(parse_items(b"<html>"), Err(CatalogError::Json(_))));
        assert_eq!(parse_items(b"\xEF\xBB\xBF[1]").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let source = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let items = fetch_with_retry(&source, Dataset::Eforms, quick(3)).await;
        assert!(items.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let source = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        };
        let items = fetch_with_retry(&source, Dataset::Services, quick(3)).await;
        assert!(matches!(items, Err(CatalogError::Status(503))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_catalog_fetch() {
        let app = Router::new()
            .route("/eform.txt", get(|| async { "[{\"en_url\": \"https://x/1\"}]" }))
            .route("/services.txt", get(|| async { "[]" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoints = HashMap::from([
            (Dataset::Eforms, Url::parse(&format!("{}/eform.txt", base)).unwrap()),
            (Dataset::Services, Url::parse(&format!("{}/services.txt", base)).unwrap()),
        ]);
        let catalog = HttpCatalog::new(Duration::from_secs(5), endpoints).unwrap();

        assert_eq!(catalog.fetch(Dataset::Eforms).await.unwrap().len(), 1);
        assert!(matches!(
            catalog.fetch(Dataset::Services).await,
            Err(CatalogError::Empty)
        ));
    }
}
