// src/config.rs
// =============================================================================
// Settings and the constants they default to.
//
// The CLI (clap, with environment fallbacks) is the only source of
// configuration; `Settings::from_args` turns the parsed flags into a
// validated struct the rest of the program uses.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::cli::GlobalArgs;
use crate::error::ConfigError;
use crate::model::Dataset;

pub const EFORMS_CATALOG_URL: &str = "https://www.iamsmart.gov.hk/data/eform.txt";
pub const SERVICES_CATALOG_URL: &str = "https://www.iamsmart.gov.hk/data/gov_dep_data.txt";

/// Per-request timeout for probes and catalog downloads
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Probes in flight at once
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_PORT: u16 = 5000;

/// Scheduler period between rounds of checks
pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);
pub const SELF_PING_INTERVAL: Duration = Duration::from_secs(600);
pub const SELF_PING_WARMUP: Duration = Duration::from_secs(30);
pub const SELF_PING_TIMEOUT: Duration = Duration::from_secs(10);

/// A progress subscriber waiting this long gets a keep-alive
pub const PROGRESS_IDLE_WINDOW: Duration = Duration::from_secs(10);
/// ...and is disconnected after this long without any event
pub const PROGRESS_IDLE_CEILING: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub workers: usize,
    pub timeout: Duration,
    pub audit_log: Option<PathBuf>,
    pub catalog_urls: HashMap<Dataset, Url>,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 {
            return Err(ConfigError::Zero("--workers"));
        }
        if args.timeout == 0 {
            return Err(ConfigError::Zero("--timeout"));
        }

        let parse = |dataset: Dataset, raw: &str| {
            Url::parse(raw)
                .map(|url| (dataset, url))
                .map_err(|source| ConfigError::CatalogUrl { dataset, source })
        };

        let catalog_urls = HashMap::from([
            parse(Dataset::Eforms, &args.eforms_url)?,
            parse(Dataset::Services, &args.services_url)?,
        ]);

        Ok(Self {
            data_dir: args.data_dir.clone(),
            workers: args.workers,
            timeout: Duration::from_secs(args.timeout),
            audit_log: args.audit_log.clone(),
            catalog_urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn args(extra: &[&str]) -> GlobalArgs {
        let mut argv = vec!["link-warden", "check", "eforms"];
        argv.extend_from_slice(extra);
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::from_args(&args(&[])).unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(15));
        assert_eq!(settings.catalog_urls.len(), 2);
        assert_eq!(
            settings.catalog_urls[&Dataset::Services].as_str(),
            SERVICES_CATALOG_URL
        );
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Settings::from_args(&args(&["--workers", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::Zero("--workers")));
    }

    #[test]
    fn test_bad_catalog_url_rejected() {
        let err = Settings::from_args(&args(&["--eforms-url", "not a url"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CatalogUrl {
                dataset: Dataset::Eforms,
                ..
            }
        ));
    }
}
