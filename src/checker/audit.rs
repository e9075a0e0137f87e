// src/checker/audit.rs
// =============================================================================
// Append-only diagnostic log of every probe.
//
// One CSV row per probe with both attempts' codes, errors and whether
// certificate verification was bypassed. Useful for working out *why* a
// link was classified the way it was. Writing is best effort: any failure
// is logged and swallowed so a full disk never aborts a check run.
// =============================================================================

use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::http::ProbeOutcome;
use crate::model::{self, LinkRecord};

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    // Serialises appends from concurrent probes so rows never interleave
    lock: Mutex<()>,
}

#[derive(Debug, Serialize)]
struct AuditRow {
    timestamp: String,
    department: String,
    title: String,
    lang: &'static str,
    url: String,
    head_code: Option<u16>,
    head_error: Option<String>,
    head_verify_bypassed: bool,
    get_code: Option<u16>,
    get_error: Option<String>,
    get_verify_bypassed: Option<bool>,
    final_status: String,
}

impl AuditRow {
    fn new(record: &LinkRecord, outcome: &ProbeOutcome) -> Self {
        let get = outcome.get.as_ref();
        Self {
            timestamp: model::timestamp::format(&model::now()),
            department: record.department.clone(),
            title: record.title.clone(),
            lang: record.lang.as_str(),
            url: record.url.clone(),
            head_code: outcome.head.code,
            head_error: outcome.head.error.clone(),
            head_verify_bypassed: outcome.head.verify_bypassed,
            get_code: get.and_then(|a| a.code),
            get_error: get.and_then(|a| a.error.clone()),
            get_verify_bypassed: get.map(|a| a.verify_bypassed),
            final_status: outcome.status.to_string(),
        }
    }
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Appends one row on the blocking pool; errors are logged, never returned
    pub async fn record(self: &Arc<Self>, record: &LinkRecord, outcome: &ProbeOutcome) {
        let row = AuditRow::new(record, outcome);
        let this = Arc::clone(self);

        let written = tokio::task::spawn_blocking(move || this.append(&row))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|result| result);
        if let Err(e) = written {
            log::warn!("Could not write audit log {}: {}", self.path.display(), e);
        }
    }

    fn append(&self, row: &AuditRow) -> anyhow::Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("audit log lock poisoned"))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{Attempt, LinkStatus};
    use crate::model::Lang;

    fn record() -> LinkRecord {
        LinkRecord {
            department: "Dept A".to_string(),
            title: "Form 1".to_string(),
            lang: Lang::En,
            url: "https://x/1".to_string(),
        }
    }

    fn outcome() -> ProbeOutcome {
        ProbeOutcome {
            status: LinkStatus::Error(404),
            head: Attempt {
                code: Some(405),
                ..Attempt::default()
            },
            get: Some(Attempt {
                code: Some(404),
                ..Attempt::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AuditLog::new(dir.path().join("audit.csv")));

        log.record(&record(), &outcome()).await;
        log.record(&record(), &outcome()).await;

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,department,title"));
        assert!(lines[1].contains("https://x/1"));
        assert!(lines[1].ends_with("Error 404"));
    }

    #[tokio::test]
    async fn test_unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let log = Arc::new(AuditLog::new(dir.path()));
        log.record(&record(), &outcome()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rows_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AuditLog::new(dir.path().join("audit.csv")));

        let writers: Vec<_> = (0..16)
            .map(|_| {
                let log = Arc::clone(&log);
                tokio::spawn(async move { log.record(&record(), &outcome()).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 17);
        assert!(lines[1..].iter().all(|line| line.ends_with("Error 404")));
    }
}
