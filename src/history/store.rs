// src/history/store.rs
// =============================================================================
// Reads and writes the per-dataset files in the data directory:
// - history*.json       the snapshot (results + timestamps)
// - link_history*.csv   the flattened export, regenerated every run
//
// Writes never touch the real file in place. We write a temp file in the
// same directory and rename it over the target, so a reader sees either the
// old snapshot or the new one, never half of one.
// =============================================================================

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::model::{timestamp, CheckResult, Dataset, HistorySnapshot};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

// One CSV row; column order is the export format
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    department: &'a str,
    title: &'a str,
    lang: &'a str,
    url: &'a str,
    status: String,
    first_broken: String,
}

impl<'a> From<&'a CheckResult> for ExportRow<'a> {
    fn from(result: &'a CheckResult) -> Self {
        Self {
            department: &result.department,
            title: &result.title,
            lang: result.lang.as_str(),
            url: &result.url,
            status: result.status.to_string(),
            first_broken: result
                .first_broken
                .as_ref()
                .map(timestamp::format)
                .unwrap_or_default(),
        }
    }
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, dataset: Dataset) -> PathBuf {
        self.dir.join(dataset.snapshot_file())
    }

    pub fn export_path(&self, dataset: Dataset) -> PathBuf {
        self.dir.join(dataset.export_file())
    }

    // Loads a snapshot; a missing file is an empty snapshot
    pub fn load(&self, dataset: Dataset) -> Result<HistorySnapshot, StoreError> {
        let path = self.snapshot_path(dataset);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HistorySnapshot::default()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    // Replaces the snapshot file
    pub fn save(&self, dataset: Dataset, snapshot: &HistorySnapshot) -> Result<(), StoreError> {
        let mut json = serde_json::to_vec_pretty(snapshot)?;
        json.push(b'\n');
        self.replace(&self.snapshot_path(dataset), &json)
    }

    // Replaces the full CSV export (with BOM so spreadsheets pick UTF-8)
    pub fn write_export(&self, dataset: Dataset, results: &[CheckResult]) -> Result<(), StoreError> {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend(results_csv(results.iter())?);
        self.replace(&self.export_path(dataset), &bytes)
    }

    // Reads the last generated export as-is
    pub fn read_export(&self, dataset: Dataset) -> Result<Vec<u8>, StoreError> {
        let path = self.export_path(dataset);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NoExport(dataset)),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    // Builds the "errors only" export from the current snapshot
    pub fn errors_csv(&self, dataset: Dataset) -> Result<Vec<u8>, StoreError> {
        let snapshot = self.load(dataset)?;
        results_csv(snapshot.results.iter().filter(|r| !r.status.is_ok()))
    }

    fn replace(&self, target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: target.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(target).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

// Header-included CSV of the given results
fn results_csv<'a>(results: impl Iterator<Item = &'a CheckResult>) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["department", "title", "lang", "url", "status", "first_broken"])?;
    for result in results {
        writer.serialize(ExportRow::from(result))?;
    }
    writer
        .into_inner()
        .map_err(|e| StoreError::Csv(csv::Error::from(e.into_error())))
}
