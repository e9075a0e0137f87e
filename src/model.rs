// src/model.rs
// =============================================================================
// Shared data types that flow between the subsystems.
//
// - Dataset: which catalog we are checking (e-forms or services)
// - LinkRecord: one URL to probe, produced fresh by the catalog normalizer
// - CheckResult: one probed record, persisted in the snapshot
// - HistorySnapshot: the persisted result set for one dataset
//
// Timestamps are local wall-clock times stored as "YYYY-MM-DD HH:MM:SS"
// strings so the JSON files stay readable and stable across runs.
// =============================================================================

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::checker::LinkStatus;

pub type Timestamp = NaiveDateTime;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Current local time truncated to whole seconds (the persisted precision)
pub fn now() -> Timestamp {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

// The two link catalogs we track, each with its own snapshot and export files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Eforms,
    Services,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [Dataset::Eforms, Dataset::Services];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Eforms => "eforms",
            Dataset::Services => "services",
        }
    }

    /// Snapshot file name inside the data directory
    pub fn snapshot_file(&self) -> &'static str {
        match self {
            Dataset::Eforms => "history.json",
            Dataset::Services => "history_services.json",
        }
    }

    /// Tabular export file name inside the data directory
    pub fn export_file(&self) -> &'static str {
        match self {
            Dataset::Eforms => "link_history.csv",
            Dataset::Services => "link_history_services.csv",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eforms" => Ok(Dataset::Eforms),
            "services" => Ok(Dataset::Services),
            other => Err(format!("Unknown dataset: {}", other)),
        }
    }
}

// Language variant of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Tc,
    Sc,
}

impl Lang {
    /// Emission order within one catalog item
    pub const ORDER: [Lang; 3] = [Lang::En, Lang::Tc, Lang::Sc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Tc => "tc",
            Lang::Sc => "sc",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// One URL to probe. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub department: String,
    pub title: String,
    pub lang: Lang,
    /// Non-empty and trimmed
    pub url: String,
}

impl LinkRecord {
    /// Human-readable label used in progress messages
    pub fn label(&self) -> String {
        format!("{} – {} ({})", self.department, self.title, self.lang)
    }
}

// One probed record as stored in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub department: String,
    pub title: String,
    pub lang: Lang,
    pub url: String,
    pub status: LinkStatus,
    /// None exactly when status is OK
    #[serde(with = "timestamp::option", default)]
    pub first_broken: Option<Timestamp>,
}

// The persisted result set for one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub results: Vec<CheckResult>,
    #[serde(with = "timestamp::option", default)]
    pub last_checked: Option<Timestamp>,
    #[serde(
        with = "timestamp::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_auto_refresh: Option<Timestamp>,
}

// serde helpers for the "YYYY-MM-DD HH:MM:SS" timestamp format
pub mod timestamp {
    use super::{Timestamp, TIMESTAMP_FORMAT};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &Timestamp) -> String {
        ts.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn parse(s: &str) -> Result<Timestamp, chrono::ParseError> {
        Timestamp::parse_from_str(s, TIMESTAMP_FORMAT)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Timestamp>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(ts) => serializer.serialize_some(&format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Timestamp>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_parse() {
        assert_eq!("eforms".parse::<Dataset>(), Ok(Dataset::Eforms));
        assert_eq!("services".parse::<Dataset>(), Ok(Dataset::Services));
        assert!("forms".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_record_label() {
        let record = LinkRecord {
            department: "Dept A".to_string(),
            title: "Form 1".to_string(),
            lang: Lang::Tc,
            url: "https://x/1".to_string(),
        };
        assert_eq!(record.label(), "Dept A – Form 1 (tc)");
    }

    #[test]
    fn test_snapshot_reads_reference_layout() {
        let json = r#"{
            "results": [
                {"department": "D", "title": "T", "lang": "en", "url": "https://x/1",
                 "status": "Error 404", "first_broken": "2024-05-01 10:00:00"}
            ],
            "last_checked": "2024-05-02 10:00:00"
        }"#;
        let snapshot: HistorySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.results[0].status, LinkStatus::Error(404));
        assert_eq!(
            snapshot.results[0].first_broken,
            Some(timestamp::parse("2024-05-01 10:00:00").unwrap())
        );
        assert_eq!(snapshot.last_auto_refresh, None);
    }

    #[test]
    fn test_absent_auto_refresh_is_not_written() {
        let snapshot = HistorySnapshot {
            results: vec![],
            last_checked: Some(timestamp::parse("2024-05-02 10:00:00").unwrap()),
            last_auto_refresh: None,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"last_checked\":\"2024-05-02 10:00:00\""));
        assert!(!json.contains("last_auto_refresh"));
    }
}
