// src/history/merge.rs
// =============================================================================
// Combines this run's probe results with the previous snapshot.
//
// "first_broken" continuity:
// - OK                          -> first_broken = None
// - not OK, previously not OK   -> keep the previous first_broken
// - not OK, otherwise           -> first_broken = this run's timestamp
//
// The lookup is by URL, so a URL listed under several records shares one
// "broken since" time.
// =============================================================================

use std::collections::HashMap;

use crate::checker::LinkStatus;
use crate::model::{CheckResult, HistorySnapshot, LinkRecord, Timestamp};

// Builds the next snapshot from (record, status) pairs in catalog order
pub fn merge(
    probed: Vec<(LinkRecord, LinkStatus)>,
    previous: &HistorySnapshot,
    run_at: Timestamp,
    is_auto: bool,
) -> HistorySnapshot {
    // First non-OK entry per URL wins, like a front-to-back search would
    let mut broken_since: HashMap<&str, Option<Timestamp>> = HashMap::new();
    for old in previous.results.iter().filter(|r| !r.status.is_ok()) {
        broken_since.entry(old.url.as_str()).or_insert(old.first_broken);
    }

    let mut results: Vec<CheckResult> = probed
        .into_iter()
        .map(|(record, status)| {
            let first_broken = if status.is_ok() {
                None
            } else {
                Some(
                    broken_since
                        .get(record.url.as_str())
                        .copied()
                        .flatten()
                        .unwrap_or(run_at),
                )
            };

            CheckResult {
                department: record.department,
                title: record.title,
                lang: record.lang,
                url: record.url,
                status,
                first_broken,
            }
        })
        .collect();

    sort_results(&mut results);

    HistorySnapshot {
        results,
        last_checked: Some(run_at),
        last_auto_refresh: if is_auto {
            Some(run_at)
        } else {
            previous.last_auto_refresh
        },
    }
}

// Stable sort by (status rank, department, title)
pub fn sort_results(results: &mut [CheckResult]) {
    results.sort_by(|a, b| {
        (a.status.rank(), &a.department, &a.title).cmp(&(b.status.rank(), &b.department, &b.title))
    });
}
