//! Post-search processing utilities.
//!
//! Turns a completed snapshot into a history record, then handles auto-save and
//! exports after a search completes.

use crate::cli::Cli;
use crate::model::{JobState, SearchConfig, SearchRecord, Snapshot};
use crate::storage;
use rand::RngCore;
use std::time::Duration;
use time::macros::format_description;
use time::OffsetDateTime;

/// Result of post-search processing, ready for presentation layers.
pub(crate) struct ProcessedSearch {
    pub messages: Vec<String>,
}

fn gen_search_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Fixed-width UTC timestamp, so saved file names sort chronologically.
fn timestamp_utc(now: OffsetDateTime) -> String {
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
    .unwrap_or_else(|_| "now".into())
}

/// Build the history record for a completed snapshot. Anything else yields `None`.
pub(crate) fn build_record(
    cfg: &SearchConfig,
    snapshot: &Snapshot,
    polls: u32,
    elapsed: Duration,
) -> Option<SearchRecord> {
    if snapshot.state != JobState::Completed {
        return None;
    }
    Some(SearchRecord {
        timestamp_utc: timestamp_utc(OffsetDateTime::now_utc()),
        search_id: gen_search_id(),
        base_url: cfg.base_url.clone(),
        query: snapshot.query.clone()?,
        job_id: snapshot.job_id.clone()?,
        polls,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        result: snapshot.result.clone()?,
    })
}

/// Auto-save and export a completed search. Failures become messages; the search
/// itself still counts as completed.
pub(crate) fn process_completion(
    args: &Cli,
    record: &SearchRecord,
    auto_save: bool,
) -> ProcessedSearch {
    let mut messages = Vec::new();

    if auto_save {
        match storage::save_record(record) {
            Ok(path) => messages.push(format!("Saved: {}", path.display())),
            Err(e) => messages.push(format!("Save failed: {e:#}")),
        }
    }

    if let Some(export_path) = args.export_json.as_deref() {
        match storage::export_json(export_path, record) {
            Ok(_) => messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedSearch { messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobId, SearchResult};
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn completed_snapshot() -> Snapshot {
        Snapshot {
            ticket: 1,
            state: JobState::Completed,
            query: Some("rust ownership".into()),
            job_id: Some(JobId::new("j-1")),
            result: Some(SearchResult {
                answer: Some("42".into()),
                ..Default::default()
            }),
            error: None,
        }
    }

    #[test]
    fn timestamps_are_fixed_width() {
        assert_eq!(
            timestamp_utc(datetime!(2026-10-16 09:05:03.5 UTC)),
            "2026-10-16T09:05:03.500Z"
        );
        assert_eq!(
            timestamp_utc(datetime!(2026-01-02 00:00:00 UTC)),
            "2026-01-02T00:00:00.000Z"
        );
    }

    #[test]
    fn record_copies_completed_snapshot() {
        let cfg = SearchConfig::default();
        let rec = build_record(&cfg, &completed_snapshot(), 3, Duration::from_millis(6100))
            .expect("record");
        assert_eq!(rec.query, "rust ownership");
        assert_eq!(rec.job_id, JobId::new("j-1"));
        assert_eq!(rec.polls, 3);
        assert_eq!(rec.elapsed_ms, 6100);
        assert_eq!(rec.base_url, cfg.base_url);
        assert_eq!(rec.result.answer.as_deref(), Some("42"));
        assert!(!rec.search_id.is_empty());
    }

    #[test]
    fn only_completed_snapshots_become_records() {
        let cfg = SearchConfig::default();
        let failed = Snapshot {
            state: JobState::Failed,
            ..completed_snapshot()
        };
        assert!(build_record(&cfg, &failed, 1, Duration::ZERO).is_none());
        assert!(build_record(&cfg, &Snapshot::default(), 0, Duration::ZERO).is_none());
    }

    #[test]
    fn export_without_auto_save() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("answer.json");
        let args = Cli::parse_from(["neurasearch", "--export-json", out.to_str().unwrap(), "q"]);
        let rec = build_record(
            &SearchConfig::default(),
            &completed_snapshot(),
            1,
            Duration::ZERO,
        )
        .unwrap();

        let processed = process_completion(&args, &rec, false);
        assert_eq!(
            processed.messages,
            vec![format!("Exported JSON: {}", out.display())]
        );
        assert!(out.exists());
    }
}
