//! Search history on disk.

use crate::model::SearchRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub fn history_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().context("no local data directory on this platform")?;
    Ok(base.join("neurasearch-cli").join("history"))
}

/// File name for a record: timestamp first so names sort chronologically.
fn record_file_name(record: &SearchRecord) -> String {
    format!(
        "search-{}-{}.json",
        record.timestamp_utc.replace(':', "-").replace('T', "_"),
        &record.search_id[..8.min(record.search_id.len())]
    )
}

pub fn save_record(record: &SearchRecord) -> Result<PathBuf> {
    save_record_in(&history_dir()?, record)
}

pub fn save_record_in(dir: &Path, record: &SearchRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(record_file_name(record));
    write_json(&path, record)?;
    tracing::debug!(path = %path.display(), "saved search record");
    Ok(path)
}

pub fn load_recent(limit: usize) -> Result<Vec<SearchRecord>> {
    load_recent_in(&history_dir()?, limit)
}

/// Newest first. Files that fail to read or parse are skipped.
pub fn load_recent_in(dir: &Path, limit: usize) -> Result<Vec<SearchRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    paths.reverse();

    let mut records = Vec::new();
    for path in paths {
        if records.len() >= limit {
            break;
        }
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(path = %path.display(), "skipping history file: {e:#}"),
        }
    }
    Ok(records)
}

fn read_record(path: &Path) -> Result<SearchRecord> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))
}

/// Write `record` as pretty JSON to a user-chosen path, creating parent directories.
pub fn export_json(path: &Path, record: &SearchRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    write_json(path, record)
}

fn write_json(path: &Path, record: &SearchRecord) -> Result<()> {
    let body = serde_json::to_vec_pretty(record).context("serialize search record")?;
    std::fs::write(path, body).with_context(|| format!("write {}", path.display()))
}
