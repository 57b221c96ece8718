//! Text summary builder for CLI output.
//!
//! Formats human-readable lines for completed searches, lifecycle transitions
//! and history listings.

use crate::model::{Document, JobState, SearchRecord, Snapshot};

/// Longest document excerpt printed in text mode, in characters.
const EXCERPT_CHARS: usize = 240;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(record: &SearchRecord) -> TextSummary {
    let mut lines = vec![format!("Showing results for: {}", record.query)];

    if let Some(answer) = record.result.answer.as_deref() {
        lines.push(String::new());
        lines.push("Answer:".to_string());
        lines.push(format!("  {answer}"));
    }

    let top = &record.result.top_documents;
    lines.push(String::new());
    push_documents(&mut lines, &format!("Top {} Results", top.len()), top);
    lines.push(String::new());
    push_documents(&mut lines, "All Results", &record.result.all_documents);

    TextSummary { lines }
}

fn push_documents(lines: &mut Vec<String>, heading: &str, docs: &[Document]) {
    lines.push(format!("{heading}:"));
    if docs.is_empty() {
        lines.push("  No results yet".to_string());
        return;
    }
    for (i, doc) in docs.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, doc.title.as_deref().unwrap_or("No Title")));
        let content = doc.content.trim();
        if !content.is_empty() {
            lines.push(format!("     {}", excerpt(content)));
        }
        if let Some(url) = doc.url.as_deref() {
            lines.push(format!("     {url}"));
        }
    }
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// One progress line for a lifecycle transition.
pub(crate) fn status_line(snapshot: &Snapshot) -> String {
    let query = snapshot.query.as_deref().unwrap_or("");
    let tag = format!("[#{}]", snapshot.ticket);
    match snapshot.state {
        JobState::Idle => format!("{tag} idle"),
        JobState::Submitting => format!("{tag} Submitting: {query}"),
        JobState::Polling => match snapshot.job_id.as_ref() {
            Some(job_id) => format!("{tag} Searching (job {job_id})..."),
            None => format!("{tag} Searching..."),
        },
        JobState::Completed => format!("{tag} Completed"),
        JobState::Failed => format!(
            "{tag} Failed: {}",
            snapshot
                .error_description()
                .unwrap_or_else(|| "unknown error".into())
        ),
    }
}

pub(crate) fn history_line(record: &SearchRecord) -> String {
    format!(
        "{}  {}  ({} results, {:.1}s)",
        record.timestamp_utc,
        record.query,
        record.result.all_documents.len(),
        record.elapsed_ms as f64 / 1000.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::model::{JobId, SearchResult};
    use pretty_assertions::assert_eq;

    fn doc(title: Option<&str>, url: Option<&str>, content: &str) -> Document {
        Document {
            title: title.map(Into::into),
            url: url.map(Into::into),
            content: content.into(),
        }
    }

    fn record(result: SearchResult) -> SearchRecord {
        SearchRecord {
            timestamp_utc: "2026-10-16T09:00:00.000Z".into(),
            search_id: "1".into(),
            base_url: "http://127.0.0.1:8000".into(),
            query: "rust ownership".into(),
            job_id: JobId::new("j-1"),
            polls: 2,
            elapsed_ms: 3300,
            result,
        }
    }

    #[test]
    fn summary_lists_answer_and_documents() {
        let a = doc(Some("A"), Some("http://a"), "c1");
        let rec = record(SearchResult {
            top_documents: vec![a.clone()],
            all_documents: vec![a, doc(None, None, "c2")],
            answer: Some("42".into()),
        });

        let lines = build_text_summary(&rec).lines;
        assert_eq!(
            lines,
            vec![
                "Showing results for: rust ownership",
                "",
                "Answer:",
                "  42",
                "",
                "Top 1 Results:",
                "  1. A",
                "     c1",
                "     http://a",
                "",
                "All Results:",
                "  1. A",
                "     c1",
                "     http://a",
                "  2. No Title",
                "     c2",
            ]
        );
    }

    #[test]
    fn empty_bundle_says_no_results() {
        let lines = build_text_summary(&record(SearchResult::default())).lines;
        assert_eq!(lines.iter().filter(|l| *l == "  No results yet").count(), 2);
        assert!(!lines.iter().any(|l| l == "Answer:"));
    }

    #[test]
    fn long_content_is_cut() {
        let long = "word ".repeat(200);
        let out = excerpt(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn failed_status_line_carries_description() {
        let snap = Snapshot {
            ticket: 2,
            state: JobState::Failed,
            query: Some("q".into()),
            error: Some(JobError::BackendJobFailure("timeout upstream".into())),
            ..Default::default()
        };
        assert_eq!(status_line(&snap), "[#2] Failed: timeout upstream");
    }

    #[test]
    fn history_line_shows_query_and_counts() {
        let rec = record(SearchResult {
            all_documents: vec![doc(Some("A"), None, "")],
            ..Default::default()
        });
        assert_eq!(
            history_line(&rec),
            "2026-10-16T09:00:00.000Z  rust ownership  (1 results, 3.3s)"
        );
    }
}
