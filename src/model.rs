use crate::error::JobError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    pub submit_path: String,
    /// Path template for the status endpoint; `{job_id}` is replaced by the job identifier.
    pub status_path: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default, with = "humantime_serde")]
    pub poll_timeout: Option<Duration>,
    #[serde(default)]
    pub max_polls: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            submit_path: "/search".into(),
            status_path: "/status/{job_id}".into(),
            poll_interval: Duration::from_secs(3),
            poll_timeout: Some(Duration::from_secs(600)),
            max_polls: None,
            request_timeout: None,
            user_agent: format!("neurasearch-cli/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A user query, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque job identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accept a string or numeric identifier; anything else is unusable.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One retrieved document. The backend is inconsistent about key casing
/// (`title` vs `Title`, `url` vs `Url`); both are accepted on input and the
/// lowercase form is always written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DocumentFields")]
pub struct Document {
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: String,
}

#[derive(Deserialize)]
struct DocumentFields {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "Title")]
    title_upper: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "Url")]
    url_upper: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn first_present(a: Option<String>, b: Option<String>) -> Option<String> {
    a.filter(|s| !s.is_empty()).or(b.filter(|s| !s.is_empty()))
}

impl From<DocumentFields> for Document {
    fn from(raw: DocumentFields) -> Self {
        Self {
            title: first_present(raw.title, raw.title_upper),
            url: first_present(raw.url, raw.url_upper),
            content: raw.content.unwrap_or_default(),
        }
    }
}

/// Payload of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub top_documents: Vec<Document>,
    #[serde(default)]
    pub all_documents: Vec<Document>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub answer: Option<String>,
}

pub(crate) fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Controller lifecycle state as observed by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Submitting => "submitting",
            JobState::Polling => "polling",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything the presentation layer needs to render the current query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Local sequence number of the submission this snapshot describes (0 before any submit).
    pub ticket: u64,
    pub state: JobState,
    pub query: Option<String>,
    pub job_id: Option<JobId>,
    pub result: Option<SearchResult>,
    pub error: Option<JobError>,
}

impl Snapshot {
    pub fn error_description(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum SearchEvent {
    StateChanged(
        // Boxed: a completed snapshot carries the whole document bundle.
        Box<Snapshot>,
    ),
    PollTick {
        ticket: u64,
        job_id: JobId,
        attempt: u32,
        status: String,
    },
    Info(InfoEvent),
}

/// Human-readable notices emitted by the controller and consumed by CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Superseded { ticket: u64 },
    StaleIgnored { ticket: u64 },
}

impl InfoEvent {
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Superseded { ticket } => {
                format!("Query #{ticket} superseded by a newer query")
            }
            InfoEvent::StaleIgnored { ticket } => {
                format!("Ignored a late response for query #{ticket}")
            }
        }
    }
}

/// A completed search as saved to history and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    #[serde(default)]
    pub timestamp_utc: String,
    pub search_id: String,
    pub base_url: String,
    pub query: String,
    pub job_id: JobId,
    #[serde(default)]
    pub polls: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
    pub result: SearchResult,
}
