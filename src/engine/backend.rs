//! HTTP boundary to the search/answering backend.

use crate::error::JobError;
use crate::model::{Document, JobId, Query, SearchConfig, SearchResult};
use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Classified answer of one status request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Any non-terminal status token, kept verbatim for progress display.
    Running(String),
    Completed(SearchResult),
    Failed(String),
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
    #[serde(default)]
    result: Option<ResultBody>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ResultBody {
    #[serde(default)]
    documents: Option<Vec<Document>>,
    #[serde(default)]
    all_documents: Option<Vec<Document>>,
    #[serde(default, deserialize_with = "crate::model::non_empty_string")]
    llm_answer: Option<String>,
}

impl From<ResultBody> for SearchResult {
    fn from(body: ResultBody) -> Self {
        Self {
            top_documents: body.documents.unwrap_or_default(),
            all_documents: body.all_documents.unwrap_or_default(),
            answer: body.llm_answer,
        }
    }
}

impl StatusBody {
    fn classify(self) -> PollOutcome {
        match self.status.as_str() {
            "completed" => PollOutcome::Completed(self.result.map(Into::into).unwrap_or_default()),
            "failed" => PollOutcome::Failed(
                self.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "job failed".to_string()),
            ),
            _ => PollOutcome::Running(self.status),
        }
    }
}

pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    submit_path: String,
    status_path: String,
}

impl BackendClient {
    pub fn new(cfg: &SearchConfig) -> Result<Self> {
        let base = Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid base url {:?}", cfg.base_url))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("base url {:?} cannot carry a path", cfg.base_url);
        }

        let mut builder = reqwest::Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build http client")?;

        Ok(Self {
            http,
            base,
            submit_path: cfg.submit_path.clone(),
            status_path: cfg.status_path.clone(),
        })
    }

    pub fn submit_url(&self) -> Url {
        join_path(&self.base, &self.submit_path, None)
    }

    pub fn status_url(&self, job_id: &JobId) -> Url {
        join_path(&self.base, &self.status_path, Some(job_id))
    }

    /// Create a job for `query` and return the identifier the backend assigned.
    pub async fn submit(&self, query: &Query) -> Result<JobId, JobError> {
        let url = self.submit_url();
        tracing::debug!(%url, query = %query, "submitting query");

        let resp = self
            .http
            .post(url)
            .json(&SubmitBody {
                query: query.as_str(),
            })
            .send()
            .await
            .map_err(|e| JobError::SubmissionTransport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::SubmissionTransport {
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| JobError::SubmissionTransport {
                status: Some(status.as_u16()),
                message: e.to_string(),
            })?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| JobError::SubmissionProtocol(format!("malformed body: {e}")))?;

        let job_id = value
            .get("job_id")
            .and_then(JobId::from_json)
            .ok_or_else(|| JobError::SubmissionProtocol("missing job_id".into()))?;
        tracing::debug!(%job_id, "job accepted");
        Ok(job_id)
    }

    /// Ask the backend where `job_id` stands.
    pub async fn status(&self, job_id: &JobId) -> Result<PollOutcome, JobError> {
        let url = self.status_url(job_id);
        let poll_err = |message: String| JobError::PollTransport {
            job_id: job_id.clone(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| poll_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(poll_err(format!("HTTP {status}")));
        }

        let body = resp.bytes().await.map_err(|e| poll_err(e.to_string()))?;
        let parsed: StatusBody = serde_json::from_slice(&body)
            .map_err(|e| poll_err(format!("malformed status body: {e}")))?;
        Ok(parsed.classify())
    }
}

/// Append the segments of `path` to `base`. A `{job_id}` segment is replaced by the
/// percent-encoded identifier.
fn join_path(base: &Url, path: &str, job_id: Option<&JobId>) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match job_id {
                Some(id) if part == JOB_ID_PLACEHOLDER => segments.push(id.as_str()),
                _ => segments.push(part),
            };
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        let cfg = SearchConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        BackendClient::new(&cfg).expect("client")
    }

    fn query(s: &str) -> Query {
        Query::parse(s).unwrap()
    }

    #[test]
    fn status_path_substitutes_and_encodes_job_id() {
        let cfg = SearchConfig {
            base_url: "http://localhost:8000/api/".into(),
            ..Default::default()
        };
        let client = BackendClient::new(&cfg).unwrap();
        assert_eq!(
            client.status_url(&JobId::new("a b/c")).as_str(),
            "http://localhost:8000/api/status/a%20b%2Fc"
        );
        assert_eq!(client.submit_url().as_str(), "http://localhost:8000/api/search");
    }

    #[test]
    fn rejects_unusable_base_url() {
        let cfg = SearchConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(BackendClient::new(&cfg).is_err());
    }

    #[tokio::test]
    async fn submit_sends_query_and_returns_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(json!({"query": "rust ownership"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "j-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .submit(&query("  rust ownership "))
            .await
            .expect("submit ok");
        assert_eq!(id, JobId::new("j-1"));
    }

    #[tokio::test]
    async fn submit_http_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server).submit(&query("q")).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::SubmissionTransport {
                status: Some(500),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn submit_without_job_id_is_protocol_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "j-1"})))
            .mount(&server)
            .await;
        let err = client_for(&server).submit(&query("q")).await.unwrap_err();
        assert!(matches!(err, JobError::SubmissionProtocol(_)));
    }

    #[tokio::test]
    async fn submit_malformed_body_is_protocol_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        let err = client_for(&server).submit(&query("q")).await.unwrap_err();
        assert!(matches!(err, JobError::SubmissionProtocol(_)));
    }

    #[tokio::test]
    async fn status_classifies_terminal_and_running_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status/bad"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "failed", "error": "timeout upstream"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status/done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "result": {
                    "documents": [{"title": "A", "url": "http://a", "content": "c1"}],
                    "all_documents": [
                        {"Title": "A", "url": "http://a", "content": "c1"},
                        {"Title": "B", "Url": "http://b", "content": "c2"}
                    ],
                    "llm_answer": "42"
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.status(&JobId::new("run")).await.unwrap(),
            PollOutcome::Running("running".into())
        );
        assert_eq!(
            client.status(&JobId::new("bad")).await.unwrap(),
            PollOutcome::Failed("timeout upstream".into())
        );

        let PollOutcome::Completed(result) = client.status(&JobId::new("done")).await.unwrap()
        else {
            panic!("expected completed");
        };
        assert_eq!(result.answer.as_deref(), Some("42"));
        assert_eq!(result.top_documents.len(), 1);
        assert_eq!(result.all_documents.len(), 2);
        assert_eq!(result.all_documents[0], result.top_documents[0]);
        assert_eq!(result.all_documents[1].url.as_deref(), Some("http://b"));
    }

    #[tokio::test]
    async fn failed_without_description_gets_a_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
            .mount(&server)
            .await;
        assert_eq!(
            client_for(&server).status(&JobId::new("x")).await.unwrap(),
            PollOutcome::Failed("job failed".into())
        );
    }

    #[tokio::test]
    async fn status_errors_are_poll_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/status/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "done"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        for id in ["gone", "garbled"] {
            let err = client.status(&JobId::new(id)).await.unwrap_err();
            match err {
                JobError::PollTransport { job_id, .. } => assert_eq!(job_id, JobId::new(id)),
                other => panic!("unexpected error {other:?}"),
            }
        }
    }
}
