//! Client for the remote download service.
//!
//! The controller talks to the service through [`TaskService`], so the poll loop can
//! be exercised against a scripted service in tests. [`HttpTaskService`] is the
//! reqwest-backed implementation used by the binary.

use crate::model::{ClientConfig, DownloadRequest, ProgressSnapshot, RemoteTask, Submitted};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    /// The service answered with `ok: false`.
    #[error("{0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid server url: {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    /// The message to show a user: the service's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait TaskService: Send + Sync {
    /// `POST /api/download`
    async fn submit(&self, request: &DownloadRequest) -> Result<Submitted, ApiError>;

    /// `GET /api/progress/{task_id}`
    async fn progress(&self, task_id: &str) -> Result<ProgressSnapshot, ApiError>;

    /// `POST /api/cancel/{task_id}`
    async fn cancel(&self, task_id: &str) -> Result<(), ApiError>;

    /// `GET /api/tasks`, newest first.
    async fn list_tasks(&self) -> Result<Vec<RemoteTask>, ApiError>;
}

/// Every response of the service carries `ok` and, on failure, `error`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressBody {
    #[serde(default)]
    progress: Option<ProgressSnapshot>,
}

#[derive(Debug, Deserialize)]
struct TasksBody {
    #[serde(default)]
    tasks: Vec<RemoteTask>,
}

#[derive(Debug, Deserialize)]
struct EmptyBody {}

pub struct HttpTaskService {
    http: Client,
    base_url: Url,
}

impl HttpTaskService {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {e}", cfg.base_url)))?;
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Read a response body and unwrap its envelope. A non-2xx status or `ok: false`
    /// becomes an error carrying the service's message, or `fallback` without one.
    async fn read_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        let parsed = serde_json::from_str::<Envelope<T>>(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|env| env.error)
                .or_else(|| error_field(&text))
                .unwrap_or_else(|| fallback.to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = parsed.map_err(|e| ApiError::Decode(e.to_string()))?;
        if !envelope.ok {
            return Err(ApiError::Rejected(
                envelope.error.unwrap_or_else(|| fallback.to_string()),
            ));
        }
        Ok(envelope.body)
    }
}

/// Pull `error` out of a body that did not match the expected shape.
fn error_field(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn submit(&self, request: &DownloadRequest) -> Result<Submitted, ApiError> {
        let url = self.endpoint(&["api", "download"])?;
        let resp = self.http.post(url).json(request).send().await?;
        let body: SubmitBody = Self::read_envelope(resp, "Download request failed").await?;
        let task_id = body
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Decode("response is missing task_id".into()))?;
        Ok(Submitted {
            task_id,
            title: body.title,
        })
    }

    async fn progress(&self, task_id: &str) -> Result<ProgressSnapshot, ApiError> {
        let url = self.endpoint(&["api", "progress", task_id])?;
        let resp = self.http.get(url).send().await?;
        let body: ProgressBody = Self::read_envelope(resp, "Failed to fetch progress").await?;
        body.progress
            .ok_or_else(|| ApiError::Decode("response is missing progress".into()))
    }

    async fn cancel(&self, task_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "cancel", task_id])?;
        let resp = self.http.post(url).send().await?;
        let _: EmptyBody = Self::read_envelope(resp, "Cancel request failed").await?;
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<RemoteTask>, ApiError> {
        let url = self.endpoint(&["api", "tasks"])?;
        let resp = self.http.get(url).send().await?;
        let body: TasksBody = Self::read_envelope(resp, "Failed to list tasks").await?;
        Ok(body.tasks)
    }
}
