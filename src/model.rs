use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub quality: String,
    pub format: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub data_dir: PathBuf,
}

/// Remote-reported lifecycle status of a task.
///
/// Statuses the client does not know about are kept verbatim so they can be
/// displayed as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    Downloading,
    Processing,
    Finished,
    Error,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Processing => "processing",
            TaskStatus::Finished => "finished",
            TaskStatus::Error => "error",
            TaskStatus::Other(raw) => raw,
        }
    }

    /// `finished` and `error` end polling for the active task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Error)
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => TaskStatus::Pending,
            "downloading" => TaskStatus::Downloading,
            "processing" => TaskStatus::Processing,
            "finished" => TaskStatus::Finished,
            "error" => TaskStatus::Error,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: String,
    pub format: String,
}

/// A job accepted by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub task_id: String,
    pub title: Option<String>,
}

/// Progress of a task as last reported by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub percent: Option<f64>,
    /// Bytes per second.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Seconds remaining.
    #[serde(default)]
    pub eta: Option<f64>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Bytes. Accepts integral and floating-point JSON numbers.
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Non-finite or negative sizes read as unknown; fractions are truncated.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

/// Entry of `GET /api/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub task_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
}

/// Durable record of a past submission. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub url: String,
    /// RFC 3339, UTC.
    pub time: String,
    pub status: TaskStatus,
}

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Busy(bool),
    Submitted {
        task_id: String,
        title: Option<String>,
    },
    Progress(ProgressSnapshot),
    Finished(ProgressSnapshot),
    Failed {
        message: String,
    },
    InputReset,
    HistoryUpdated(Vec<HistoryEntry>),
    Info(String),
}
