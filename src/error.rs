use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{OutputKind, Task, TaskStatus};

/// Represents the possible errors that can occur when using the Tripo3D client.
#[derive(Debug, thiserror::Error)]
pub enum TripoError {
    /// No API key was supplied, either directly or via `TRIPO_API_KEY`.
    #[error("API key is missing. Please provide it or set the TRIPO_API_KEY environment variable.")]
    MissingApiKey,
    /// The service rejected the credential.
    #[error("Authentication rejected (status {status}): {message}")]
    Authentication { status: u16, message: String },
    /// A transient network failure persisted through every retry.
    #[error("Transport failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    /// A request failed in a way that retrying would not fix.
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    /// The service answered with an error status or a non-zero result code.
    #[error("API request failed (status {status}): {message}")]
    ApiError {
        status: u16,
        code: Option<i64>,
        message: String,
        suggestion: Option<String>,
    },
    /// A precondition on the caller's input did not hold. Raised before any
    /// network traffic.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("The session has been closed")]
    SessionClosed,
    /// The operation was cancelled through its cancellation token.
    #[error("Operation on task {task_id} was cancelled")]
    Cancelled { task_id: String },
    /// The task did not reach a terminal state in time.
    #[error("Task {task_id} did not finish within {elapsed:?}")]
    TaskTimeout {
        task_id: String,
        elapsed: Duration,
        last: Option<Box<Task>>,
    },
    /// Too many consecutive status checks failed at the transport level.
    #[error("Polling task {task_id} failed {failures} time(s) in a row: {source}")]
    TaskPolling {
        task_id: String,
        failures: u32,
        last: Option<Box<Task>>,
        #[source]
        source: Box<TripoError>,
    },
    #[error("Task {task_id} is {status}, expected {expected}")]
    InvalidTaskState {
        task_id: String,
        status: TaskStatus,
        expected: TaskStatus,
    },
    /// Every requested animation name was outside the known preset set.
    #[error("No valid animation in request (rejected: {rejected:?})")]
    NoValidAnimation { rejected: Vec<String> },
    /// Some artifacts could not be fetched and partial results were not allowed.
    #[error("Downloaded {} of {} artifact(s) for task {task_id}", .downloaded.len(), .downloaded.len() + .failed.len())]
    PartialDownload {
        task_id: String,
        downloaded: BTreeMap<OutputKind, PathBuf>,
        failed: BTreeMap<OutputKind, TripoError>,
    },
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TripoError {
    /// Whether this error is a transport failure that outlived its retries.
    pub fn is_transport(&self) -> bool {
        matches!(self, TripoError::Transport { .. })
    }

    /// The last task snapshot observed before polling gave up, if any.
    pub fn last_task(&self) -> Option<&Task> {
        match self {
            TripoError::TaskTimeout { last, .. } | TripoError::TaskPolling { last, .. } => {
                last.as_deref()
            }
            _ => None,
        }
    }
}
