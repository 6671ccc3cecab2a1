use std::future::Future;
use std::path::Path;

use reqwest::Method;
use tokio::fs;

use crate::config::{ClientConfig, DEFAULT_API_URL};
use crate::error::TripoError;
use crate::session::{Payload, Session};
use crate::types::{Balance, Task, UploadData};

pub(crate) const TASK_PATH: &str = "v2/openapi/task";
const UPLOAD_PATH: &str = "v2/openapi/upload/sts";
const BALANCE_PATH: &str = "v2/openapi/user/balance";

/// The main client for interacting with the Tripo3D API.
///
/// It owns one [`Session`]; clones share that session and are safe to use
/// from several tasks of the same logical client.
#[derive(Clone, Debug)]
pub struct TripoClient {
    session: Session,
}

/// Closes the session when dropped, whichever way the scope ends.
struct CloseOnDrop(Session);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl TripoClient {
    /// Creates a new `TripoClient`.
    ///
    /// It first checks the `api_key` parameter. If it's `None`, it falls back to
    /// the `TRIPO_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// - `TripoError::MissingApiKey` if the API key is not provided in either way.
    /// - `TripoError::RequestFailed` if the internal HTTP client fails to build.
    pub fn new(api_key: Option<String>) -> Result<Self, TripoError> {
        Self::open(&ClientConfig {
            api_key,
            ..ClientConfig::default()
        })
    }

    /// Creates a new `TripoClient` with a custom base URL.
    ///
    /// This is useful for testing or for connecting to a different API endpoint.
    pub fn new_with_url(api_key: String, base_url: &str) -> Result<Self, TripoError> {
        Self::open(&ClientConfig::with_api_key(api_key).base_url(base_url))
    }

    /// Opens a session with full control over timeouts and retries.
    pub fn open(config: &ClientConfig) -> Result<Self, TripoError> {
        if config.base_url != DEFAULT_API_URL {
            tracing::debug!(base_url = %config.base_url, "using custom API endpoint");
        }
        Ok(Self {
            session: Session::open(config)?,
        })
    }

    /// Releases the session. Later calls fail with `TripoError::SessionClosed`.
    pub fn close(&self) {
        self.session.close();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// The underlying transport session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs `f` with this client and closes the session afterwards.
    ///
    /// The session is closed on every exit path: when `f` returns, fails,
    /// panics, or when the returned future is dropped before completion.
    ///
    /// ```no_run
    /// # use tripo3d_client::TripoClient;
    /// # async fn run() -> Result<(), tripo3d_client::TripoError> {
    /// let balance = TripoClient::new(None)?
    ///     .scope(|client| async move { client.get_balance().await })
    ///     .await?;
    /// println!("balance: {}", balance.balance);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scope<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(TripoClient) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = CloseOnDrop(self.session.clone());
        f(self).await
    }

    /// Retrieves a snapshot of a specific task.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, TripoError> {
        if task_id.trim().is_empty() {
            return Err(TripoError::InvalidArgument("task id must not be empty".into()));
        }
        self.session
            .call(Method::GET, &format!("{}/{}", TASK_PATH, task_id), Payload::Empty)
            .await
    }

    /// Queries the user's current account balance. Never cached.
    pub async fn get_balance(&self) -> Result<Balance, TripoError> {
        self.session
            .call(Method::GET, BALANCE_PATH, Payload::Empty)
            .await
    }

    /// Uploads a local file and returns the file token that task requests can
    /// reference.
    pub async fn upload_file<P: AsRef<Path>>(&self, path: P) -> Result<String, TripoError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TripoError::InvalidArgument(format!(
                    "could not determine file name of {}",
                    path.display()
                ))
            })?
            .to_string();
        let bytes = fs::read(path).await?;
        self.upload_bytes(bytes, &file_name).await
    }

    /// Uploads in-memory file content. The MIME type is guessed from `file_name`.
    pub async fn upload_bytes(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, TripoError> {
        let mime_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();
        tracing::debug!(file_name, size = bytes.len(), %mime_type, "uploading file");

        let data: UploadData = self
            .session
            .call(
                Method::POST,
                UPLOAD_PATH,
                Payload::File {
                    bytes,
                    file_name: file_name.to_string(),
                    mime_type,
                },
            )
            .await?;
        Ok(data.image_token)
    }
}
