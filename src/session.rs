//! The authenticated transport session.
//!
//! [`Session`] owns the HTTP client for one logical client scope. Every
//! request the crate makes, API calls and artifact fetches alike, goes through
//! it, so this is where the bearer header, the per-call timeout and the
//! transient-failure retry loop live. The bearer header is attached to API
//! calls only; artifact URLs point at storage hosts and are fetched without it.

use std::future::Future;
use std::sync::{Arc, RwLock};

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{multipart, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use url::Url;

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::TripoError;

/// Body of a request sent through [`Session::invoke`].
///
/// Payloads are cloned for every attempt so a retried request is identical to
/// the first one.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Json(Value),
    /// A single multipart `file` field.
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime_type: String,
    },
}

impl Payload {
    fn apply(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, reqwest::Error> {
        Ok(match self {
            Payload::Empty => request,
            Payload::Json(body) => request.json(body),
            Payload::File {
                bytes,
                file_name,
                mime_type,
            } => {
                let part = multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime_type)?;
                request.multipart(multipart::Form::new().part("file", part))
            }
        })
    }
}

/// The service wraps every answer as `{"code": 0, "data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    suggestion: Option<String>,
}

/// One authenticated connection context to the Tripo3D API.
///
/// Clones share the same underlying session; closing any clone closes all of
/// them.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    http: RwLock<Option<reqwest::Client>>,
    auth: HeaderValue,
    base_url: Url,
    retry: RetryPolicy,
}

impl Session {
    /// Establishes a session from `config`.
    ///
    /// # Errors
    ///
    /// - `TripoError::MissingApiKey` if neither `config.api_key` nor
    ///   `TRIPO_API_KEY` provides a credential.
    /// - `TripoError::UrlParseFailed` if the base URL is invalid.
    pub fn open(config: &ClientConfig) -> Result<Self, TripoError> {
        let api_key = config.resolve_api_key().ok_or(TripoError::MissingApiKey)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
            TripoError::InvalidArgument("API key contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // `Url::join` drops the last segment unless the base ends with '/'.
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        tracing::debug!(base_url = %base_url, "session opened");
        Ok(Self {
            inner: Arc::new(SessionInner {
                http: RwLock::new(Some(client)),
                auth,
                base_url,
                retry: config.retry.clone(),
            }),
        })
    }

    /// Releases the HTTP client and its pooled connections. Safe to call any
    /// number of times.
    pub fn close(&self) {
        let previous = self
            .inner
            .http
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if previous.is_some() {
            tracing::debug!("session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .http
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn http(&self) -> Result<reqwest::Client, TripoError> {
        self.inner
            .http
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(TripoError::SessionClosed)
    }

    /// Sends one request to the API and returns the `data` member of the
    /// response envelope.
    ///
    /// `path` is relative to the base URL, e.g. `v2/openapi/task`. Transient
    /// transport failures are retried according to the session's
    /// [`RetryPolicy`].
    ///
    /// # Errors
    ///
    /// - `TripoError::Transport` once retries are exhausted.
    /// - `TripoError::Authentication` on 401/403.
    /// - `TripoError::ApiError` on any other error status or non-zero code.
    /// - `TripoError::SessionClosed` after [`Session::close`].
    pub async fn invoke(&self, method: Method, path: &str, payload: Payload) -> Result<Value, TripoError> {
        let url = self.inner.base_url.join(path.trim_start_matches('/'))?;
        tracing::debug!(%method, %url, "invoking API");

        let (status, body) = self
            .with_retries(path, |client| {
                let request = payload.apply(
                    client
                        .request(method.clone(), url.clone())
                        .header(AUTHORIZATION, self.inner.auth.clone()),
                );
                async move {
                    let response = request?.send().await?;
                    let status = response.status();
                    let body = response.bytes().await?;
                    Ok::<_, reqwest::Error>((status, body.to_vec()))
                }
            })
            .await?;

        decode_envelope(status, &body)
    }

    /// [`Session::invoke`] followed by decoding the data into `T`.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<T, TripoError> {
        let data = self.invoke(method, path, payload).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Downloads the body behind an absolute URL under the same retry policy.
    ///
    /// No credential is sent: artifact URLs are presigned and may live on a
    /// different host than the API.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, TripoError> {
        let url = Url::parse(url)?;
        let (status, body) = self
            .with_retries(url.path(), |client| {
                let request = client.get(url.clone());
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    let body = response.bytes().await?;
                    Ok::<_, reqwest::Error>((status, body.to_vec()))
                }
            })
            .await?;

        if !status.is_success() {
            return Err(TripoError::ApiError {
                status: status.as_u16(),
                code: None,
                message: format!("Failed to download file: status {}", status),
                suggestion: None,
            });
        }
        Ok(body)
    }

    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TripoError>
    where
        F: FnMut(reqwest::Client) -> Fut,
        Fut: Future<Output = Result<T, reqwest::Error>>,
    {
        let policy = &self.inner.retry;
        let mut delay = policy.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let client = self.http()?;
            match op(client).await {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt <= policy.max_retries => {
                    tracing::warn!(
                        target_path = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient transport failure, retrying",
                    );
                    sleep(delay).await;
                    delay = policy.next_delay(delay);
                }
                Err(e) if is_transient(&e) => {
                    return Err(TripoError::Transport {
                        attempts: attempt,
                        source: e,
                    })
                }
                Err(e) => return Err(TripoError::RequestFailed(e)),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.inner.base_url.as_str())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Connection resets, connect failures and timeouts.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || (e.is_request() && !e.is_builder())
}

fn decode_envelope(status: StatusCode, body: &[u8]) -> Result<Value, TripoError> {
    let envelope = serde_json::from_slice::<Envelope>(body);

    if !status.is_success() {
        let (code, message, suggestion) = match envelope {
            Ok(env) => (Some(env.code), env.message, env.suggestion),
            Err(_) => (None, None, None),
        };
        let message = message.unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TripoError::Authentication {
                status: status.as_u16(),
                message,
            });
        }
        return Err(TripoError::ApiError {
            status: status.as_u16(),
            code,
            message,
            suggestion,
        });
    }

    let envelope = envelope?;
    if envelope.code != 0 {
        return Err(TripoError::ApiError {
            status: status.as_u16(),
            code: Some(envelope.code),
            message: envelope.message.unwrap_or_default(),
            suggestion: envelope.suggestion,
        });
    }
    Ok(envelope.data.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_without_code_is_success() {
        let body = serde_json::to_vec(&json!({ "data": { "task_id": "t" } })).unwrap();
        let data = decode_envelope(StatusCode::OK, &body).unwrap();
        assert_eq!(data["task_id"], "t");
    }

    #[test]
    fn non_zero_code_is_api_error() {
        let body = serde_json::to_vec(&json!({
            "code": 2010,
            "message": "insufficient credit",
            "suggestion": "top up"
        }))
        .unwrap();
        match decode_envelope(StatusCode::OK, &body) {
            Err(TripoError::ApiError { code, suggestion, .. }) => {
                assert_eq!(code, Some(2010));
                assert_eq!(suggestion.as_deref(), Some("top up"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unauthorized_maps_to_authentication() {
        let err = decode_envelope(StatusCode::UNAUTHORIZED, b"nope").unwrap_err();
        assert!(matches!(err, TripoError::Authentication { status: 401, .. }));
    }
}
