//! Fetching the artifacts of a finished task to local files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::future::join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::TripoClient;
use crate::error::TripoError;
use crate::types::{OutputKind, Task, TaskStatus};

/// Options for [`TripoClient::download_task_models`].
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Only fetch these kinds; `None` fetches everything the task produced.
    pub kinds: Option<Vec<OutputKind>>,
    /// Return whatever could be fetched instead of failing with
    /// `TripoError::PartialDownload`.
    pub allow_partial: bool,
    pub cancel: Option<CancellationToken>,
}

impl DownloadOptions {
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = OutputKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of [`TripoClient::download_task_models`].
#[derive(Debug, Default)]
pub struct ArtifactDownloads {
    /// Local path per kind; `None` when the kind was not produced or its fetch
    /// failed.
    pub files: BTreeMap<OutputKind, Option<PathBuf>>,
    /// Why each failed kind failed.
    pub errors: BTreeMap<OutputKind, TripoError>,
}

impl ArtifactDownloads {
    pub fn path(&self, kind: OutputKind) -> Option<&Path> {
        self.files.get(&kind).and_then(|p| p.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `<task_id>_<kind>.<ext>`, stable for a given task and kind so repeated
/// downloads overwrite.
///
/// `ext` comes from the artifact URL's path (lowercased, query ignored) so a
/// rig exported as FBX keeps its `.fbx` suffix; URLs without a usable one fall
/// back to `glb` for models and `webp` for images. The name therefore changes
/// only if the service starts serving the same artifact in a different
/// format. Characters outside `[A-Za-z0-9_-]` in the task id become `_`;
/// service task ids are UUIDs and pass through unchanged.
pub fn artifact_file_name(task_id: &str, kind: OutputKind, url: &str) -> String {
    let safe_id: String = task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let extension = Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| kind.default_extension().to_string());

    format!("{}_{}.{}", safe_id, kind, extension)
}

impl TripoClient {
    /// Downloads the artifacts of a successful task into `destination_dir`.
    ///
    /// Artifacts are fetched concurrently. The directory must already exist.
    ///
    /// # Errors
    ///
    /// - `TripoError::InvalidTaskState` unless the task succeeded.
    /// - `TripoError::PartialDownload` if any fetch failed and
    ///   `options.allow_partial` is off.
    /// - `TripoError::Cancelled` if the cancellation token fires.
    pub async fn download_task_models<P: AsRef<Path>>(
        &self,
        task: &Task,
        destination_dir: P,
        options: &DownloadOptions,
    ) -> Result<ArtifactDownloads, TripoError> {
        if task.status != TaskStatus::Success {
            return Err(TripoError::InvalidTaskState {
                task_id: task.task_id.clone(),
                status: task.status,
                expected: TaskStatus::Success,
            });
        }

        let dest_dir = destination_dir.as_ref();
        let artifacts = task
            .output
            .as_ref()
            .map(|o| &o.artifacts)
            .cloned()
            .unwrap_or_default();

        let mut result = ArtifactDownloads::default();
        let mut wanted: Vec<(OutputKind, String)> = Vec::new();
        match &options.kinds {
            Some(kinds) => {
                for kind in kinds {
                    match artifacts.get(kind) {
                        Some(url) => wanted.push((*kind, url.clone())),
                        None => {
                            result.files.insert(*kind, None);
                        }
                    }
                }
            }
            None => wanted.extend(artifacts),
        }

        let fetches = join_all(
            wanted
                .iter()
                .map(|(kind, url)| self.download_artifact(&task.task_id, *kind, url, dest_dir)),
        );
        let outcomes = match &options.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    return Err(TripoError::Cancelled { task_id: task.task_id.clone() });
                }
                outcomes = fetches => outcomes,
            },
            None => fetches.await,
        };

        for ((kind, _), outcome) in wanted.into_iter().zip(outcomes) {
            match outcome {
                Ok(path) => {
                    result.files.insert(kind, Some(path));
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.task_id, %kind, error = %e, "artifact download failed");
                    result.files.insert(kind, None);
                    result.errors.insert(kind, e);
                }
            }
        }

        if result.errors.is_empty() || options.allow_partial {
            return Ok(result);
        }

        let downloaded = result
            .files
            .into_iter()
            .filter_map(|(kind, path)| path.map(|p| (kind, p)))
            .collect();
        Err(TripoError::PartialDownload {
            task_id: task.task_id.clone(),
            downloaded,
            failed: result.errors,
        })
    }

    async fn download_artifact(
        &self,
        task_id: &str,
        kind: OutputKind,
        url: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, TripoError> {
        let file_path = dest_dir.join(artifact_file_name(task_id, kind, url));
        let content = self.session().fetch(url).await?;

        // Write next to the target and rename so a re-download replaces the
        // file in one step.
        let mut partial = file_path.clone().into_os_string();
        partial.push(".part");
        let mut staged = StagedFile {
            path: PathBuf::from(partial),
            keep: false,
        };

        let mut file = fs::File::create(&staged.path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&staged.path, &file_path).await?;
        staged.keep = true;

        tracing::info!(task_id, %kind, path = %file_path.display(), bytes = content.len(), "artifact downloaded");
        Ok(file_path)
    }
}

/// A `.part` file that is removed on drop unless it was renamed into place,
/// so failed or cancelled downloads leave nothing behind.
struct StagedFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
