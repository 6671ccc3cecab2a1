//! Task submission.
//!
//! Every job kind is validated locally, then normalized into one request body
//! and posted to the task endpoint. Local image files are uploaded first and
//! referenced by file token; URLs and tokens pass through untouched.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::client::{TripoClient, TASK_PATH};
use crate::error::TripoError;
use crate::session::Payload;
use crate::types::{Animation, ModelFormat, RigSpec, RigType, TaskResponse};

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("UUID pattern is valid")
});

const IMAGE_TYPES: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Where an input image comes from.
///
/// Exactly one field must be set when the source is submitted; an empty or
/// ambiguous source is rejected before any request is made.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSource {
    /// A local file, uploaded before the task is created.
    pub path: Option<PathBuf>,
    /// A publicly reachable image URL.
    pub url: Option<String>,
    /// A token from an earlier [`TripoClient::upload_file`].
    pub file_token: Option<String>,
}

impl ImageSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn file_token(token: impl Into<String>) -> Self {
        Self {
            file_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Classifies a free-form string: `http(s)://` is a URL, a UUID is a file
    /// token, anything else is a local path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::url(value)
        } else if UUID_RE.is_match(value) {
            Self::file_token(value)
        } else {
            Self::path(value)
        }
    }

    fn resolve(&self, what: &str) -> Result<ResolvedImage, TripoError> {
        let path = self.path.as_ref().filter(|p| !p.as_os_str().is_empty());
        let url = self.url.as_ref().filter(|u| !u.trim().is_empty());
        let token = self.file_token.as_ref().filter(|t| !t.trim().is_empty());

        match (path, url, token) {
            (Some(path), None, None) => {
                if !path.is_file() {
                    return Err(TripoError::InvalidArgument(format!(
                        "{}: image file not found: {}",
                        what,
                        path.display()
                    )));
                }
                Ok(ResolvedImage::Local(path.clone()))
            }
            (None, Some(url), None) => Ok(ResolvedImage::Url(url.clone())),
            (None, None, Some(token)) => Ok(ResolvedImage::Token(token.clone())),
            (None, None, None) => Err(TripoError::InvalidArgument(format!(
                "{}: one of a local path, a URL or a file token is required",
                what
            ))),
            _ => Err(TripoError::InvalidArgument(format!(
                "{}: local path, URL and file token are mutually exclusive",
                what
            ))),
        }
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        Self::path(path)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        Self::path(path)
    }
}

enum ResolvedImage {
    Local(PathBuf),
    Url(String),
    Token(String),
}

/// The four views of a multiview task. At least one must be set.
#[derive(Debug, Clone, Default)]
pub struct MultiviewImages {
    pub front: Option<ImageSource>,
    pub back: Option<ImageSource>,
    pub left: Option<ImageSource>,
    pub right: Option<ImageSource>,
}

/// Describes an input file in a task request.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct FileContent {
    /// The file format, e.g. "png", "jpeg".
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
}

/// Generation knobs shared by the text, image and multiview tasks. Unset
/// fields are left to the service defaults.
#[derive(Serialize, Debug, Default, Clone)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture_seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_size: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quad: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Options for [`TripoClient::rig_model`].
#[derive(Debug, Clone, Default)]
pub struct RigOptions {
    /// Detected by the service when `None`.
    pub rig_type: Option<RigType>,
    pub spec: RigSpec,
    pub out_format: ModelFormat,
}

/// Options for [`TripoClient::retarget_animation`].
#[derive(Debug, Clone)]
pub struct RetargetOptions {
    pub out_format: ModelFormat,
    pub bake_animation: bool,
    pub export_with_geometry: bool,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            out_format: ModelFormat::Glb,
            bake_animation: true,
            export_with_geometry: false,
        }
    }
}

/// The animation names of a retarget request, in order.
///
/// Built from a single name or a sequence; names are validated when the task
/// is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationSelection(pub Vec<String>);

impl From<&str> for AnimationSelection {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for AnimationSelection {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Animation> for AnimationSelection {
    fn from(animation: Animation) -> Self {
        Self(vec![animation.as_str().to_string()])
    }
}

impl From<Vec<Animation>> for AnimationSelection {
    fn from(animations: Vec<Animation>) -> Self {
        Self(animations.iter().map(|a| a.as_str().to_string()).collect())
    }
}

impl From<Vec<String>> for AnimationSelection {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for AnimationSelection {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for AnimationSelection {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| n.to_string()).collect())
    }
}

impl AnimationSelection {
    /// Parses every name, dropping unknown ones with a warning.
    fn validate(&self) -> Result<Vec<Animation>, TripoError> {
        if self.0.is_empty() {
            return Err(TripoError::InvalidArgument(
                "at least one animation is required".into(),
            ));
        }

        let mut valid = Vec::with_capacity(self.0.len());
        let mut rejected = Vec::new();
        for name in &self.0 {
            match name.parse::<Animation>() {
                Ok(animation) => valid.push(animation),
                Err(e) => {
                    tracing::warn!(animation = %name, "{}, skipping", e);
                    rejected.push(name.clone());
                }
            }
        }

        if valid.is_empty() {
            return Err(TripoError::NoValidAnimation { rejected });
        }
        Ok(valid)
    }
}

#[derive(Serialize)]
struct TextToModelRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    #[serde(flatten)]
    options: &'a GenerationOptions,
}

#[derive(Serialize)]
struct ImageToModelRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    file: FileContent,
    #[serde(flatten)]
    options: &'a GenerationOptions,
}

#[derive(Serialize)]
struct MultiviewToModelRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    /// Always four entries: front, left, back, right.
    files: Vec<Option<FileContent>>,
    #[serde(flatten)]
    options: &'a GenerationOptions,
}

#[derive(Serialize)]
struct RigRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    original_model_task_id: &'a str,
    out_format: ModelFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    rig_type: Option<RigType>,
    spec: RigSpec,
}

#[derive(Serialize)]
struct RetargetRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    original_model_task_id: &'a str,
    out_format: ModelFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    animation: Option<Animation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    animations: Option<Vec<Animation>>,
    bake_animation: bool,
    export_with_geometry: bool,
}

#[derive(Serialize)]
struct PreRigCheckRequest<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    original_model_task_id: &'a str,
}

fn require_task_id(task_id: &str, what: &str) -> Result<(), TripoError> {
    if task_id.trim().is_empty() {
        return Err(TripoError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// The `type` of a file: its extension if it is a known image format.
fn image_type(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| IMAGE_TYPES.contains(&e.as_str()))
        .unwrap_or_else(|| "jpeg".to_string())
}

impl TripoClient {
    /// Submits a text-to-model task and returns its id.
    ///
    /// # Errors
    ///
    /// `TripoError::InvalidArgument` if `prompt` is blank.
    pub async fn text_to_model(
        &self,
        prompt: &str,
        negative_prompt: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String, TripoError> {
        if prompt.trim().is_empty() {
            return Err(TripoError::InvalidArgument("prompt must not be empty".into()));
        }
        self.submit(&TextToModelRequest {
            type_: "text_to_model",
            prompt,
            negative_prompt: negative_prompt.filter(|p| !p.trim().is_empty()),
            options,
        })
        .await
    }

    /// Submits an image-to-model task and returns its id.
    ///
    /// `image` accepts an [`ImageSource`] or anything convertible to one; a
    /// plain string is classified as URL, file token or local path.
    pub async fn image_to_model(
        &self,
        image: impl Into<ImageSource>,
        options: &GenerationOptions,
    ) -> Result<String, TripoError> {
        let resolved = image.into().resolve("image")?;
        let file = self.file_content(resolved).await?;
        self.submit(&ImageToModelRequest {
            type_: "image_to_model",
            file,
            options,
        })
        .await
    }

    /// Submits a multiview-to-model task and returns its id.
    ///
    /// The request always lists four views as `[front, left, back, right]`,
    /// with `null` for the missing ones.
    pub async fn multiview_to_model(
        &self,
        views: MultiviewImages,
        options: &GenerationOptions,
    ) -> Result<String, TripoError> {
        let ordered = [
            ("front", views.front),
            ("left", views.left),
            ("back", views.back),
            ("right", views.right),
        ];

        let mut resolved = Vec::with_capacity(ordered.len());
        for (name, view) in &ordered {
            resolved.push(match view {
                Some(source) => Some(source.resolve(&format!("{} view", name))?),
                None => None,
            });
        }
        if resolved.iter().all(Option::is_none) {
            return Err(TripoError::InvalidArgument(
                "at least one of the front, back, left or right views is required".into(),
            ));
        }

        let mut files = Vec::with_capacity(resolved.len());
        for image in resolved {
            files.push(match image {
                Some(image) => Some(self.file_content(image).await?),
                None => None,
            });
        }

        self.submit(&MultiviewToModelRequest {
            type_: "multiview_to_model",
            files,
            options,
        })
        .await
    }

    /// Submits a rigging task for a finished, unrigged model task.
    ///
    /// Only the id's presence is checked locally. The service rejects ids of
    /// unfinished or already rigged tasks, which comes back as
    /// `TripoError::ApiError`.
    pub async fn rig_model(
        &self,
        original_model_task_id: &str,
        options: &RigOptions,
    ) -> Result<String, TripoError> {
        require_task_id(original_model_task_id, "original model task id")?;
        self.submit(&RigRequest {
            type_: "animate_rig",
            original_model_task_id,
            out_format: options.out_format,
            rig_type: options.rig_type,
            spec: options.spec,
        })
        .await
    }

    /// Submits a task that checks whether a model can be rigged. The finished
    /// task answers through [`crate::Task::riggable`].
    pub async fn check_riggable(&self, original_model_task_id: &str) -> Result<String, TripoError> {
        require_task_id(original_model_task_id, "original model task id")?;
        self.submit(&PreRigCheckRequest {
            type_: "animate_prerigcheck",
            original_model_task_id,
        })
        .await
    }

    /// Retargets preset animations onto a rigged model.
    ///
    /// Unknown animation names are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - `TripoError::NoValidAnimation` if no requested name is a known preset.
    /// - `TripoError::InvalidArgument` if the id or the selection is empty.
    pub async fn retarget_animation(
        &self,
        original_model_task_id: &str,
        animations: impl Into<AnimationSelection>,
        options: &RetargetOptions,
    ) -> Result<String, TripoError> {
        require_task_id(original_model_task_id, "original model task id")?;
        let mut valid = animations.into().validate()?;

        let (animation, animations) = if valid.len() == 1 {
            (valid.pop(), None)
        } else {
            (None, Some(valid))
        };

        self.submit(&RetargetRequest {
            type_: "animate_retarget",
            original_model_task_id,
            out_format: options.out_format,
            animation,
            animations,
            bake_animation: options.bake_animation,
            export_with_geometry: options.export_with_geometry,
        })
        .await
    }

    /// Submits an already-normalized request body, for job kinds this client
    /// has no dedicated method for.
    ///
    /// # Errors
    ///
    /// `TripoError::InvalidArgument` unless `body` is an object with a
    /// non-empty string `type`.
    pub async fn create_task(&self, body: Value) -> Result<String, TripoError> {
        let has_type = body
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty());
        if !body.is_object() || !has_type {
            return Err(TripoError::InvalidArgument(
                "task body must be an object with a non-empty \"type\"".into(),
            ));
        }
        self.submit(&body).await
    }

    async fn submit<B: Serialize>(&self, body: &B) -> Result<String, TripoError> {
        let body = serde_json::to_value(body)?;
        let kind = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let response: TaskResponse = self
            .session()
            .call(Method::POST, TASK_PATH, Payload::Json(body))
            .await?;
        if response.task_id.is_empty() {
            return Err(TripoError::ApiError {
                status: 200,
                code: None,
                message: "service returned an empty task id".into(),
                suggestion: None,
            });
        }

        tracing::info!(task_id = %response.task_id, kind = %kind, "task submitted");
        Ok(response.task_id)
    }

    async fn file_content(&self, image: ResolvedImage) -> Result<FileContent, TripoError> {
        Ok(match image {
            ResolvedImage::Url(url) => {
                let type_ = url::Url::parse(&url)
                    .ok()
                    .map(|u| image_type(u.path()))
                    .unwrap_or_else(|| "jpeg".to_string());
                FileContent {
                    type_,
                    url: Some(url),
                    ..Default::default()
                }
            }
            ResolvedImage::Token(token) => FileContent {
                type_: "jpeg".to_string(),
                file_token: Some(token),
                ..Default::default()
            },
            ResolvedImage::Local(path) => {
                let file_token = self.upload_file(&path).await?;
                FileContent {
                    type_: image_type(&path.to_string_lossy()),
                    file_token: Some(file_token),
                    ..Default::default()
                }
            }
        })
    }
}
