//! A task lifecycle client for the Tripo3D API.
//!
//! Generation jobs on Tripo3D are long-running: a job is submitted, its status
//! is polled until it finishes, and then its artifacts (meshes, preview
//! renders) are downloaded. This crate drives that lifecycle.
//!
//! ## Features
//! - Text, image, multiview, rigging and animation-retarget submission through
//!   one request path, plus raw bodies for new job kinds.
//! - Polling with timeout, progress reporting and cancellation.
//! - Concurrent artifact downloads to deterministic file names.
//! - One authenticated session with bounded retries for transient network
//!   failures, and typed errors for everything else.
//!
//! ```no_run
//! use std::time::Duration;
//! use tripo3d_client::{DownloadOptions, GenerationOptions, TaskStatus, TripoClient};
//!
//! # async fn run() -> Result<(), tripo3d_client::TripoError> {
//! TripoClient::new(None)?
//!     .scope(|client| async move {
//!         let task_id = client
//!             .text_to_model("a red armchair", None, &GenerationOptions::default())
//!             .await?;
//!         let task = client
//!             .wait_for_task(&task_id, Duration::from_secs(2), None, true)
//!             .await?;
//!         if task.status == TaskStatus::Success {
//!             client
//!                 .download_task_models(&task, "./output", &DownloadOptions::default())
//!                 .await?;
//!         }
//!         Ok::<_, tripo3d_client::TripoError>(())
//!     })
//!     .await
//! # }
//! ```

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod poll;
pub mod session;
pub mod submit;
pub mod types;

pub use client::TripoClient;
pub use config::{ClientConfig, RetryPolicy};
pub use download::{artifact_file_name, ArtifactDownloads, DownloadOptions};
pub use error::TripoError;
pub use poll::{ProgressHook, WaitOptions};
pub use session::{Payload, Session};
pub use submit::{
    AnimationSelection, FileContent, GenerationOptions, ImageSource, MultiviewImages,
    RetargetOptions, RigOptions,
};
pub use types::{
    Animation, Balance, ModelFormat, OutputKind, RigSpec, RigType, Task, TaskOutput, TaskStatus,
    UnrecognizedValue,
};
pub use tokio_util::sync::CancellationToken;
