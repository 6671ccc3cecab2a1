//! This example demonstrates a wait-and-download workflow:
//! 1. Taking an existing task ID from the command line.
//! 2. Polling the task status until it completes.
//! 3. Downloading the resulting files to a temporary directory if the task was successful.
//!
//! Ctrl-C cancels the wait cleanly.
//!
//! Usage:
//! `cargo run --example wait_and_download <TASK_ID>`

use std::time::Duration;

use tripo3d_client::{
    CancellationToken, ClientConfig, DownloadOptions, TaskStatus, TripoClient, WaitOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let task_id = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide a task ID as a command-line argument."))?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            println!("\nWaiting for task `{}` to complete...", task_id);
            let options = WaitOptions::default()
                .poll_interval(Duration::from_secs(2))
                .timeout(Duration::from_secs(1800))
                .cancel_token(cancel.clone())
                .on_progress(|task| println!("Task status: {}, progress: {}%", task.status, task.progress));
            let task = client.wait_for_task_with(&task_id, &options).await?;

            if task.status != TaskStatus::Success {
                println!("\nTask finished with non-success status: {}", task.status);
                return Ok(());
            }

            let temp_dir = tempfile::Builder::new()
                .prefix("tripo_download_")
                .tempdir()?
                .into_path();
            println!(
                "\nTask completed successfully! Downloading to: {}",
                temp_dir.display()
            );

            let downloads = client
                .download_task_models(
                    &task,
                    &temp_dir,
                    &DownloadOptions::default()
                        .allow_partial(true)
                        .cancel_token(cancel),
                )
                .await?;
            if downloads.files.is_empty() {
                println!("\nNo files were available for download.");
            }
            for (kind, path) in &downloads.files {
                match path {
                    Some(path) => println!("- {}: {}", kind, path.display()),
                    None => println!("- {}: failed", kind),
                }
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
}
