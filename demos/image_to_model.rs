//! This example creates a 3D model from a single image.
//!
//! The image can be a local file (uploaded first), an `http(s)://` URL or a
//! file token from an earlier upload.
//!
//! Usage: `cargo run --example image_to_model -- <IMAGE> [output dir]`

use std::time::Duration;

use tripo3d_client::{ClientConfig, DownloadOptions, GenerationOptions, TaskStatus, TripoClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let image = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide an image path or URL as a command-line argument."))?;
    let output_dir = std::env::args().nth(2).unwrap_or_else(|| "./output".to_string());

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            let task_id = client
                .image_to_model(image.as_str(), &GenerationOptions::default())
                .await?;
            println!("Task submitted: {}", task_id);

            let task = client
                .wait_for_task(&task_id, Duration::from_secs(2), Some(Duration::from_secs(900)), true)
                .await?;
            if task.status != TaskStatus::Success {
                println!("Task failed with status: {}", task.status);
                return Ok(());
            }

            std::fs::create_dir_all(&output_dir)?;
            let downloads = client
                .download_task_models(&task, &output_dir, &DownloadOptions::default())
                .await?;
            for (kind, path) in downloads.files.iter().filter_map(|(k, p)| p.as_ref().map(|p| (k, p))) {
                println!("Downloaded {}: {}", kind, path.display());
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
}
