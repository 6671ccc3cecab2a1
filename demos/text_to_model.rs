//! This example submits a text-to-model task, waits for it to finish and
//! downloads the resulting files.
//!
//! To run this example, you must have the `TRIPO_API_KEY` environment variable set.
//!
//! Usage: `cargo run --example text_to_model -- "a high quality armchair" [negative prompt] [output dir]`

use std::time::Duration;

use tripo3d_client::{ClientConfig, DownloadOptions, GenerationOptions, TaskStatus, TripoClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let prompt = args
        .next()
        .unwrap_or_else(|| "a high quality armchair".to_string());
    let negative_prompt = args.next().filter(|p| !p.is_empty());
    let output_dir = args.next().unwrap_or_else(|| "./output".to_string());

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            println!("Submitting task for prompt: \"{}\"...", prompt);
            let task_id = client
                .text_to_model(&prompt, negative_prompt.as_deref(), &GenerationOptions::default())
                .await?;
            println!("-> Task ID: {}", task_id);

            let task = client
                .wait_for_task(&task_id, Duration::from_secs(2), None, true)
                .await?;
            if task.status != TaskStatus::Success {
                println!("\nTask finished with status: {}", task.status);
                return Ok(());
            }

            println!("\nTask completed successfully! Downloading model files...");
            std::fs::create_dir_all(&output_dir)?;
            let downloads = client
                .download_task_models(&task, &output_dir, &DownloadOptions::default().allow_partial(true))
                .await?;
            for (kind, path) in &downloads.files {
                if let Some(path) = path {
                    println!("Downloaded {}: {}", kind, path.display());
                }
            }
            for (kind, error) in &downloads.errors {
                eprintln!("Failed to download {}: {}", kind, error);
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
}
