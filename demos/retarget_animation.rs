//! This example applies preset animations to a rigged model.
//!
//! Unknown animation names are skipped with a warning.
//!
//! Usage: `cargo run --example retarget_animation -- <RIGGED_TASK_ID> walk run ...`

use std::time::Duration;

use tripo3d_client::{
    Animation, ClientConfig, DownloadOptions, RetargetOptions, TaskStatus, TripoClient, TripoError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let rigged_task_id = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Please provide the task ID of the rigged model."))?;
    let animations: Vec<String> = args.collect();
    if animations.is_empty() {
        let names: Vec<&str> = Animation::ALL.iter().map(|a| a.name()).collect();
        anyhow::bail!("Please name at least one animation: {}", names.join(", "));
    }

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            println!("Applying animations {:?} to model {}...", animations, rigged_task_id);
            let task_id = match client
                .retarget_animation(&rigged_task_id, animations, &RetargetOptions::default())
                .await
            {
                Ok(id) => id,
                Err(TripoError::NoValidAnimation { rejected }) => {
                    println!("No valid animations provided (rejected: {:?})", rejected);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let task = client
                .wait_for_task(&task_id, Duration::from_secs(2), None, true)
                .await?;
            if task.status != TaskStatus::Success {
                println!("Animation retargeting failed with status: {}", task.status);
                return Ok(());
            }

            std::fs::create_dir_all("./output")?;
            let downloads = client
                .download_task_models(&task, "./output", &DownloadOptions::default())
                .await?;
            for (kind, path) in &downloads.files {
                if let Some(path) = path {
                    println!("Downloaded {}: {}", kind, path.display());
                }
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
}
