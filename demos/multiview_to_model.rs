//! This example creates a 3D model from up to four views of an object.
//!
//! Usage:
//! `cargo run --example multiview_to_model -- --front front.png [--back b.png] [--left l.png] [--right r.png] [--output-dir DIR]`

use std::time::Duration;

use anyhow::bail;
use tripo3d_client::{
    ClientConfig, DownloadOptions, GenerationOptions, ImageSource, MultiviewImages, TaskStatus,
    TripoClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut views = MultiviewImages::default();
    let mut output_dir = "./output".to_string();
    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        let value = args
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing value for {}", flag))?;
        match flag.as_str() {
            "--front" => views.front = Some(ImageSource::parse(&value)),
            "--back" => views.back = Some(ImageSource::parse(&value)),
            "--left" => views.left = Some(ImageSource::parse(&value)),
            "--right" => views.right = Some(ImageSource::parse(&value)),
            "--output-dir" => output_dir = value,
            other => bail!("unknown argument {}", other),
        }
    }

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            let task_id = client
                .multiview_to_model(views, &GenerationOptions::default())
                .await?;
            println!("Task submitted: {}", task_id);

            let task = client
                .wait_for_task(&task_id, Duration::from_secs(2), None, true)
                .await?;
            if task.status != TaskStatus::Success {
                println!("Task failed with status: {}", task.status);
                return Ok(());
            }

            std::fs::create_dir_all(&output_dir)?;
            let downloads = client
                .download_task_models(&task, &output_dir, &DownloadOptions::default())
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
