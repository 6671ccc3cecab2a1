//! This example rigs a finished model for animation.
//!
//! It first asks the service whether the model can be rigged, then submits
//! the rigging task and downloads the rigged model.
//!
//! Usage: `cargo run --example rig_model -- <MODEL_TASK_ID> [rig type] [mixamo|tripo] [glb|fbx]`

use std::time::Duration;

use tripo3d_client::{
    ClientConfig, DownloadOptions, ModelFormat, RigOptions, RigSpec, RigType, TaskStatus,
    TripoClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let model_task_id = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("Please provide the task ID of the model to rig."))?;
    let options = RigOptions {
        rig_type: args.next().map(|t| t.parse::<RigType>()).transpose()?,
        spec: args.next().map(|s| s.parse::<RigSpec>()).transpose()?.unwrap_or_default(),
        out_format: args.next().map(|f| f.parse::<ModelFormat>()).transpose()?.unwrap_or_default(),
    };

    let client = TripoClient::open(&ClientConfig::from_dotenv())?;
    client
        .scope(|client| async move {
            let check_id = client.check_riggable(&model_task_id).await?;
            let check = client
                .wait_for_task(&check_id, Duration::from_secs(2), None, false)
                .await?;
            if check.riggable() == Some(false) {
                println!("Model {} cannot be rigged.", model_task_id);
                return Ok(());
            }

            println!(
                "Rigging model with type: {}, spec: {}, format: {}",
                options.rig_type.map(|t| t.to_string()).unwrap_or_else(|| "auto".into()),
                options.spec,
                options.out_format
            );
            let rig_task_id = client.rig_model(&model_task_id, &options).await?;
            let rigged = client
                .wait_for_task(&rig_task_id, Duration::from_secs(2), None, true)
                .await?;

            if rigged.status != TaskStatus::Success {
                println!("Rigging failed with status: {}", rigged.status);
                if let Some(msg) = &rigged.error_msg {
                    println!("Error message: {}", msg);
                }
                return Ok(());
            }

            std::fs::create_dir_all("./output")?;
            let downloads = client
                .download_task_models(&rigged, "./output", &DownloadOptions::default())
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
