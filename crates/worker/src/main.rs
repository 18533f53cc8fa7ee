//! `kinema-worker` -- renders a pose, runs one ComfyUI job, saves results.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default           | Description                       |
//! |----------------------------|----------|-------------------|-----------------------------------|
//! | `KINEMA_TEMPLATE`          | yes      | --                | Job graph template JSON           |
//! | `KINEMA_POSE`              | no       | reference pose    | Pose JSON to render               |
//! | `KINEMA_OUTPUT_DIR`        | no       | `./output`        | Where generated images are written|
//! | `KINEMA_POSE_NODE_TITLE`   | no       | `ControlNetImage` | Node receiving the uploaded image |
//! | `KINEMA_POSE_NODE_INPUT`   | no       | `image`           | Input set to the uploaded name    |
//! | `COMFYUI_*`, `CANVAS_*`    | no       | see crate docs    | Engine and canvas settings        |

use anyhow::Context;
use kinema_comfyui::config::EngineConfig;
use kinema_core::canvas::CanvasConfig;
use kinema_worker::config::WorkerConfig;
use kinema_worker::pipeline;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinema_worker=info,kinema_comfyui=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let worker = WorkerConfig::from_env().context("loading worker configuration")?;
    let engine = EngineConfig::from_env().context("loading engine configuration")?;
    let canvas = CanvasConfig::from_env().context("loading canvas configuration")?;

    tracing::info!(
        host = %engine.host,
        template = %worker.template_path.display(),
        "Starting kinema-worker",
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling job");
            on_signal.cancel();
        }
    });

    let paths = pipeline::run(&worker, engine, &canvas, &cancel).await?;
    for path in &paths {
        println!("{}", path.display());
    }
    Ok(())
}
