//! One end-to-end generation run: pose in, images out.

use std::path::{Path, PathBuf};

use anyhow::Context;
use kinema_comfyui::api::{ImageKind, UploadResponse};
use kinema_comfyui::collector::OutputImages;
use kinema_comfyui::config::EngineConfig;
use kinema_comfyui::session::{GenerationError, GenerationSession};
use kinema_core::canvas::CanvasConfig;
use kinema_core::job_graph::JobGraph;
use kinema_core::pose::PoseData;
use kinema_core::render::render;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::output::save_outputs;

/// Read pose JSON from `path`, or fall back to the reference pose.
pub fn load_pose(path: Option<&Path>) -> anyhow::Result<PoseData> {
    let Some(path) = path else {
        tracing::info!("No pose file configured, using reference pose");
        return Ok(PoseData::reference());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading pose file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing pose file {}", path.display()))
}

/// Read and validate the job graph template.
pub fn load_template(path: &Path) -> anyhow::Result<JobGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading job graph template {}", path.display()))?;
    JobGraph::from_json_str(&raw)
        .with_context(|| format!("parsing job graph template {}", path.display()))
}

/// Name a loader node expects for an uploaded file.
pub fn uploaded_reference(uploaded: &UploadResponse) -> String {
    if uploaded.subfolder.is_empty() {
        uploaded.name.clone()
    } else {
        format!("{}/{}", uploaded.subfolder, uploaded.name)
    }
}

/// Render, upload, run the patched template and save its outputs.
pub async fn run(
    worker: &WorkerConfig,
    engine: EngineConfig,
    canvas: &CanvasConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<Vec<PathBuf>> {
    let template = load_template(&worker.template_path)?;
    let pose = load_pose(worker.pose_path.as_deref())?;

    let image = render(&pose, canvas).context("rendering conditioning image")?;
    let png = image.to_png_bytes().context("encoding conditioning image")?;
    tracing::info!(
        skeletons = pose.skeletons.len(),
        width = image.width(),
        height = image.height(),
        "Rendered conditioning image",
    );

    let mut session = GenerationSession::new(engine);
    let result = generate(&mut session, worker, &template, png, cancel).await;
    session.close().await;
    let outputs = result?;

    let paths = save_outputs(&outputs, &worker.output_dir)
        .with_context(|| format!("writing outputs to {}", worker.output_dir.display()))?;
    tracing::info!(
        count = paths.len(),
        dir = %worker.output_dir.display(),
        "Saved generated images",
    );
    Ok(paths)
}

async fn generate(
    session: &mut GenerationSession,
    worker: &WorkerConfig,
    template: &JobGraph,
    png: Vec<u8>,
    cancel: &CancellationToken,
) -> anyhow::Result<OutputImages> {
    let uploaded = tokio::select! {
        _ = cancel.cancelled() => return Err(GenerationError::Cancelled.into()),
        uploaded = session.api().upload_image(png, None, ImageKind::Input, true) => {
            uploaded.context("uploading conditioning image")?
        }
    };

    let graph = template
        .with_input(
            &worker.pose_node_title,
            &worker.pose_node_input,
            uploaded_reference(&uploaded),
        )
        .context("patching job graph template")?;

    tracing::info!(
        session_id = %session.session_id(),
        image = %uploaded.name,
        "Submitting job",
    );
    Ok(session.generate(&graph, cancel).await?)
}
