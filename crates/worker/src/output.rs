//! Writing collected images to disk.

use std::path::{Path, PathBuf};

use kinema_comfyui::collector::OutputImages;

/// Write every buffer in `outputs` to `dir` as `<uuid>.png`.
///
/// Creates `dir` if needed. Returns the written paths in output-node then
/// arrival order.
pub fn save_outputs(outputs: &OutputImages, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (node_title, images) in outputs {
        for bytes in images {
            let path = dir.join(format!("{}.png", uuid::Uuid::new_v4().simple()));
            std::fs::write(&path, bytes)?;
            tracing::debug!(node = %node_title, path = %path.display(), "Saved output image");
            written.push(path);
        }
    }
    Ok(written)
}
