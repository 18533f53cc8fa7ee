//! Worker settings read from the environment.

use std::path::PathBuf;

use kinema_core::error::CoreError;

pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_POSE_NODE_TITLE: &str = "ControlNetImage";
pub const DEFAULT_POSE_NODE_INPUT: &str = "image";

/// What the worker runs and where it writes results.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Job graph template (engine API format JSON).
    pub template_path: PathBuf,
    /// Pose JSON. The built-in reference pose is used when unset.
    pub pose_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Title of the node that receives the uploaded conditioning image.
    pub pose_node_title: String,
    /// Input of that node set to the uploaded file name.
    pub pose_node_input: String,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default           |
    /// |--------------------------|-------------------|
    /// | `KINEMA_TEMPLATE`        | required          |
    /// | `KINEMA_POSE`            | unset (reference) |
    /// | `KINEMA_OUTPUT_DIR`      | `./output`        |
    /// | `KINEMA_POSE_NODE_TITLE` | `ControlNetImage` |
    /// | `KINEMA_POSE_NODE_INPUT` | `image`           |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable
    /// source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let template_path = non_empty("KINEMA_TEMPLATE")
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::Configuration("KINEMA_TEMPLATE is required".into()))?;

        Ok(Self {
            template_path,
            pose_path: non_empty("KINEMA_POSE").map(PathBuf::from),
            output_dir: non_empty("KINEMA_OUTPUT_DIR")
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.into())
                .into(),
            pose_node_title: non_empty("KINEMA_POSE_NODE_TITLE")
                .unwrap_or_else(|| DEFAULT_POSE_NODE_TITLE.into()),
            pose_node_input: non_empty("KINEMA_POSE_NODE_INPUT")
                .unwrap_or_else(|| DEFAULT_POSE_NODE_INPUT.into()),
        })
    }
}
