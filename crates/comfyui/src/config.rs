//! Engine connection settings.

use std::time::Duration;

use kinema_core::error::CoreError;

/// Default `host:port` of a local ComfyUI server.
pub const DEFAULT_HOST: &str = "127.0.0.1:8188";

/// Title of the node whose binary frames are collected as results.
pub const DEFAULT_OUTPUT_NODE_TITLE: &str = "SaveImageWebsocket";

/// How to reach one engine and what to collect from it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// `host:port`, without scheme.
    pub host: String,
    /// Use `https`/`wss` instead of `http`/`ws`.
    pub tls: bool,
    /// Binary frames are kept only while a node with this title executes.
    pub output_node_title: String,
    /// Upper bound on one job's submit-to-completion time. `None` waits
    /// forever.
    pub job_timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            tls: false,
            output_node_title: DEFAULT_OUTPUT_NODE_TITLE.to_string(),
            job_timeout: None,
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default              |
    /// |-----------------------------|----------------------|
    /// | `COMFYUI_HOST`              | `127.0.0.1:8188`     |
    /// | `COMFYUI_TLS`               | `false`              |
    /// | `COMFYUI_OUTPUT_NODE_TITLE` | `SaveImageWebsocket` |
    /// | `COMFYUI_JOB_TIMEOUT_SECS`  | unset (no timeout)   |
    pub fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("COMFYUI_HOST").unwrap_or_else(|_| DEFAULT_HOST.into());
        if host.trim().is_empty() {
            return Err(CoreError::Configuration("COMFYUI_HOST is empty".into()));
        }

        let tls = match std::env::var("COMFYUI_TLS") {
            Ok(raw) => raw.trim().parse::<bool>().map_err(|_| {
                CoreError::Configuration(format!("COMFYUI_TLS must be true or false, got '{raw}'"))
            })?,
            Err(_) => false,
        };

        let output_node_title = std::env::var("COMFYUI_OUTPUT_NODE_TITLE")
            .unwrap_or_else(|_| DEFAULT_OUTPUT_NODE_TITLE.into());

        let job_timeout = match std::env::var("COMFYUI_JOB_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    CoreError::Configuration(format!(
                        "COMFYUI_JOB_TIMEOUT_SECS must be a whole number, got '{raw}'"
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            host,
            tls,
            output_node_title,
            job_timeout,
        })
    }

    /// Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn api_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.host)
    }

    /// Base WebSocket URL, e.g. `ws://127.0.0.1:8188`.
    pub fn ws_url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}", self.host)
    }
}
