//! Session-scoped job execution.
//!
//! A [`GenerationSession`] owns one session id and, while jobs run, one
//! WebSocket connection registered under that id. [`generate`] connects
//! before submitting so no early `executing` event is missed, then
//! demultiplexes the job's results off the socket.
//!
//! [`generate`]: GenerationSession::generate

use std::time::Duration;

use kinema_core::job_graph::JobGraph;
use kinema_core::session::new_session_id;
use tokio_util::sync::CancellationToken;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{ComfyUIClient, ComfyUIClientError, ComfyUIConnection};
use crate::collector::{collect_outputs, OutputCollector, OutputImages};
use crate::config::EngineConfig;

/// Everything that can end a job without results.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The session socket could not be opened.
    #[error(transparent)]
    Connect(#[from] ComfyUIClientError),

    /// The engine refused the job or answered without a prompt id.
    #[error("Job submission failed: {0}")]
    Submission(#[from] ComfyUIApiError),

    /// The socket failed or closed before the job completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller's cancellation token fired.
    #[error("Job cancelled")]
    Cancelled,

    /// The job did not complete within the configured limit.
    #[error("Job did not complete within {0:?}")]
    Timeout(Duration),
}

/// One client session against one engine.
pub struct GenerationSession {
    config: EngineConfig,
    api: ComfyUIApi,
    client: ComfyUIClient,
    session_id: String,
    connection: Option<ComfyUIConnection>,
}

impl GenerationSession {
    /// Create a session with a freshly minted id. No connection is opened
    /// until the first job runs (or [`connect`](Self::connect) is called).
    pub fn new(config: EngineConfig) -> Self {
        let api = ComfyUIApi::new(config.api_url());
        let client = ComfyUIClient::new(config.ws_url());
        Self {
            config,
            api,
            client,
            session_id: new_session_id(),
            connection: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// REST client for uploads, fetches and history lookups.
    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Open the session socket if it is not already open.
    pub async fn connect(&mut self) -> Result<(), GenerationError> {
        if self.connection.is_none() {
            self.connection = Some(self.client.connect(&self.session_id).await?);
        }
        Ok(())
    }

    /// Submit `graph` and wait for its output images.
    ///
    /// `cancel` is honoured while connecting, submitting and collecting.
    /// The socket is kept for the next job on success. On any error,
    /// cancellation or timeout it is closed, and the next call reconnects
    /// under the same session id with a fresh collector.
    pub async fn generate(
        &mut self,
        graph: &JobGraph,
        cancel: &CancellationToken,
    ) -> Result<OutputImages, GenerationError> {
        tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            connected = self.connect() => connected?,
        }
        let Some(mut conn) = self.connection.take() else {
            return Err(GenerationError::Transport("session socket unavailable".into()));
        };

        let job = self.run_job(&mut conn, graph, cancel);
        let result = match self.config.job_timeout {
            Some(limit) => tokio::time::timeout(limit, job)
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => job.await,
        };

        match result {
            Ok(outputs) => {
                self.connection = Some(conn);
                Ok(outputs)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "Job failed, dropping session socket",
                );
                conn.close().await;
                Err(e)
            }
        }
    }

    /// Close the session socket, if open.
    pub async fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close().await;
        }
    }

    async fn run_job(
        &self,
        conn: &mut ComfyUIConnection,
        graph: &JobGraph,
        cancel: &CancellationToken,
    ) -> Result<OutputImages, GenerationError> {
        let submitted = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(session_id = %self.session_id, "Job submission cancelled");
                return Err(GenerationError::Cancelled);
            }
            submitted = self.api.submit_workflow(graph, &self.session_id) => submitted?,
        };

        tracing::info!(
            session_id = %self.session_id,
            prompt_id = %submitted.prompt_id,
            queue_number = ?submitted.number,
            "Job submitted to ComfyUI",
        );

        let collector = OutputCollector::new(
            graph,
            submitted.prompt_id.as_str(),
            self.config.output_node_title.as_str(),
        );
        let outputs = collect_outputs(&mut conn.ws_stream, collector, cancel).await?;

        tracing::info!(
            prompt_id = %submitted.prompt_id,
            images = outputs.values().map(Vec::len).sum::<usize>(),
            "Job outputs collected",
        );
        Ok(outputs)
    }
}
