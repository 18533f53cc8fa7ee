//! Result stream demultiplexer.
//!
//! One session's socket interleaves JSON control frames for every job of
//! that session with untagged binary result frames. [`OutputCollector`]
//! follows a single job through that stream: `executing` events for the
//! awaited prompt move `current_node`, binary frames are attributed to
//! whichever node was announced last, and frames from the configured
//! output node are kept. The collector owns no I/O, so it can be driven by
//! [`collect_outputs`] over a socket or fed synthetic frames directly.

use std::collections::BTreeMap;

use futures::{Stream, StreamExt};
use kinema_core::job_graph::JobGraph;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::messages::{parse_message, split_binary_frame, ComfyUIMessage, ExecutingData};
use crate::session::GenerationError;

/// Output node title -> image payloads in arrival order.
pub type OutputImages = BTreeMap<String, Vec<Vec<u8>>>;

/// Where the collector is in the awaited job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    AwaitingEvent,
    /// `executing` with `node: null` arrived for the awaited prompt.
    Done,
}

/// Demultiplexes one job's results out of a session stream.
#[derive(Debug)]
pub struct OutputCollector<'g> {
    graph: &'g JobGraph,
    prompt_id: String,
    output_title: String,
    current_node: Option<String>,
    outputs: OutputImages,
    state: CollectorState,
}

impl<'g> OutputCollector<'g> {
    /// Follow `prompt_id`, keeping frames produced while a node of `graph`
    /// titled `output_title` executes.
    pub fn new(
        graph: &'g JobGraph,
        prompt_id: impl Into<String>,
        output_title: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            prompt_id: prompt_id.into(),
            output_title: output_title.into(),
            current_node: None,
            outputs: OutputImages::new(),
            state: CollectorState::AwaitingEvent,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    /// Node id most recently announced for the awaited prompt.
    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    /// Feed one text frame. Unparsable frames are logged and skipped.
    pub fn handle_text(&mut self, text: &str) -> CollectorState {
        if self.state == CollectorState::Done {
            return self.state;
        }

        match parse_message(text) {
            Ok(ComfyUIMessage::Executing(data)) => self.handle_executing(data),
            Ok(ComfyUIMessage::ExecutionError(data)) if data.prompt_id == self.prompt_id => {
                tracing::warn!(
                    prompt_id = %data.prompt_id,
                    node_id = %data.node_id,
                    error_type = %data.exception_type,
                    error_message = %data.exception_message,
                    "Execution error reported for awaited prompt",
                );
            }
            Ok(ComfyUIMessage::Progress(data)) => {
                tracing::trace!(value = data.value, max = data.max, "Generation progress");
            }
            Ok(ComfyUIMessage::Unknown(kind)) => {
                tracing::trace!(kind = %kind, "Ignoring unmodelled control message");
            }
            Ok(other) => {
                tracing::trace!(message = ?other, "Ignoring control message");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    raw_message = %text,
                    "Failed to parse ComfyUI message",
                );
            }
        }
        self.state
    }

    /// Feed one binary frame.
    pub fn handle_binary(&mut self, frame: &[u8]) {
        if self.state == CollectorState::Done {
            return;
        }

        let Some(node) = self.current_node.as_deref() else {
            tracing::warn!(
                prompt_id = %self.prompt_id,
                bytes = frame.len(),
                "Discarding binary frame received before any executing node",
            );
            return;
        };

        let Some(title) = self.graph.node_title(node) else {
            tracing::warn!(
                prompt_id = %self.prompt_id,
                node = %node,
                "Discarding binary frame from node missing in job graph",
            );
            return;
        };

        if title != self.output_title {
            tracing::trace!(node = %node, title = %title, "Discarding non-output binary frame");
            return;
        }

        let Some((header, payload)) = split_binary_frame(frame) else {
            tracing::warn!(
                node = %node,
                bytes = frame.len(),
                "Discarding binary frame shorter than its header",
            );
            return;
        };

        tracing::debug!(
            prompt_id = %self.prompt_id,
            node = %node,
            format = ?header.format,
            bytes = payload.len(),
            "Collected output image",
        );
        self.outputs
            .entry(title.to_string())
            .or_default()
            .push(payload.to_vec());
    }

    /// Collected images, keyed by output node title.
    pub fn into_outputs(self) -> OutputImages {
        self.outputs
    }

    fn handle_executing(&mut self, data: ExecutingData) {
        if data.prompt_id != self.prompt_id {
            tracing::trace!(prompt_id = %data.prompt_id, "Ignoring event for another prompt");
            return;
        }
        match data.node {
            Some(node) => {
                tracing::debug!(prompt_id = %self.prompt_id, node = %node, "Executing node");
                self.current_node = Some(node);
            }
            None => {
                tracing::info!(prompt_id = %self.prompt_id, "Execution completed (all nodes done)");
                self.state = CollectorState::Done;
            }
        }
    }
}

/// Drive `collector` over a WebSocket frame stream until the awaited job
/// completes.
///
/// Ends with an error if the socket fails, closes, or runs dry before
/// completion, or if `cancel` fires. No partial output is returned in
/// those cases.
pub async fn collect_outputs<S>(
    stream: &mut S,
    mut collector: OutputCollector<'_>,
    cancel: &CancellationToken,
) -> Result<OutputImages, GenerationError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(prompt_id = %collector.prompt_id(), "Result collection cancelled");
                return Err(GenerationError::Cancelled);
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                if collector.handle_text(&text) == CollectorState::Done {
                    return Ok(collector.into_outputs());
                }
            }
            Some(Ok(Message::Binary(data))) => collector.handle_binary(&data),
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "ComfyUI WebSocket closed");
                return Err(GenerationError::Transport(
                    "WebSocket closed before the job completed".into(),
                ));
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "WebSocket receive error");
                return Err(GenerationError::Transport(e.to_string()));
            }
            None => {
                return Err(GenerationError::Transport(
                    "WebSocket stream ended before the job completed".into(),
                ));
            }
        }
    }
}
