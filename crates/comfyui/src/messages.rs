//! ComfyUI WebSocket message types and parser.
//!
//! Text frames are JSON of the shape `{"type": "<kind>", "data": {...}}`
//! and deserialize into [`ComfyUIMessage`]. Binary frames carry an 8-byte
//! header followed by an encoded image; see [`split_binary_frame`].

use serde::Deserialize;

/// Length of the header preceding every binary frame payload.
pub const BINARY_HEADER_LEN: usize = 8;

/// Control message kinds this crate understands. Anything else parses to
/// [`ComfyUIMessage::Unknown`].
const KNOWN_TYPES: &[&str] = &[
    "status",
    "execution_start",
    "execution_cached",
    "executing",
    "progress",
    "executed",
    "execution_error",
];

/// All known ComfyUI WebSocket message types.
///
/// Deserialized via the adjacently-tagged `"type"` field with associated
/// `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Server status broadcast (queue depth, etc.).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Some nodes were skipped because their outputs are cached.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A specific node is currently executing (or execution finished when `node` is `None`).
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Progress update from a long-running node (e.g. KSampler).
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node has finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// Execution failed with an error.
    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),

    /// A well-formed message of a kind not modelled here (extension
    /// monitors, preview metadata, ...).
    #[serde(skip)]
    Unknown(String),
}

/// Queue status information.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

/// Current queue state.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

/// Execution queue statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

/// Payload for `execution_start` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

/// Payload for `execution_cached` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    /// Node IDs whose outputs were served from cache.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Payload for `executing` messages.
///
/// When `node` is `None`, execution of the prompt has completed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Payload for `progress` messages (step-level progress within a node).
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step number.
    pub value: i32,
    /// Total number of steps.
    pub max: i32,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

/// Payload for `executed` messages (node output).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    /// The node that produced this output.
    pub node: String,
    /// Raw output value (images, filenames, etc.).
    pub output: serde_json::Value,
    pub prompt_id: String,
}

/// Payload for `execution_error` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    pub node_id: String,
    pub exception_message: String,
    pub exception_type: String,
}

/// A text frame that could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, or JSON without a string `type` field.
    #[error("Malformed control message: {0}")]
    Malformed(String),

    /// A known `type` whose `data` has the wrong shape.
    #[error("Invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a ComfyUI WebSocket text message into a typed enum.
///
/// Unrecognised `type` values yield [`ComfyUIMessage::Unknown`]; malformed
/// JSON and known types with a bad payload yield a [`ProtocolError`].
/// Callers should log errors and continue.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing string 'type' field".into()))?
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(ComfyUIMessage::Unknown(kind));
    }

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// Decoded 8-byte binary frame header: two big-endian `u32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFrameHeader {
    /// Frame kind (`1` = preview / websocket-saved image).
    pub event: u32,
    /// Image encoding of the payload.
    pub format: ImageFormat,
}

/// Image encoding announced in a binary frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Other(u32),
}

impl From<u32> for ImageFormat {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::Jpeg,
            2 => Self::Png,
            other => Self::Other(other),
        }
    }
}

/// Split a binary frame into its header and image payload.
///
/// Returns `None` when the frame is shorter than [`BINARY_HEADER_LEN`].
pub fn split_binary_frame(frame: &[u8]) -> Option<(BinaryFrameHeader, &[u8])> {
    if frame.len() < BINARY_HEADER_LEN {
        return None;
    }
    let (header, payload) = frame.split_at(BINARY_HEADER_LEN);
    let event = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let format = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    Some((
        BinaryFrameHeader {
            event,
            format: ImageFormat::from(format),
        },
        payload,
    ))
}
