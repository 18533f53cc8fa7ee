//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps job submission, image upload, output image fetch and history
//! retrieval using [`reqwest`]. Response bodies are parsed by standalone
//! functions so the contract checks can be exercised without a server.

use kinema_core::job_graph::JobGraph;
use kinema_core::session::random_png_name;
use serde::Deserialize;

/// Content type sent for uploaded images.
const UPLOAD_MIME: &str = "image/png";

/// HTTP client for a single ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a job.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue, when reported.
    pub number: Option<i64>,
}

/// Response returned by `/upload/image`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    /// Stored file name, usable as a `LoadImage` input.
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Where an image lives on the engine (`input`, `output` or `temp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Input,
    Output,
    Temp,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Temp => "temp",
        }
    }
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body lacks a required field or is not JSON.
    #[error("Invalid ComfyUI response: {0}")]
    InvalidResponse(String),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across multiple instances).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a job graph for execution.
    ///
    /// Sends a `POST /prompt` request with the graph and client ID.
    /// Returns the server-assigned `prompt_id`; a success response without
    /// one is an [`ComfyUIApiError::InvalidResponse`].
    pub async fn submit_workflow(
        &self,
        graph: &JobGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": graph,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        let text = Self::ensure_success(response).await?.text().await?;
        parse_submit_response(&text)
    }

    /// Upload an image into the engine's input store.
    ///
    /// Sends a multipart `POST /upload/image`. When `name` is `None` a
    /// random `<hex>.png` name is generated. With `overwrite` set, an
    /// existing file of the same name is replaced.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        name: Option<&str>,
        kind: ImageKind,
        overwrite: bool,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        let file_name = name.map_or_else(random_png_name, str::to_string);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(UPLOAD_MIME)?;
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", kind.as_str())
            .text("overwrite", overwrite.to_string());

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let text = Self::ensure_success(response).await?.text().await?;
        let uploaded = parse_upload_response(&text)?;

        tracing::debug!(
            requested = %file_name,
            stored = %uploaded.name,
            "Uploaded image to ComfyUI",
        );
        Ok(uploaded)
    }

    /// Download an image by file name.
    ///
    /// Sends `GET /view?filename=..&subfolder=..&type=..` and returns the
    /// raw body.
    pub async fn fetch_image(
        &self,
        filename: &str,
        subfolder: &str,
        kind: ImageKind,
    ) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", kind.as_str()),
            ])
            .send()
            .await?;

        let bytes = Self::ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request.  The returned JSON
    /// contains output file paths, node results, and timing data.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Extract the job identifier from a `/prompt` response body.
pub fn parse_submit_response(body: &str) -> Result<SubmitResponse, ComfyUIApiError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ComfyUIApiError::InvalidResponse(format!("submit response is not JSON: {e}")))?;

    let prompt_id = value
        .get("prompt_id")
        .and_then(serde_json::Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ComfyUIApiError::InvalidResponse(format!("submit response lacks prompt_id: {body}"))
        })?
        .to_string();

    let number = value.get("number").and_then(serde_json::Value::as_i64);

    Ok(SubmitResponse { prompt_id, number })
}

/// Parse an `/upload/image` response body.
pub fn parse_upload_response(body: &str) -> Result<UploadResponse, ComfyUIApiError> {
    serde_json::from_str(body)
        .map_err(|e| ComfyUIApiError::InvalidResponse(format!("upload response: {e}")))
}
