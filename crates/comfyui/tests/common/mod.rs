//! In-process stand-in for a ComfyUI server.
//!
//! Serves `/ws`, `/prompt`, `/upload/image` and `/view` on a random local
//! port. Each accepted `/prompt` call releases the scripted frames of the
//! next [`MockJob`] onto whichever session socket is open.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use kinema_comfyui::config::EngineConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One frame the mock pushes to the client.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Close the socket from the server side.
    Close,
}

impl Frame {
    pub fn executing(prompt_id: &str, node: Option<&str>) -> Self {
        Self::Text(
            json!({"type": "executing", "data": {"node": node, "prompt_id": prompt_id}})
                .to_string(),
        )
    }

    /// A PNG-tagged image frame: 8-byte header then `payload`.
    pub fn image(payload: &[u8]) -> Self {
        let mut bytes = vec![0, 0, 0, 1, 0, 0, 0, 2];
        bytes.extend_from_slice(payload);
        Self::Binary(bytes)
    }
}

/// Scripted answer to one `/prompt` call.
#[derive(Debug, Clone)]
pub struct MockJob {
    pub status: StatusCode,
    pub response: Value,
    pub frames: Vec<Frame>,
    /// Hold the `/prompt` response back this long.
    pub delay: Option<Duration>,
}

impl MockJob {
    pub fn ok(prompt_id: &str, frames: Vec<Frame>) -> Self {
        Self {
            status: StatusCode::OK,
            response: json!({"prompt_id": prompt_id, "number": 0, "node_errors": {}}),
            frames,
            delay: None,
        }
    }

    /// A `/prompt` answer with an arbitrary status and body.
    pub fn respond(status: StatusCode, response: Value) -> Self {
        Self {
            status,
            response,
            frames: Vec::new(),
            delay: None,
        }
    }

    /// A submission the engine never answers.
    pub fn stalled() -> Self {
        Self {
            delay: Some(Duration::from_secs(3600)),
            ..Self::ok("stalled", Vec::new())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub file_name: String,
    pub content_type: String,
    pub kind: String,
    pub overwrite: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct EngineState {
    jobs: Arc<Vec<MockJob>>,
    next_job: Arc<AtomicUsize>,
    release_tx: mpsc::UnboundedSender<usize>,
    release_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<usize>>>,
    prompts: Arc<Mutex<Vec<Value>>>,
    ws_client_ids: Arc<Mutex<Vec<String>>>,
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
}

/// A running mock engine.
pub struct MockEngine {
    addr: SocketAddr,
    state: EngineState,
    handle: JoinHandle<()>,
}

impl MockEngine {
    /// Start serving `jobs` (answered in order) on a random port.
    pub async fn start(jobs: Vec<MockJob>) -> Self {
        let (release_tx, release_rx) = mpsc::unbounded_channel();
        let state = EngineState {
            jobs: Arc::new(jobs),
            next_job: Arc::new(AtomicUsize::new(0)),
            release_tx,
            release_rx: Arc::new(tokio::sync::Mutex::new(release_rx)),
            prompts: Arc::default(),
            ws_client_ids: Arc::default(),
            uploads: Arc::default(),
        };

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/prompt", post(prompt_handler))
            .route("/upload/image", post(upload_handler))
            .route("/view", get(view_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock engine");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock engine server");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(self.addr.to_string())
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies received on `/prompt`, in order.
    pub fn prompts(&self) -> Vec<Value> {
        self.state.prompts.lock().unwrap().clone()
    }

    /// `clientId` of every accepted WebSocket, in order.
    pub fn ws_client_ids(&self) -> Vec<String> {
        self.state.ws_client_ids.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<EngineState>,
) -> impl IntoResponse {
    let client_id = params.get("clientId").cloned().unwrap_or_default();
    state.ws_client_ids.lock().unwrap().push(client_id);
    ws.on_upgrade(move |socket| feed_socket(socket, state))
}

async fn feed_socket(mut socket: WebSocket, state: EngineState) {
    // One live socket consumes releases at a time.
    let mut releases = state.release_rx.lock().await;
    let status = json!({"type": "status", "data": {"status": {"exec_info": {"queue_remaining": 0}}}});
    if socket
        .send(Message::Text(status.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            released = releases.recv() => {
                let Some(idx) = released else { return };
                for frame in &state.jobs[idx].frames {
                    let message = match frame {
                        Frame::Text(text) => Message::Text(text.clone().into()),
                        Frame::Binary(bytes) => Message::Binary(bytes.clone().into()),
                        Frame::Close => {
                            let _ = socket.send(Message::Close(None)).await;
                            return;
                        }
                    };
                    if socket.send(message).await.is_err() {
                        return;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn prompt_handler(
    State(state): State<EngineState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.prompts.lock().unwrap().push(body);
    let idx = state.next_job.fetch_add(1, Ordering::SeqCst);
    let Some(job) = state.jobs.get(idx) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "no scripted job left"})),
        );
    };
    if let Some(delay) = job.delay {
        tokio::time::sleep(delay).await;
    }
    if job.status.is_success() {
        let _ = state.release_tx.send(idx);
    }
    (job.status, Json(job.response.clone()))
}

async fn upload_handler(
    State(state): State<EngineState>,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut upload = RecordedUpload {
        file_name: String::new(),
        content_type: String::new(),
        kind: String::new(),
        overwrite: String::new(),
        bytes: Vec::new(),
    };

    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                upload.file_name = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().unwrap_or_default().to_string();
                upload.bytes = field.bytes().await.expect("image bytes").to_vec();
            }
            "type" => upload.kind = field.text().await.expect("type field"),
            "overwrite" => upload.overwrite = field.text().await.expect("overwrite field"),
            _ => {}
        }
    }

    let response = json!({"name": upload.file_name, "subfolder": "", "type": upload.kind});
    state.uploads.lock().unwrap().push(upload);
    Json(response)
}

async fn view_handler(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let get = |key: &str| params.get(key).cloned().unwrap_or_default();
    if get("filename") == "missing.png" {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    let body = format!("{}|{}|{}", get("filename"), get("subfolder"), get("type"));
    (StatusCode::OK, body.into_bytes())
}
