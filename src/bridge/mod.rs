//! Host Bridge
//!
//! Message-passing front end for a host that cannot hold Rust futures: each
//! request is a tagged command with a request id, each reply is a JSON-ready
//! value echoing that id.
//!
//! # Architecture
//!
//! ```text
//! BridgeHandle ──mpsc──► dispatcher task ──spawn──► SessionController call
//!      ▲                                                     │
//!      └──────────────────── oneshot reply ◄─────────────────┘
//! ```
//!
//! Commands run concurrently so that a new `acquireAndOpen` can cancel one
//! still in flight.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{BridgeError, ErrorBody, Result};
use crate::search::Direction;
use crate::session::{OpenedDocument, SearchSummary, SessionController, SessionState};

const QUEUE_DEPTH: usize = 32;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum BridgeCommand {
    AcquireAndOpen { url: String },
    Search { query: String },
    Navigate { direction: Direction },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub command: BridgeCommand,
}

impl BridgeRequest {
    pub fn new(command: BridgeCommand) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeResult {
    Opened { document: OpenedDocument },
    Search { summary: SearchSummary },
    Closed { state: SessionState },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeReply {
    pub request_id: Uuid,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BridgeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl BridgeReply {
    fn success(request_id: Uuid, result: BridgeResult) -> Self {
        Self {
            request_id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(request_id: Uuid, error: ErrorBody) -> Self {
        Self {
            request_id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Service
// ============================================================================

struct Envelope {
    request: BridgeRequest,
    reply: oneshot::Sender<BridgeReply>,
}

/// Starts the dispatcher task for a controller
pub struct BridgeService;

impl BridgeService {
    /// Spawn the dispatcher; it stops once every handle is dropped
    pub fn start(controller: SessionController) -> BridgeHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(dispatch(controller, rx));
        BridgeHandle { tx }
    }
}

async fn dispatch(controller: SessionController, mut rx: mpsc::Receiver<Envelope>) {
    tracing::debug!("Bridge dispatcher started");

    while let Some(Envelope { request, reply }) = rx.recv().await {
        let controller = controller.clone();
        tokio::spawn(async move {
            let request_id = request.request_id;
            let response = execute(&controller, request).await;
            if reply.send(response).is_err() {
                tracing::debug!(request = %request_id, "Bridge caller went away before reply");
            }
        });
    }

    controller.close();
    tracing::debug!("Bridge dispatcher stopped");
}

async fn execute(controller: &SessionController, request: BridgeRequest) -> BridgeReply {
    let id = request.request_id;
    tracing::debug!(request = %id, command = ?request.command, "Bridge request");

    let outcome = match request.command {
        BridgeCommand::AcquireAndOpen { url } => controller
            .acquire_and_open(&url)
            .await
            .map(|document| BridgeResult::Opened { document }),
        BridgeCommand::Search { query } => controller
            .search(&query)
            .await
            .map(|summary| BridgeResult::Search { summary }),
        BridgeCommand::Navigate { direction } => controller
            .navigate(direction)
            .await
            .map(|summary| BridgeResult::Search { summary }),
        BridgeCommand::Close => {
            controller.close();
            Ok(BridgeResult::Closed {
                state: controller.state(),
            })
        }
    };

    match outcome {
        Ok(result) => BridgeReply::success(id, result),
        Err(e) => BridgeReply::failure(id, ErrorBody::from(&e)),
    }
}

/// Cloneable sender side of the bridge
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeHandle {
    /// Submit a request and wait for its reply
    pub async fn send(&self, request: BridgeRequest) -> Result<BridgeReply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BridgeError::Stopped)?;
        reply_rx.await.map_err(|_| BridgeError::Stopped)
    }

    /// Run a command under a fresh request id
    ///
    /// Bridge failures come back as an error reply rather than an `Err`.
    pub async fn call(&self, command: BridgeCommand) -> BridgeReply {
        let request = BridgeRequest::new(command);
        let id = request.request_id;
        match self.send(request).await {
            Ok(reply) => reply,
            Err(e) => BridgeReply::failure(id, ErrorBody::from(&e)),
        }
    }

    /// Handle one JSON-encoded request and return the JSON reply
    pub async fn call_json(&self, raw: &str) -> String {
        let reply = match serde_json::from_str::<BridgeRequest>(raw) {
            Ok(request) => {
                let id = request.request_id;
                self.send(request)
                    .await
                    .unwrap_or_else(|e| BridgeReply::failure(id, ErrorBody::from(&e)))
            }
            Err(e) => BridgeReply::failure(
                Uuid::nil(),
                ErrorBody::from(&BridgeError::BadRequest(e.to_string())),
            ),
        };

        reply.to_json().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode bridge reply");
            format!(
                "{{\"requestId\":\"{}\",\"ok\":false,\"error\":{{\"kind\":\"encode_failed\",\"message\":\"Failed to encode reply\"}}}}",
                reply.request_id
            )
        })
    }
}
