//! HTTP and WebSocket request handlers

use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Path, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use visual_delta_common::LayoutType;
use visual_delta_detector::SnapshotMeta;

use crate::{
    ApiState, HealthResponse, SessionHandle, SnapshotRequest, SnapshotResponse, StreamMessage,
};

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Submit one snapshot for a call.
///
/// The image bytes are checked for well-formedness and dropped; only the
/// client analysis (regions + layout) feeds the pipeline. Emitted events
/// are fanned out to the call's WebSocket subscribers and returned in the
/// response together with the new state.
pub async fn submit_snapshot(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SnapshotRequest>,
) -> (StatusCode, Json<SnapshotResponse>) {
    if let Err(response) = check_auth(&state, &headers) {
        return response;
    }
    if let Err(response) = validate_request(&request) {
        return response;
    }

    let session = state.session(&call_id).await;
    let now_ms = state.now_ms();

    let (regions, layout) = match request.client_analysis {
        Some(analysis) => (analysis.regions, analysis.layout),
        None => (Vec::new(), LayoutType::Unknown),
    };
    let meta = SnapshotMeta {
        ts_obs_ms: request.ts_obs_ms,
        content_hash: request.content_hash,
        width: request.width,
        height: request.height,
    };

    let processed = {
        let mut pipeline = session.pipeline.lock().await;
        pipeline.process_snapshot(&regions, layout, &meta, now_ms)
    };

    info!(
        "Snapshot for call {call_id}: {} regions, {} events",
        regions.len(),
        processed.events.len()
    );

    if !processed.events.is_empty() {
        // Send errors only mean nobody is subscribed right now
        let _ = session.events_tx.send(StreamMessage::VisualEvents {
            events: processed.events.clone(),
        });
    }

    (
        StatusCode::OK,
        Json(SnapshotResponse {
            success: true,
            events: processed.events,
            state: Some(processed.state),
            error: None,
        }),
    )
}

/// WebSocket event stream for a call.
///
/// Sends a `visual_state_sync` with the current state on connect, then
/// forwards `visual_events` batches as snapshots arrive.
pub async fn event_stream(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let session = state.session(&call_id).await;
    ws.on_upgrade(move |socket| stream_events(socket, session, call_id))
}

async fn stream_events(mut socket: WebSocket, session: Arc<SessionHandle>, call_id: String) {
    debug!("Event stream subscriber connected for call {call_id}");
    let mut events_rx = session.events_tx.subscribe();

    let sync = {
        let pipeline = session.pipeline.lock().await;
        StreamMessage::VisualStateSync {
            state: pipeline.state().clone(),
        }
    };
    if send_message(&mut socket, &sync).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            received = events_rx.recv() => match received {
                Ok(message) => {
                    if send_message(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream for call {call_id} lagged by {skipped} messages");
                    let error = StreamMessage::VisualError {
                        error: format!("stream lagged, {skipped} messages dropped"),
                    };
                    if send_message(&mut socket, &error).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // Subscribers only listen; tolerate pings and stray frames
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    debug!("Event stream subscriber disconnected for call {call_id}");
}

async fn send_message(socket: &mut WebSocket, message: &StreamMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(error) => {
            warn!("Failed to serialize stream message: {error}");
            Ok(())
        }
    }
}

type HandlerError = (StatusCode, Json<SnapshotResponse>);

fn check_auth(state: &ApiState, headers: &HeaderMap) -> Result<(), HandlerError> {
    let Some(expected) = &state.config().auth_token else {
        return Ok(());
    };

    let provided = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(SnapshotResponse::failure("unauthorized")),
        ))
    }
}

fn validate_request(request: &SnapshotRequest) -> Result<(), HandlerError> {
    if !is_valid_content_hash(&request.content_hash) {
        return Err(bad_request(format!(
            "content_hash must be 8 lowercase hex chars, got {:?}",
            request.content_hash
        )));
    }
    if request.width == 0 || request.height == 0 {
        return Err(bad_request("width and height must be positive"));
    }
    // Well-formedness check only; the decoded bytes are dropped on the
    // spot and never reach the pipeline.
    match base64::engine::general_purpose::STANDARD.decode(&request.bytes_base64) {
        Ok(bytes) if !bytes.is_empty() => {
            debug!("Snapshot payload: {} bytes (discarded)", bytes.len());
            Ok(())
        }
        Ok(_) => Err(bad_request("bytes_base64 must not be empty")),
        Err(error) => Err(bad_request(format!("bytes_base64 is not valid base64: {error}"))),
    }
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(SnapshotResponse::failure(message)),
    )
}

fn is_valid_content_hash(hash: &str) -> bool {
    hash.len() == 8
        && hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
