//! API request, response, and stream message types

use serde::{Deserialize, Serialize};
use visual_delta_common::{DetectedRegion, LayoutType};
use visual_delta_events::{VisualEvent, VisualState};

/// Accepted snapshot encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotMime {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

/// Client-side analysis shipped alongside the snapshot bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAnalysis {
    pub regions: Vec<DetectedRegion>,
    pub layout: LayoutType,
}

/// Snapshot submission request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRequest {
    /// When the snapshot was observed (unix ms)
    pub ts_obs_ms: i64,
    /// 8 lowercase hex characters
    pub content_hash: String,
    pub mime: SnapshotMime,
    pub width: u32,
    pub height: u32,
    /// Composite image bytes. Validated for well-formedness only; the
    /// server never decodes or stores them.
    pub bytes_base64: String,
    #[serde(default)]
    pub client_analysis: Option<ClientAnalysis>,
}

/// Snapshot submission response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub success: bool,
    pub events: Vec<VisualEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<VisualState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            events: Vec::new(),
            state: None,
            error: Some(error.into()),
        }
    }
}

/// Messages carried on the event-stream WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    VisualEvents { events: Vec<VisualEvent> },
    VisualStateSync { state: VisualState },
    VisualError { error: String },
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
