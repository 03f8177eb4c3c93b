//! HTTP + WebSocket serving layer for the visual-delta pipeline
//!
//! Exposes snapshot submission and a per-call event stream. Each call id
//! owns one [`VisualPipeline`] behind a session handle; snapshot
//! submissions advance the pipeline and fan the emitted events out to
//! every WebSocket subscriber of that call.
//!
//! The server holds no durable state: snapshots are validated, fed to the
//! pipeline as pre-analyzed regions, and dropped.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use visual_delta_events::{system_clock, Clock};
use visual_delta_pipeline::{PipelineConfig, VisualPipeline};

pub use handlers::*;
pub use types::*;

/// Capacity of each session's event fan-out channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// When set, snapshot submissions must carry
    /// `Authorization: Bearer <token>`
    pub auth_token: Option<String>,
    /// Configuration applied to every new session pipeline
    pub pipeline: PipelineConfig,
}

/// One call session: its pipeline plus the event fan-out channel
pub struct SessionHandle {
    pub pipeline: Mutex<VisualPipeline>,
    pub events_tx: broadcast::Sender<StreamMessage>,
}

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
    config: Arc<ServerConfig>,
    clock: Clock,
}

impl ApiState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// State with an injected clock, for deterministic tests
    pub fn with_clock(config: ServerConfig, clock: Clock) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::with_capacity(16))),
            config: Arc::new(config),
            clock,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Milliseconds now, per the injected clock
    pub fn now_ms(&self) -> i64 {
        (self.clock)()
    }

    /// Get or create the session for a call id
    pub async fn session(&self, call_id: &str) -> Arc<SessionHandle> {
        if let Some(session) = self.sessions.read().await.get(call_id) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(call_id.to_string())
            .or_insert_with(|| {
                tracing::info!("Creating visual session for call {call_id}");
                let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
                Arc::new(SessionHandle {
                    pipeline: Mutex::new(VisualPipeline::with_clock(
                        self.config.pipeline.clone(),
                        self.clock.clone(),
                    )),
                    events_tx,
                })
            })
            .clone()
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/calls/{call_id}/visual/snapshot", post(submit_snapshot))
        .route("/v1/calls/{call_id}/visual/events", get(event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting visual-delta API server on {addr}");

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
