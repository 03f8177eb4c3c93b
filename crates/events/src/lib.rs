//! Event schema and factory for the visual-delta pipeline
//!
//! Every observable transition of the meeting surface is an immutable,
//! ID-stamped [`VisualEvent`]. Events are minted through an
//! [`EventFactory`] owned by one session, so ids are strictly monotonic
//! within that session and never collide across sessions.
//!
//! The wire format is `{id, ts_emit_ms, ts_obs_ms, source, confidence,
//! type, payload}`; unrecognized `type` values deserialize to
//! [`EventKind::Unknown`] so downstream reducers treat schema drift as a
//! no-op instead of an error.

pub mod state;

pub use state::{reduce, ScreenShareState, VidSignals, VidState, VisualState};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use visual_delta_common::{AudioSid, BBox, LayoutType, RegionKind, Vid};

/// Source tag carried by every event of this pipeline
pub const EVENT_SOURCE: &str = "visual_delta";

/// Injectable wall clock returning unix milliseconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// The default clock: system time in unix milliseconds
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    })
}

/// Type and payload of a visual transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    SnapshotReceived {
        content_hash: String,
        width: u32,
        height: u32,
        region_count: usize,
    },
    VidAppeared {
        vid: Vid,
        kind: RegionKind,
        bbox: BBox,
    },
    VidDisappeared {
        vid: Vid,
    },
    HandRaised {
        vid: Vid,
        bbox: BBox,
    },
    HandLowered {
        vid: Vid,
        bbox: BBox,
    },
    ScreenShareStarted {
        vid: Vid,
    },
    ScreenShareStopped {
        vid: Vid,
    },
    SlideChanged {
        vid: Vid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_hash: Option<String>,
        to_hash: String,
    },
    LayoutChanged {
        from: LayoutType,
        to: LayoutType,
    },
    AudioVideoLink {
        vid: Vid,
        audio_sid: AudioSid,
    },
    /// Forward-compatibility catch-all for unrecognized wire types
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Stable wire name of the event type
    pub fn name(&self) -> &'static str {
        match self {
            Self::SnapshotReceived { .. } => "snapshot_received",
            Self::VidAppeared { .. } => "vid_appeared",
            Self::VidDisappeared { .. } => "vid_disappeared",
            Self::HandRaised { .. } => "hand_raised",
            Self::HandLowered { .. } => "hand_lowered",
            Self::ScreenShareStarted { .. } => "screen_share_started",
            Self::ScreenShareStopped { .. } => "screen_share_stopped",
            Self::SlideChanged { .. } => "slide_changed",
            Self::LayoutChanged { .. } => "layout_changed",
            Self::AudioVideoLink { .. } => "audio_video_link",
            Self::Unknown => "unknown",
        }
    }
}

/// An immutable, ID-stamped visual transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEvent {
    /// Per-session monotonic id, assigned at construction
    pub id: u64,
    /// When the event was emitted (wall clock)
    pub ts_emit_ms: i64,
    /// When the underlying snapshot was observed
    pub ts_obs_ms: i64,
    /// Always [`EVENT_SOURCE`]
    pub source: String,
    pub confidence: f32,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl VisualEvent {
    /// Stable wire name of the event type
    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }
}

/// Mints [`VisualEvent`]s with session-monotonic ids.
///
/// One factory per session. The emit clock is injectable so tests are
/// deterministic.
pub struct EventFactory {
    next_id: u64,
    clock: Clock,
}

impl EventFactory {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { next_id: 1, clock }
    }

    /// Construct the next event. Ids are strictly increasing per factory.
    pub fn emit(&mut self, kind: EventKind, ts_obs_ms: i64, confidence: f32) -> VisualEvent {
        let id = self.next_id;
        self.next_id += 1;
        VisualEvent {
            id,
            ts_emit_ms: (self.clock)(),
            ts_obs_ms,
            source: EVENT_SOURCE.to_string(),
            confidence,
            kind,
        }
    }

    /// Restore the factory to its initial state (ids restart at 1)
    pub fn reset(&mut self) {
        self.next_id = 1;
    }
}

impl Default for EventFactory {
    fn default() -> Self {
        Self::new()
    }
}
