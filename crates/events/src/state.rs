//! World-model state and the pure event reducer
//!
//! [`VisualState`] is the projection of everything the pipeline currently
//! believes about the meeting surface. [`reduce`] rebuilds that belief
//! from an event log alone, independently of the detector that emitted
//! the log, so any state can be reconstructed by replay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use visual_delta_common::{AudioSid, BBox, LayoutType, RegionKind, Vid};

use crate::{EventKind, VisualEvent};

/// Resolved per-handle signals (absent booleans resolved to `false`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VidSignals {
    pub hand_raised: bool,
    pub camera_on: bool,
    pub is_active_speaker: bool,
    pub is_presenting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_hash: Option<String>,
}

/// World-model projection of one continuity handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VidState {
    pub vid: Vid,
    pub last_seen_ms: i64,
    pub bbox: BBox,
    pub kind: RegionKind,
    pub signals: VidSignals,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_sid: Option<AudioSid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Top-level screen-share status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenShareState {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vid: Option<Vid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_hash: Option<String>,
}

/// The world model: everything currently believed about the meeting surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    /// Live handles, iterated in ascending vid order
    pub vids: BTreeMap<Vid, VidState>,
    pub screen_share: ScreenShareState,
    pub layout: LayoutType,
    /// Derived scalar: always equals the count of handles with
    /// `signals.hand_raised == true`. Recomputed after every mutation.
    pub hand_raised_count: usize,
    pub last_snapshot_ms: i64,
    pub snapshot_count: u64,
}

impl VisualState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of participant tiles currently tracked
    pub fn participant_count(&self) -> usize {
        self.vids
            .values()
            .filter(|v| v.kind == RegionKind::Tile)
            .count()
    }

    /// Recompute `hand_raised_count` from signals. The cached value is
    /// never trusted across mutations.
    pub fn recount_hands(&mut self) {
        self.hand_raised_count = self
            .vids
            .values()
            .filter(|v| v.signals.hand_raised)
            .count();
    }
}

/// Pure event reducer: apply one event to a state, yielding the next.
///
/// Unknown event variants leave the state untouched, so a reducer built
/// against an older schema can replay a newer log.
pub fn reduce(mut state: VisualState, event: &VisualEvent) -> VisualState {
    match &event.kind {
        EventKind::SnapshotReceived { .. } => {
            state.last_snapshot_ms = event.ts_obs_ms;
            state.snapshot_count += 1;
        }
        EventKind::VidAppeared { vid, kind, bbox } => {
            state.vids.insert(
                *vid,
                VidState {
                    vid: *vid,
                    last_seen_ms: event.ts_obs_ms,
                    bbox: *bbox,
                    kind: *kind,
                    signals: VidSignals::default(),
                    confidence: event.confidence,
                    audio_sid: None,
                    fingerprint: None,
                },
            );
        }
        EventKind::VidDisappeared { vid } => {
            state.vids.remove(vid);
            if state.screen_share.vid == Some(*vid) {
                state.screen_share = ScreenShareState::default();
            }
            state.recount_hands();
        }
        EventKind::HandRaised { vid, bbox } => {
            if let Some(entry) = state.vids.get_mut(vid) {
                entry.signals.hand_raised = true;
                entry.bbox = *bbox;
                entry.last_seen_ms = event.ts_obs_ms;
            }
            state.recount_hands();
        }
        EventKind::HandLowered { vid, bbox } => {
            if let Some(entry) = state.vids.get_mut(vid) {
                entry.signals.hand_raised = false;
                entry.bbox = *bbox;
                entry.last_seen_ms = event.ts_obs_ms;
            }
            state.recount_hands();
        }
        EventKind::ScreenShareStarted { vid } => {
            let slide_hash = state.vids.get_mut(vid).and_then(|entry| {
                entry.signals.is_presenting = true;
                entry.signals.slide_hash.clone()
            });
            state.screen_share = ScreenShareState {
                active: true,
                vid: Some(*vid),
                slide_hash,
            };
        }
        EventKind::ScreenShareStopped { vid } => {
            if let Some(entry) = state.vids.get_mut(vid) {
                entry.signals.is_presenting = false;
            }
            if state.screen_share.vid == Some(*vid) {
                state.screen_share = ScreenShareState::default();
            }
        }
        EventKind::SlideChanged { vid, to_hash, .. } => {
            if let Some(entry) = state.vids.get_mut(vid) {
                entry.signals.slide_hash = Some(to_hash.clone());
            }
            if state.screen_share.vid == Some(*vid) {
                state.screen_share.slide_hash = Some(to_hash.clone());
            }
        }
        EventKind::LayoutChanged { to, .. } => {
            state.layout = *to;
        }
        EventKind::AudioVideoLink { vid, audio_sid } => {
            if let Some(entry) = state.vids.get_mut(vid) {
                entry.audio_sid = Some(audio_sid.clone());
            }
        }
        EventKind::Unknown => {}
    }

    state
}
