//! Delta detection over snapshot sequences
//!
//! Consumes one snapshot's regions per tick, runs the continuity tracker,
//! and turns raw per-region signals into debounced, deduplicated
//! [`VisualEvent`]s plus a rebuilt [`VisualState`] world model.
//!
//! A boolean signal change must persist across `debounce_snapshots`
//! consecutive snapshots before an event fires; any reversion to the
//! confirmed value cancels the pending change. This yields at most one
//! event per true edge under noisy input.
//!
//! Emission order within one call is deterministic: `snapshot_received`,
//! all `vid_appeared` (input order), all `vid_disappeared`, per-region
//! signal transitions (input order, booleans before slide hash), then
//! `layout_changed`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use visual_delta_common::{DetectedRegion, LayoutType, Vid};
use visual_delta_events::{
    EventFactory, EventKind, ScreenShareState, VidSignals, VidState, VisualEvent, VisualState,
};
use visual_delta_tracker::{TrackerConfig, VidTracker};

/// Delta detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Consecutive snapshots a boolean change must persist before an
    /// event fires (default: 2)
    pub debounce_snapshots: u32,
    /// Embedded continuity tracker configuration
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            debounce_snapshots: 2,
            tracker: TrackerConfig::default(),
        }
    }
}

/// Metadata of one snapshot submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub ts_obs_ms: i64,
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
}

/// Result of one [`DeltaDetector::compute_deltas`] call
#[derive(Debug, Clone)]
pub struct DeltaOutcome {
    pub next_state: VisualState,
    pub events: Vec<VisualEvent>,
}

/// Debounced boolean signal fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SignalField {
    HandRaised,
    IsPresenting,
}

#[derive(Debug, Clone)]
struct PendingSignal {
    value: bool,
    seen_count: u32,
    #[allow(dead_code)]
    first_seen_ms: i64,
}

/// Turns snapshot sequences into debounced transition events and a
/// rebuilt world state
pub struct DeltaDetector {
    config: DetectorConfig,
    tracker: VidTracker,
    pending: HashMap<(Vid, SignalField), PendingSignal>,
    confirmed: HashMap<(Vid, SignalField), bool>,
    confirmed_slides: HashMap<Vid, String>,
    previous_layout: LayoutType,
}

impl DeltaDetector {
    pub fn new(config: DetectorConfig) -> Self {
        let tracker = VidTracker::new(config.tracker.clone());
        Self {
            config,
            tracker,
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            confirmed_slides: HashMap::new(),
            previous_layout: LayoutType::Unknown,
        }
    }

    /// Process one snapshot tick.
    ///
    /// Events are minted through `factory` so ids stay monotonic across
    /// the whole session, not just this call.
    pub fn compute_deltas(
        &mut self,
        factory: &mut EventFactory,
        prev_state: &VisualState,
        regions: &[DetectedRegion],
        detected_layout: LayoutType,
        now_ms: i64,
        meta: &SnapshotMeta,
    ) -> DeltaOutcome {
        let ts_obs = meta.ts_obs_ms;
        let mut events = Vec::with_capacity(regions.len() + 2);

        events.push(factory.emit(
            EventKind::SnapshotReceived {
                content_hash: meta.content_hash.clone(),
                width: meta.width,
                height: meta.height,
                region_count: regions.len(),
            },
            ts_obs,
            1.0,
        ));

        let outcome = self.tracker.process_regions(regions, now_ms);

        for vid in &outcome.appeared {
            if let Some(entry) = self.tracker.entry(*vid) {
                events.push(factory.emit(
                    EventKind::VidAppeared {
                        vid: *vid,
                        kind: entry.kind,
                        bbox: entry.bbox,
                    },
                    ts_obs,
                    entry.confidence,
                ));
            }
        }

        for vid in &outcome.expired {
            events.push(factory.emit(EventKind::VidDisappeared { vid: *vid }, ts_obs, 1.0));
            self.purge(*vid);
        }

        for (region_index, vid) in &outcome.assignments {
            let region = &regions[*region_index];
            let confidence = self
                .tracker
                .entry(*vid)
                .map_or(1.0, |entry| entry.confidence);

            // Booleans first, slide hash after
            let hand = region.signals.hand_raised.unwrap_or(false);
            if let Some(raised) = self.debounce(*vid, SignalField::HandRaised, hand, now_ms) {
                let kind = if raised {
                    EventKind::HandRaised { vid: *vid, bbox: region.bbox }
                } else {
                    EventKind::HandLowered { vid: *vid, bbox: region.bbox }
                };
                events.push(factory.emit(kind, ts_obs, confidence));
            }

            let presenting = region.signals.is_presenting.unwrap_or(false);
            if let Some(started) = self.debounce(*vid, SignalField::IsPresenting, presenting, now_ms)
            {
                if started {
                    // Seed the slide baseline so the hash visible at share
                    // start does not fire a slide_changed of its own.
                    if let Some(hash) = non_empty(&region.signals.slide_hash) {
                        self.confirmed_slides.insert(*vid, hash.to_string());
                    }
                    events.push(factory.emit(EventKind::ScreenShareStarted { vid: *vid }, ts_obs, confidence));
                } else {
                    events.push(factory.emit(EventKind::ScreenShareStopped { vid: *vid }, ts_obs, confidence));
                }
            }

            if self.confirmed_bool(*vid, SignalField::IsPresenting) {
                if let Some(hash) = non_empty(&region.signals.slide_hash) {
                    if self.confirmed_slides.get(vid).map(String::as_str) != Some(hash) {
                        let from_hash = self.confirmed_slides.insert(*vid, hash.to_string());
                        events.push(factory.emit(
                            EventKind::SlideChanged {
                                vid: *vid,
                                from_hash,
                                to_hash: hash.to_string(),
                            },
                            ts_obs,
                            confidence,
                        ));
                    }
                }
            }
        }

        if detected_layout != LayoutType::Unknown && detected_layout != self.previous_layout {
            events.push(factory.emit(
                EventKind::LayoutChanged {
                    from: self.previous_layout,
                    to: detected_layout,
                },
                ts_obs,
                1.0,
            ));
            self.previous_layout = detected_layout;
        }

        let next_state = self.project_state(prev_state, regions, &outcome.assignments, now_ms);

        debug!(
            "Snapshot at {now_ms}ms: {} regions, {} events, {} live vids",
            regions.len(),
            events.len(),
            next_state.vids.len()
        );

        DeltaOutcome { next_state, events }
    }

    /// Restore the detector (including its tracker) to the initial state
    pub fn reset(&mut self) {
        self.tracker = VidTracker::new(self.config.tracker.clone());
        self.pending.clear();
        self.confirmed.clear();
        self.confirmed_slides.clear();
        self.previous_layout = LayoutType::Unknown;
    }

    /// Apply one observation to the debounce state machine.
    ///
    /// Returns `Some(target)` when a transition is confirmed, otherwise
    /// `None`.
    fn debounce(&mut self, vid: Vid, field: SignalField, incoming: bool, now_ms: i64) -> Option<bool> {
        let key = (vid, field);
        let confirmed = self.confirmed.get(&key).copied().unwrap_or(false);

        if incoming == confirmed {
            // Reversion to the confirmed value cancels any pending change
            self.pending.remove(&key);
            return None;
        }

        let seen_count = match self.pending.get_mut(&key) {
            Some(pending) if pending.value == incoming => {
                pending.seen_count += 1;
                pending.seen_count
            }
            _ => {
                self.pending.insert(
                    key,
                    PendingSignal {
                        value: incoming,
                        seen_count: 1,
                        first_seen_ms: now_ms,
                    },
                );
                1
            }
        };

        if seen_count >= self.config.debounce_snapshots {
            self.pending.remove(&key);
            self.confirmed.insert(key, incoming);
            Some(incoming)
        } else {
            None
        }
    }

    fn confirmed_bool(&self, vid: Vid, field: SignalField) -> bool {
        self.confirmed.get(&(vid, field)).copied().unwrap_or(false)
    }

    /// Drop all debounce and slide state for a departed handle
    fn purge(&mut self, vid: Vid) {
        self.pending.retain(|(v, _), _| *v != vid);
        self.confirmed.retain(|(v, _), _| *v != vid);
        self.confirmed_slides.remove(&vid);
    }

    /// Rebuild the world state from the tracker's live entries.
    ///
    /// Covers every live entry, not just the regions assigned this call:
    /// a handle that misses one snapshot keeps its confirmed signals until
    /// it either returns or expires with a `vid_disappeared`.
    fn project_state(
        &self,
        prev_state: &VisualState,
        regions: &[DetectedRegion],
        assignments: &[(usize, Vid)],
        now_ms: i64,
    ) -> VisualState {
        let assigned: HashMap<Vid, usize> =
            assignments.iter().map(|(index, vid)| (*vid, *index)).collect();

        let mut next = VisualState::new();

        for entry in self.tracker.entries() {
            let vid = entry.vid;
            let region = assigned.get(&vid).map(|index| &regions[*index]);
            let previous = prev_state.vids.get(&vid);

            let is_presenting = self.confirmed_bool(vid, SignalField::IsPresenting);
            let signals = VidSignals {
                hand_raised: self.confirmed_bool(vid, SignalField::HandRaised),
                is_presenting,
                camera_on: match region {
                    Some(r) => r.signals.camera_on.unwrap_or(false),
                    None => previous.map_or(false, |p| p.signals.camera_on),
                },
                is_active_speaker: match region {
                    Some(r) => r.signals.is_active_speaker.unwrap_or(false),
                    None => previous.map_or(false, |p| p.signals.is_active_speaker),
                },
                slide_hash: if is_presenting {
                    self.confirmed_slides.get(&vid).cloned()
                } else {
                    None
                },
            };

            next.vids.insert(
                vid,
                VidState {
                    vid,
                    last_seen_ms: entry.last_seen_ms,
                    bbox: entry.bbox,
                    kind: entry.kind,
                    signals,
                    confidence: entry.confidence,
                    audio_sid: previous.and_then(|p| p.audio_sid.clone()),
                    fingerprint: Some(entry.fingerprint.clone()),
                },
            );
        }

        // First presenter in ascending vid order owns the share
        next.screen_share = next
            .vids
            .values()
            .find(|v| v.signals.is_presenting)
            .map(|presenter| ScreenShareState {
                active: true,
                vid: Some(presenter.vid),
                slide_hash: presenter.signals.slide_hash.clone(),
            })
            .unwrap_or_default();

        next.recount_hands();
        next.layout = self.previous_layout;
        next.last_snapshot_ms = now_ms;
        next.snapshot_count = prev_state.snapshot_count + 1;
        next
    }
}

fn non_empty(hash: &Option<String>) -> Option<&str> {
    hash.as_deref().filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use visual_delta_common::{BBox, RegionKind, RegionSignals};
    use visual_delta_events::Clock;

    fn fixed_clock() -> Clock {
        Arc::new(|| 0)
    }

    fn detector() -> (DeltaDetector, EventFactory) {
        (
            DeltaDetector::new(DetectorConfig::default()),
            EventFactory::with_clock(fixed_clock()),
        )
    }

    fn meta(ts_obs_ms: i64) -> SnapshotMeta {
        SnapshotMeta {
            ts_obs_ms,
            content_hash: "0badc0de".to_string(),
            width: 640,
            height: 360,
        }
    }

    fn tile(signals: RegionSignals) -> DetectedRegion {
        DetectedRegion {
            bbox: BBox::new(0.0, 0.0, 0.5, 0.5),
            kind: RegionKind::Tile,
            fingerprint: "POS:0055".to_string(),
            signals,
        }
    }

    fn hand_raised_tile(raised: bool) -> DetectedRegion {
        tile(RegionSignals {
            hand_raised: Some(raised),
            ..Default::default()
        })
    }

    fn presenting_tile(slide_hash: Option<&str>) -> DetectedRegion {
        tile(RegionSignals {
            is_presenting: Some(true),
            slide_hash: slide_hash.map(str::to_string),
            ..Default::default()
        })
    }

    fn event_names(events: &[VisualEvent]) -> Vec<&'static str> {
        events.iter().map(VisualEvent::event_type).collect()
    }

    fn count(events: &[VisualEvent], name: &str) -> usize {
        events.iter().filter(|e| e.event_type() == name).count()
    }

    #[test]
    fn test_first_snapshot_emits_appearance() {
        let (mut detector, mut factory) = detector();
        let state = VisualState::new();
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[hand_raised_tile(true)],
            LayoutType::Unknown,
            1000,
            &meta(1000),
        );

        assert_eq!(event_names(&outcome.events), vec!["snapshot_received", "vid_appeared"]);
        assert_eq!(outcome.next_state.vids.len(), 1);
        assert_eq!(outcome.next_state.snapshot_count, 1);
    }

    #[test]
    fn test_hand_raise_debounces_to_one_event() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        // Snapshot 1: pending only
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[hand_raised_tile(true)],
            LayoutType::Unknown,
            1000,
            &meta(1000),
        );
        assert_eq!(count(&outcome.events, "hand_raised"), 0);
        state = outcome.next_state;

        // Snapshot 2: confirmed
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[hand_raised_tile(true)],
            LayoutType::Unknown,
            2000,
            &meta(2000),
        );
        assert_eq!(count(&outcome.events, "hand_raised"), 1);
        state = outcome.next_state;
        assert_eq!(state.hand_raised_count, 1);

        // Ten further identical snapshots: still exactly one edge
        let mut total = 1;
        for tick in 0..10 {
            let now = 3000 + tick * 1000;
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            total += count(&outcome.events, "hand_raised");
            state = outcome.next_state;
        }
        assert_eq!(total, 1);
    }

    #[test]
    fn test_flicker_cancels_pending_change() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        for (now, raised) in [(1000, true), (2000, false), (3000, true), (4000, false)] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(raised)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            assert_eq!(count(&outcome.events, "hand_raised"), 0);
            assert_eq!(count(&outcome.events, "hand_lowered"), 0);
            state = outcome.next_state;
        }
        assert_eq!(state.hand_raised_count, 0);
    }

    #[test]
    fn test_lowering_emits_after_debounce() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        let sequence = [
            (1000, true, 0, 0),
            (2000, true, 1, 0), // raised confirmed
            (3000, false, 0, 0),
            (4000, false, 0, 1), // lowered confirmed
        ];
        for (now, raised, expect_raised, expect_lowered) in sequence {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(raised)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            assert_eq!(count(&outcome.events, "hand_raised"), expect_raised, "at {now}");
            assert_eq!(count(&outcome.events, "hand_lowered"), expect_lowered, "at {now}");
            state = outcome.next_state;
        }
    }

    #[test]
    fn test_debounce_of_one_fires_immediately() {
        let config = DetectorConfig {
            debounce_snapshots: 1,
            ..Default::default()
        };
        let mut detector = DeltaDetector::new(config);
        let mut factory = EventFactory::with_clock(fixed_clock());
        let state = VisualState::new();

        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[hand_raised_tile(true)],
            LayoutType::Unknown,
            1000,
            &meta(1000),
        );
        assert_eq!(count(&outcome.events, "hand_raised"), 1);
    }

    #[test]
    fn test_screen_share_and_slide_change() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        // Snapshots 1 and 2 confirm the share; the slide seen at
        // confirmation is the baseline, not a change.
        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[presenting_tile(Some("a"))],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            if now == 2000 {
                assert_eq!(count(&outcome.events, "screen_share_started"), 1);
            }
            assert_eq!(count(&outcome.events, "slide_changed"), 0);
            state = outcome.next_state;
        }
        assert!(state.screen_share.active);
        assert_eq!(state.screen_share.slide_hash.as_deref(), Some("a"));

        // Snapshot 3: new slide hash fires exactly once
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[presenting_tile(Some("b"))],
            LayoutType::Unknown,
            3000,
            &meta(3000),
        );
        let slides: Vec<_> = outcome
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::SlideChanged { from_hash, to_hash, .. } => {
                    Some((from_hash.clone(), to_hash.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(slides, vec![(Some("a".to_string()), "b".to_string())]);
        state = outcome.next_state;

        // Snapshot 4: same hash, no further event
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[presenting_tile(Some("b"))],
            LayoutType::Unknown,
            4000,
            &meta(4000),
        );
        assert_eq!(count(&outcome.events, "slide_changed"), 0);
    }

    #[test]
    fn test_slide_hash_ignored_without_confirmed_share() {
        let (mut detector, mut factory) = detector();
        let state = VisualState::new();

        // Presenting is only pending on the first snapshot
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[presenting_tile(Some("a"))],
            LayoutType::Unknown,
            1000,
            &meta(1000),
        );
        assert_eq!(count(&outcome.events, "slide_changed"), 0);
        assert!(!outcome.next_state.screen_share.active);
    }

    #[test]
    fn test_late_first_slide_hash_fires_without_from() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        // Share confirms with no hash at all
        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[presenting_tile(None)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            state = outcome.next_state;
        }

        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[presenting_tile(Some("x"))],
            LayoutType::Unknown,
            3000,
            &meta(3000),
        );
        let slides: Vec<_> = outcome
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::SlideChanged { from_hash, to_hash, .. } => {
                    Some((from_hash.clone(), to_hash.clone()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(slides, vec![(None, "x".to_string())]);
    }

    #[test]
    fn test_expiry_emits_disappearance_and_purges() {
        let config = DetectorConfig {
            tracker: TrackerConfig {
                expire_ms: 5000,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut detector = DeltaDetector::new(config);
        let mut factory = EventFactory::with_clock(fixed_clock());
        let mut state = VisualState::new();

        // Confirm a raised hand first
        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            state = outcome.next_state;
        }
        assert_eq!(state.hand_raised_count, 1);

        // Silent past the expiry window
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[],
            LayoutType::Unknown,
            9000,
            &meta(9000),
        );
        assert_eq!(count(&outcome.events, "vid_disappeared"), 1);
        assert!(outcome.next_state.vids.is_empty());
        assert_eq!(outcome.next_state.hand_raised_count, 0);
    }

    #[test]
    fn test_unseen_vid_within_window_keeps_state() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            state = outcome.next_state;
        }

        // One empty snapshot well inside the expiry window
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[],
            LayoutType::Unknown,
            3000,
            &meta(3000),
        );
        assert_eq!(count(&outcome.events, "vid_disappeared"), 0);
        assert_eq!(outcome.next_state.vids.len(), 1);
        assert_eq!(outcome.next_state.hand_raised_count, 1);
    }

    #[test]
    fn test_layout_change_emits_once() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[],
            LayoutType::Grid,
            1000,
            &meta(1000),
        );
        assert_eq!(count(&outcome.events, "layout_changed"), 1);
        assert_eq!(outcome.next_state.layout, LayoutType::Grid);
        state = outcome.next_state;

        // Same layout again: silent
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[],
            LayoutType::Grid,
            2000,
            &meta(2000),
        );
        assert_eq!(count(&outcome.events, "layout_changed"), 0);
        state = outcome.next_state;

        // Unknown never emits and never clobbers the last known layout
        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[],
            LayoutType::Unknown,
            3000,
            &meta(3000),
        );
        assert_eq!(count(&outcome.events, "layout_changed"), 0);
        assert_eq!(outcome.next_state.layout, LayoutType::Grid);
    }

    #[test]
    fn test_emission_order_is_deterministic() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Unknown,
                now,
                &meta(now),
            );
            state = outcome.next_state;
        }

        let outcome = detector.compute_deltas(
            &mut factory,
            &state,
            &[hand_raised_tile(true)],
            LayoutType::Speaker,
            3000,
            &meta(3000),
        );
        // snapshot_received always first, layout_changed always last
        let names = event_names(&outcome.events);
        assert_eq!(names.first(), Some(&"snapshot_received"));
        assert_eq!(names.last(), Some(&"layout_changed"));
    }

    #[test]
    fn test_event_ids_monotonic_across_snapshots() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();
        let mut last_id = 0;

        for now in [1000, 2000, 3000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Grid,
                now,
                &meta(now),
            );
            for event in &outcome.events {
                assert!(event.id > last_id);
                last_id = event.id;
            }
            state = outcome.next_state;
        }
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let (mut detector, mut factory) = detector();
        let mut state = VisualState::new();

        for now in [1000, 2000] {
            let outcome = detector.compute_deltas(
                &mut factory,
                &state,
                &[hand_raised_tile(true)],
                LayoutType::Grid,
                now,
                &meta(now),
            );
            state = outcome.next_state;
        }

        detector.reset();
        let outcome = detector.compute_deltas(
            &mut factory,
            &VisualState::new(),
            &[hand_raised_tile(false)],
            LayoutType::Unknown,
            5000,
            &meta(5000),
        );
        // Fresh tracker mints a new handle; old confirmations are gone
        assert_eq!(count(&outcome.events, "vid_appeared"), 1);
        assert_eq!(outcome.next_state.layout, LayoutType::Unknown);
        assert_eq!(outcome.next_state.hand_raised_count, 0);
    }
}
