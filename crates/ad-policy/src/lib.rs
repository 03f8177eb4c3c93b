//! Admission control for audio-description announcements
//!
//! Decides which visual events deserve a spoken line and when it is
//! polite to speak. Admission is multi-axis: a hard allowlist, per-type
//! and global cooldowns, a verbosity filter, a bounded pending queue,
//! and live-speech overlap suppression. Every axis errs toward silence.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use visual_delta_events::VisualEvent;

/// How chatty the audio description should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Only the most important announcements (priority >= 8)
    Minimal,
    /// All allowed announcements
    #[default]
    Normal,
}

/// Event types that may ever be spoken, with their base priorities
const PRIORITIES: &[(&str, u8)] = &[
    ("screen_share_started", 10),
    ("screen_share_stopped", 9),
    ("hand_raised", 8),
    ("slide_changed", 6),
    ("hand_lowered", 5),
    ("layout_changed", 4),
    ("vid_appeared", 3),
    ("vid_disappeared", 2),
];

/// Priority floor applied by [`Verbosity::Minimal`]
const MINIMAL_PRIORITY_FLOOR: u8 = 8;

/// Announcements are suppressed this soon after live speech (ms)
const SPEECH_HANGOVER_MS: i64 = 500;

/// Live speech above this confidence blocks announcements
const SPEECH_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdPolicyConfig {
    /// Master switch; a disabled gate never speaks (default: true)
    pub enabled: bool,
    pub verbosity: Verbosity,
    /// Suppress announcements while meeting audio carries speech
    /// (default: true)
    pub avoid_speech_overlap: bool,
    /// Minimum gap between any two announcements (default: 2000)
    pub global_cooldown_ms: i64,
    /// Per-type minimum gap between announcements of the same event type.
    /// Types without an entry have no per-type cooldown.
    pub event_cooldown_ms: HashMap<String, i64>,
    /// Upper bound on queued announcements; the newest win (default: 5)
    pub max_pending_announcements: usize,
}

impl Default for AdPolicyConfig {
    fn default() -> Self {
        let mut event_cooldown_ms = HashMap::with_capacity(4);
        event_cooldown_ms.insert("hand_raised".to_string(), 5000);
        event_cooldown_ms.insert("hand_lowered".to_string(), 5000);
        event_cooldown_ms.insert("slide_changed".to_string(), 3000);
        event_cooldown_ms.insert("layout_changed".to_string(), 10_000);

        Self {
            enabled: true,
            verbosity: Verbosity::Normal,
            avoid_speech_overlap: true,
            global_cooldown_ms: 2000,
            event_cooldown_ms,
            max_pending_announcements: 5,
        }
    }
}

/// Live meeting-audio activity, as reported by the audio pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioActivity {
    pub is_speech_active: bool,
    pub confidence: f32,
    pub last_speech_ms: i64,
}

/// An event admitted by the gate, paired with its speaking priority
#[derive(Debug, Clone)]
pub struct AllowedAdEvent {
    pub event: VisualEvent,
    pub priority: u8,
}

/// The admission controller
pub struct AdPolicyGate {
    config: AdPolicyConfig,
    last_announcement_ms: Option<i64>,
    last_event_type_ms: HashMap<String, i64>,
    pending: Vec<AllowedAdEvent>,
}

impl AdPolicyGate {
    pub fn new(config: AdPolicyConfig) -> Self {
        Self {
            config,
            last_announcement_ms: None,
            last_event_type_ms: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Base priority of an event type, `0` for disallowed types
    pub fn base_priority(event_type: &str) -> u8 {
        PRIORITIES
            .iter()
            .find(|(name, _)| *name == event_type)
            .map_or(0, |(_, priority)| *priority)
    }

    fn effective_priority(&self, event_type: &str) -> u8 {
        let base = Self::base_priority(event_type);
        match self.config.verbosity {
            Verbosity::Minimal if base < MINIMAL_PRIORITY_FLOOR => 0,
            _ => base,
        }
    }

    /// Filter a batch of events down to announcement candidates.
    ///
    /// Applies the allowlist, per-type cooldowns, and the verbosity
    /// filter, returning survivors sorted by descending priority (stable,
    /// so equal priorities keep event order).
    pub fn select_candidates(&self, events: &[VisualEvent], now_ms: i64) -> Vec<AllowedAdEvent> {
        let mut candidates: Vec<AllowedAdEvent> = events
            .iter()
            .filter_map(|event| {
                let event_type = event.event_type();
                let priority = self.effective_priority(event_type);
                if priority == 0 {
                    return None;
                }

                if let Some(cooldown) = self.config.event_cooldown_ms.get(event_type) {
                    if let Some(last) = self.last_event_type_ms.get(event_type) {
                        if now_ms - last < *cooldown {
                            debug!("Suppressing {event_type} inside its {cooldown}ms cooldown");
                            return None;
                        }
                    }
                }

                Some(AllowedAdEvent {
                    event: event.clone(),
                    priority,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates
    }

    /// Append candidates to the pending queue, keeping only the newest
    /// `max_pending_announcements` when the bound is exceeded.
    pub fn queue_announcements(&mut self, candidates: Vec<AllowedAdEvent>) {
        self.pending.extend(candidates);
        let bound = self.config.max_pending_announcements;
        if self.pending.len() > bound {
            let dropped = self.pending.len() - bound;
            self.pending.drain(0..dropped);
            debug!("Announcement queue over bound, dropped {dropped} oldest");
        }
    }

    /// Whether now is an acceptable moment to speak
    pub fn should_speak(&self, now_ms: i64, audio: Option<&AudioActivity>) -> bool {
        if !self.config.enabled || self.pending.is_empty() {
            return false;
        }

        if let Some(last) = self.last_announcement_ms {
            if now_ms - last < self.config.global_cooldown_ms {
                return false;
            }
        }

        if self.config.avoid_speech_overlap {
            if let Some(activity) = audio {
                if activity.is_speech_active && activity.confidence > SPEECH_CONFIDENCE_THRESHOLD {
                    return false;
                }
                if now_ms - activity.last_speech_ms < SPEECH_HANGOVER_MS {
                    return false;
                }
            }
        }

        true
    }

    /// Pop the highest-priority pending announcement, stamping cooldowns.
    pub fn next_announcement(&mut self, now_ms: i64) -> Option<AllowedAdEvent> {
        if self.pending.is_empty() {
            return None;
        }
        // Stable sort: equal priorities stay in arrival order
        self.pending.sort_by(|a, b| b.priority.cmp(&a.priority));
        let next = self.pending.remove(0);

        self.last_announcement_ms = Some(now_ms);
        self.last_event_type_ms
            .insert(next.event.event_type().to_string(), now_ms);

        Some(next)
    }

    /// Drop everything pending
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Number of queued announcements
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Restore the gate to its initial state
    pub fn reset(&mut self) {
        self.last_announcement_ms = None;
        self.last_event_type_ms.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use visual_delta_common::{BBox, LayoutType, Vid};
    use visual_delta_events::{Clock, EventFactory, EventKind};

    fn fixed_clock() -> Clock {
        Arc::new(|| 0)
    }

    fn events(kinds: Vec<EventKind>) -> Vec<VisualEvent> {
        let mut factory = EventFactory::with_clock(fixed_clock());
        kinds
            .into_iter()
            .map(|kind| factory.emit(kind, 1000, 1.0))
            .collect()
    }

    fn hand_raised() -> EventKind {
        EventKind::HandRaised {
            vid: Vid::from_index(1),
            bbox: BBox::new(0.0, 0.0, 0.5, 0.5),
        }
    }

    fn slide_changed() -> EventKind {
        EventKind::SlideChanged {
            vid: Vid::from_index(1),
            from_hash: None,
            to_hash: "deadbeef".to_string(),
        }
    }

    fn layout_changed() -> EventKind {
        EventKind::LayoutChanged {
            from: LayoutType::Grid,
            to: LayoutType::Speaker,
        }
    }

    #[test]
    fn test_allowlist_rejects_internal_events() {
        let gate = AdPolicyGate::new(AdPolicyConfig::default());
        let batch = events(vec![
            EventKind::SnapshotReceived {
                content_hash: "00000000".to_string(),
                width: 640,
                height: 360,
                region_count: 0,
            },
            EventKind::AudioVideoLink {
                vid: Vid::from_index(1),
                audio_sid: "sid".to_string(),
            },
            EventKind::Unknown,
        ]);

        assert!(gate.select_candidates(&batch, 1000).is_empty());
    }

    #[test]
    fn test_minimal_verbosity_keeps_high_priority_only() {
        let config = AdPolicyConfig {
            verbosity: Verbosity::Minimal,
            ..Default::default()
        };
        let gate = AdPolicyGate::new(config);
        let batch = events(vec![hand_raised(), slide_changed(), layout_changed()]);

        let candidates = gate.select_candidates(&batch, 1000);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].event.event_type(), "hand_raised");
    }

    #[test]
    fn test_candidates_sorted_by_priority() {
        let gate = AdPolicyGate::new(AdPolicyConfig::default());
        let batch = events(vec![
            layout_changed(),
            hand_raised(),
            EventKind::ScreenShareStarted { vid: Vid::from_index(1) },
        ]);

        let candidates = gate.select_candidates(&batch, 1000);
        let types: Vec<_> = candidates.iter().map(|c| c.event.event_type()).collect();
        assert_eq!(types, vec!["screen_share_started", "hand_raised", "layout_changed"]);
    }

    #[test]
    fn test_per_type_cooldown_suppresses() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());

        let batch = events(vec![hand_raised()]);
        let candidates = gate.select_candidates(&batch, 10_000);
        gate.queue_announcements(candidates);
        assert!(gate.next_announcement(10_000).is_some());

        // 3s later: hand_raised still inside its 5s cooldown
        let batch = events(vec![hand_raised()]);
        assert!(gate.select_candidates(&batch, 13_000).is_empty());

        // 6s later: admitted again
        let batch = events(vec![hand_raised()]);
        assert_eq!(gate.select_candidates(&batch, 16_000).len(), 1);
    }

    #[test]
    fn test_cooldown_is_per_type() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());

        let batch = events(vec![hand_raised()]);
        let candidates = gate.select_candidates(&batch, 10_000);
        gate.queue_announcements(candidates);
        gate.next_announcement(10_000);

        // A different type is unaffected by the hand_raised cooldown
        let batch = events(vec![slide_changed()]);
        assert_eq!(gate.select_candidates(&batch, 11_000).len(), 1);
    }

    #[test]
    fn test_queue_bound_keeps_newest() {
        let config = AdPolicyConfig {
            max_pending_announcements: 2,
            ..Default::default()
        };
        let mut gate = AdPolicyGate::new(config);

        let batch = events(vec![hand_raised(), slide_changed(), layout_changed()]);
        let candidates = gate.select_candidates(&batch, 1000);
        assert_eq!(candidates.len(), 3);
        gate.queue_announcements(candidates);

        assert_eq!(gate.pending_len(), 2);
        // Sorted order was [hand_raised, slide_changed, layout_changed];
        // the oldest (hand_raised) was dropped.
        let next = gate.next_announcement(1000).unwrap();
        assert_eq!(next.event.event_type(), "slide_changed");
    }

    #[test]
    fn test_should_speak_requires_enabled_and_pending() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());
        assert!(!gate.should_speak(1000, None));

        let batch = events(vec![hand_raised()]);
        let candidates = gate.select_candidates(&batch, 1000);
        gate.queue_announcements(candidates);
        assert!(gate.should_speak(1000, None));

        let mut disabled_gate = AdPolicyGate::new(AdPolicyConfig {
            enabled: false,
            ..Default::default()
        });
        let candidates = disabled_gate.select_candidates(&events(vec![hand_raised()]), 1000);
        disabled_gate.queue_announcements(candidates);
        assert!(!disabled_gate.should_speak(1000, None));
    }

    #[test]
    fn test_global_cooldown_blocks_back_to_back() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());
        let batch = events(vec![hand_raised(), slide_changed()]);
        let candidates = gate.select_candidates(&batch, 1000);
        gate.queue_announcements(candidates);

        assert!(gate.should_speak(1000, None));
        gate.next_announcement(1000);

        assert!(!gate.should_speak(2000, None)); // 1s < 2s global cooldown
        assert!(gate.should_speak(3000, None));
    }

    #[test]
    fn test_active_speech_blocks_announcements() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());
        let candidates = gate.select_candidates(&events(vec![hand_raised()]), 1000);
        gate.queue_announcements(candidates);

        let speaking = AudioActivity {
            is_speech_active: true,
            confidence: 0.9,
            last_speech_ms: 1000,
        };
        assert!(!gate.should_speak(5000, Some(&speaking)));

        // Low-confidence speech does not block, but the hangover does
        let uncertain = AudioActivity {
            is_speech_active: true,
            confidence: 0.3,
            last_speech_ms: 4800,
        };
        assert!(!gate.should_speak(5000, Some(&uncertain)));

        let quiet = AudioActivity {
            is_speech_active: false,
            confidence: 0.0,
            last_speech_ms: 4000,
        };
        assert!(gate.should_speak(5000, Some(&quiet)));
    }

    #[test]
    fn test_overlap_suppression_can_be_disabled() {
        let config = AdPolicyConfig {
            avoid_speech_overlap: false,
            ..Default::default()
        };
        let mut gate = AdPolicyGate::new(config);
        let candidates = gate.select_candidates(&events(vec![hand_raised()]), 1000);
        gate.queue_announcements(candidates);

        let speaking = AudioActivity {
            is_speech_active: true,
            confidence: 1.0,
            last_speech_ms: 999,
        };
        assert!(gate.should_speak(1000, Some(&speaking)));
    }

    #[test]
    fn test_next_announcement_pops_highest_priority() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());
        let batch = events(vec![layout_changed(), hand_raised()]);
        let candidates = gate.select_candidates(&batch, 1000);
        gate.queue_announcements(candidates);

        assert_eq!(
            gate.next_announcement(1000).unwrap().event.event_type(),
            "hand_raised"
        );
        assert_eq!(
            gate.next_announcement(4000).unwrap().event.event_type(),
            "layout_changed"
        );
        assert!(gate.next_announcement(8000).is_none());
    }

    #[test]
    fn test_clear_pending_empties_queue() {
        let mut gate = AdPolicyGate::new(AdPolicyConfig::default());
        let candidates = gate.select_candidates(&events(vec![hand_raised()]), 1000);
        gate.queue_announcements(candidates);
        assert_eq!(gate.pending_len(), 1);

        gate.clear_pending();
        assert_eq!(gate.pending_len(), 0);
        assert!(!gate.should_speak(1000, None));
    }
}
