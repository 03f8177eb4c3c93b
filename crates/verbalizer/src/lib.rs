//! Safe text synthesis for audio-description announcements
//!
//! Renders admitted visual events into short spoken lines. The default
//! path is a deterministic template table; an optional injected LLM
//! handler can produce richer phrasing, but its output must pass a hard
//! content blacklist before it is accepted. Any handler failure or
//! validation rejection falls back silently to the template, so the
//! privacy guarantee is a verifiable property of the *output*, never a
//! policy on the input.
//!
//! Participants are only ever located by screen position ("top left"),
//! never described.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use visual_delta_ad_policy::Verbosity;
use visual_delta_common::{BBox, LayoutType, RegionKind};
use visual_delta_events::{EventKind, VisualEvent, VisualState};

/// Verbalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerbalizerConfig {
    /// Route events through the injected LLM handler when one is set
    /// (default: false)
    pub use_llm: bool,
    /// Maximum accepted output length in characters (default: 120)
    pub max_length: usize,
    pub verbosity: Verbosity,
}

impl Default for VerbalizerConfig {
    fn default() -> Self {
        Self {
            use_llm: false,
            max_length: 120,
            verbosity: Verbosity::Normal,
        }
    }
}

/// Validation failures for synthesized output
#[derive(Debug, Error)]
pub enum VerbalizeError {
    #[error("empty output")]
    Empty,

    #[error("output too long: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("prohibited term: {0}")]
    ProhibitedTerm(String),
}

/// Terms that must never appear in spoken output, matched as
/// case-insensitive substrings. Covers gender, appearance, emotion,
/// race/ethnicity, and age.
pub const PROHIBITED_TERMS: &[&str] = &[
    // Gender
    "man",
    "woman",
    "boy",
    "girl",
    "person named",
    "user named",
    // Appearance
    "wearing",
    "dressed",
    "hair",
    "face",
    "eyes",
    "skin",
    "looks like",
    "attractive",
    "young",
    "old",
    "tall",
    "short",
    "glasses",
    // Emotion
    "happy",
    "sad",
    "angry",
    "excited",
    "bored",
    "confused",
    "frustrated",
    "smiling",
    "frowning",
    "laughing",
    "crying",
    // Race / ethnicity
    "white",
    "black",
    "asian",
    "latino",
    "hispanic",
    "african",
    // Age
    "elderly",
    "teenager",
    "child",
    "adult",
];

/// Validate a synthesized line against length and content rules.
///
/// # Errors
/// Returns the first rule violated: emptiness, length, or a prohibited
/// term.
pub fn validate_output(text: &str, max_length: usize) -> Result<(), VerbalizeError> {
    if text.len() > max_length {
        return Err(VerbalizeError::TooLong {
            len: text.len(),
            max: max_length,
        });
    }
    if text.trim().is_empty() {
        return Err(VerbalizeError::Empty);
    }

    let lowered = text.to_lowercase();
    for term in PROHIBITED_TERMS {
        if lowered.contains(term) {
            return Err(VerbalizeError::ProhibitedTerm((*term).to_string()));
        }
    }

    Ok(())
}

/// Screen-position descriptor for a region: one of nine cells, e.g.
/// "top left". This is the only way a participant is ever located.
pub fn position_descriptor(bbox: &BBox) -> String {
    const ROWS: [&str; 3] = ["top", "middle", "bottom"];
    const COLS: [&str; 3] = ["left", "center", "right"];

    let col = ((bbox.x * 3.0).floor() as i32).clamp(0, 2) as usize;
    let row = ((bbox.y * 3.0).floor() as i32).clamp(0, 2) as usize;
    format!("{} {}", ROWS[row], COLS[col])
}

/// Structured context handed to the LLM path.
///
/// Deliberately contains no bbox coordinates, no fingerprints, and no
/// image data: only the position descriptor and aggregate meeting facts.
#[derive(Debug, Clone, Serialize)]
pub struct LlmContext {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_kind: Option<RegionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_from: Option<LayoutType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_to: Option<LayoutType>,
    pub participant_count: usize,
    pub hand_raised_count: usize,
    pub screen_share_active: bool,
    pub layout: LayoutType,
    pub verbosity: Verbosity,
}

/// Externally injected description handler.
///
/// The handler owns its own timeout contract; any error it returns is
/// treated as "use the template instead" and never surfaced to callers.
#[async_trait]
pub trait LlmHandler: Send + Sync {
    async fn describe(&self, context: &LlmContext) -> anyhow::Result<String>;
}

/// Renders events into spoken lines
pub struct Verbalizer {
    config: VerbalizerConfig,
    llm: Option<Arc<dyn LlmHandler>>,
}

impl Verbalizer {
    pub fn new(config: VerbalizerConfig) -> Self {
        Self { config, llm: None }
    }

    /// Inject an LLM handler. Without one, `use_llm = true` silently
    /// means the template path.
    pub fn set_llm_handler(&mut self, handler: Arc<dyn LlmHandler>) {
        self.llm = Some(handler);
    }

    /// Produce the spoken line for an event, or `None` for event types
    /// that are never spoken.
    pub async fn verbalize(&self, event: &VisualEvent, state: &VisualState) -> Option<String> {
        if self.config.use_llm {
            if let Some(handler) = &self.llm {
                let context = self.build_context(event, state);
                match handler.describe(&context).await {
                    Ok(text) => match validate_output(&text, self.config.max_length) {
                        Ok(()) => return Some(text.trim().to_string()),
                        Err(reason) => {
                            warn!("Rejecting synthesized description ({reason}), using template");
                        }
                    },
                    Err(error) => {
                        warn!("Description handler failed ({error}), using template");
                    }
                }
            }
        }

        self.render_template(event)
    }

    /// Deterministic template rendering for an event
    pub fn render_template(&self, event: &VisualEvent) -> Option<String> {
        let template = template(event.event_type(), self.config.verbosity)?;
        let mut text = template.to_string();

        if text.contains("${position}") {
            let position = event_bbox(event)
                .map_or_else(|| "on screen".to_string(), |bbox| position_descriptor(&bbox));
            text = text.replace("${position}", &position);
        }
        if text.contains("${to}") {
            if let EventKind::LayoutChanged { to, .. } = &event.kind {
                text = text.replace("${to}", &to.to_string());
            }
        }

        Some(text)
    }

    fn build_context(&self, event: &VisualEvent, state: &VisualState) -> LlmContext {
        let (layout_from, layout_to) = match &event.kind {
            EventKind::LayoutChanged { from, to } => (Some(*from), Some(*to)),
            _ => (None, None),
        };
        let region_kind = match &event.kind {
            EventKind::VidAppeared { kind, .. } => Some(*kind),
            EventKind::VidDisappeared { vid }
            | EventKind::HandRaised { vid, .. }
            | EventKind::HandLowered { vid, .. }
            | EventKind::ScreenShareStarted { vid }
            | EventKind::ScreenShareStopped { vid }
            | EventKind::SlideChanged { vid, .. } => state.vids.get(vid).map(|v| v.kind),
            _ => None,
        };

        LlmContext {
            event_type: event.event_type().to_string(),
            position: event_bbox(event).map(|bbox| position_descriptor(&bbox)),
            region_kind,
            layout_from,
            layout_to,
            participant_count: state.participant_count(),
            hand_raised_count: state.hand_raised_count,
            screen_share_active: state.screen_share.active,
            layout: state.layout,
            verbosity: self.config.verbosity,
        }
    }
}

/// Template table: (minimal, normal) per spoken event type
fn template(event_type: &str, verbosity: Verbosity) -> Option<&'static str> {
    let (minimal, normal) = match event_type {
        "hand_raised" => (
            "Hand raised ${position}",
            "Participant ${position} raised their hand",
        ),
        "hand_lowered" => (
            "Hand lowered",
            "Participant ${position} lowered their hand",
        ),
        "screen_share_started" => ("Sharing started", "Screen sharing started"),
        "screen_share_stopped" => ("Sharing stopped", "Screen sharing stopped"),
        "slide_changed" => ("New slide", "Presentation moved to a new slide"),
        "layout_changed" => ("${to} view", "Layout changed to ${to} view"),
        "vid_appeared" => ("Tile added", "A new video tile appeared ${position}"),
        "vid_disappeared" => ("Tile removed", "A video tile left the meeting"),
        _ => return None,
    };
    Some(match verbosity {
        Verbosity::Minimal => minimal,
        Verbosity::Normal => normal,
    })
}

fn event_bbox(event: &VisualEvent) -> Option<BBox> {
    match &event.kind {
        EventKind::VidAppeared { bbox, .. }
        | EventKind::HandRaised { bbox, .. }
        | EventKind::HandLowered { bbox, .. } => Some(*bbox),
        _ => None,
    }
}
