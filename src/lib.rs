//! Privacy-preserving visual-delta pipeline for live video-meeting UIs
//!
//! From a periodic low-resolution composite of the meeting surface this
//! workspace maintains session-local continuity handles for visual regions,
//! derives debounced state-transition events (hand raise, screen share,
//! slide change, layout change, appearance/disappearance), and renders a
//! gated subset of those transitions into spoken audio-description lines
//! that never describe identity, appearance, or emotion.
//!
//! This facade re-exports the member crates under short names. The serving
//! layer (`visual-delta-api-server`) is deliberately not re-exported here;
//! library consumers compose the core directly through
//! [`pipeline::VisualPipeline`].

pub use visual_delta_ad_policy as ad_policy;
pub use visual_delta_common as common;
pub use visual_delta_detector as detector;
pub use visual_delta_events as events;
pub use visual_delta_fingerprint as fingerprint;
pub use visual_delta_pipeline as pipeline;
pub use visual_delta_tracker as tracker;
pub use visual_delta_verbalizer as verbalizer;
