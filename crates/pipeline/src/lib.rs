//! Per-session composition of the visual-delta stages
//!
//! A [`VisualPipeline`] owns one detector, one policy gate, one
//! verbalizer, one event factory, and the current world state for a
//! single call session. Snapshot ticks flow in through
//! [`VisualPipeline::process_snapshot`]; speech opportunities are polled
//! through [`VisualPipeline::tick`]. Nothing is shared between sessions,
//! so no locking happens inside the pipeline itself.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use visual_delta_ad_policy::{AdPolicyConfig, AdPolicyGate, AudioActivity};
use visual_delta_common::{DetectedRegion, LayoutType};
use visual_delta_detector::{DeltaDetector, DetectorConfig, SnapshotMeta};
use visual_delta_events::{Clock, EventFactory, VisualEvent, VisualState};
use visual_delta_verbalizer::{LlmHandler, Verbalizer, VerbalizerConfig};

/// Configuration of one pipeline instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub ad_policy: AdPolicyConfig,
    #[serde(default)]
    pub verbalizer: VerbalizerConfig,
}

/// Result of one snapshot tick
#[derive(Debug, Clone)]
pub struct ProcessedSnapshot {
    /// Events emitted for this snapshot, in deterministic order
    pub events: Vec<VisualEvent>,
    /// The world state after this snapshot
    pub state: VisualState,
}

/// One session's visual-delta pipeline
pub struct VisualPipeline {
    config: PipelineConfig,
    detector: DeltaDetector,
    gate: AdPolicyGate,
    verbalizer: Verbalizer,
    factory: EventFactory,
    state: VisualState,
}

impl VisualPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let detector = DeltaDetector::new(config.detector.clone());
        let gate = AdPolicyGate::new(config.ad_policy.clone());
        let verbalizer = Verbalizer::new(config.verbalizer.clone());
        Self {
            config,
            detector,
            gate,
            verbalizer,
            factory: EventFactory::new(),
            state: VisualState::new(),
        }
    }

    /// Like [`VisualPipeline::new`] with an injected emit clock, so tests
    /// are deterministic.
    pub fn with_clock(config: PipelineConfig, clock: Clock) -> Self {
        let mut pipeline = Self::new(config);
        pipeline.factory = EventFactory::with_clock(clock);
        pipeline
    }

    /// Inject an LLM handler for the verbalizer's optional path
    pub fn set_llm_handler(&mut self, handler: Arc<dyn LlmHandler>) {
        self.verbalizer.set_llm_handler(handler);
    }

    /// Process one snapshot tick: detect deltas, advance the world state,
    /// and queue announcement candidates.
    pub fn process_snapshot(
        &mut self,
        regions: &[DetectedRegion],
        detected_layout: LayoutType,
        meta: &SnapshotMeta,
        now_ms: i64,
    ) -> ProcessedSnapshot {
        let outcome = self.detector.compute_deltas(
            &mut self.factory,
            &self.state,
            regions,
            detected_layout,
            now_ms,
            meta,
        );

        let candidates = self.gate.select_candidates(&outcome.events, now_ms);
        if !candidates.is_empty() {
            debug!("Queueing {} announcement candidates", candidates.len());
        }
        self.gate.queue_announcements(candidates);

        self.state = outcome.next_state;
        ProcessedSnapshot {
            events: outcome.events,
            state: self.state.clone(),
        }
    }

    /// Poll for a speech opportunity. Returns the line to hand to TTS
    /// when the gate admits one, otherwise `None`.
    ///
    /// The only suspension point is the verbalizer's LLM handler
    /// boundary; with templates this completes synchronously.
    pub async fn tick(&mut self, now_ms: i64, audio: Option<&AudioActivity>) -> Option<String> {
        if !self.gate.should_speak(now_ms, audio) {
            return None;
        }
        let announcement = self.gate.next_announcement(now_ms)?;
        self.verbalizer
            .verbalize(&announcement.event, &self.state)
            .await
    }

    /// Current world state
    pub fn state(&self) -> &VisualState {
        &self.state
    }

    /// Number of queued announcements
    pub fn pending_announcements(&self) -> usize {
        self.gate.pending_len()
    }

    /// Restore every stage to its initial state. Event ids restart at 1.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.gate.reset();
        self.factory.reset();
        self.state = VisualState::new();
        debug!("Pipeline reset to initial state");
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
