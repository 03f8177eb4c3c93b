//! Region-to-handle continuity tracking
//!
//! Associates detected regions of successive snapshots with persistent
//! session-local handles ([`Vid`]s). Matching uses only where a region is
//! and its average color (via its fingerprint), never biometrics, so a
//! handle provides continuity without identity.
//!
//! # Features
//! - Persistent handles across snapshots with greedy best-score matching
//! - Combined position + fingerprint scoring with hard rejection gates
//! - Handle expiry after a configurable silent window
//! - Handles are minted 1-based and never reused
//!
//! # Example
//! ```
//! use visual_delta_common::{BBox, DetectedRegion, RegionKind, RegionSignals};
//! use visual_delta_tracker::{TrackerConfig, VidTracker};
//!
//! let mut tracker = VidTracker::new(TrackerConfig::default());
//! let region = DetectedRegion {
//!     bbox: BBox::new(0.0, 0.0, 0.5, 0.5),
//!     kind: RegionKind::Tile,
//!     fingerprint: "POS:0055".to_string(),
//!     signals: RegionSignals::default(),
//! };
//! let outcome = tracker.process_regions(&[region], 1000);
//! assert_eq!(outcome.appeared.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use visual_delta_common::{BBox, DetectedRegion, RegionKind, Vid};
use visual_delta_fingerprint::hash_similarity;

/// Continuity tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Silent window after which an unmatched handle expires (default: 15000)
    pub expire_ms: i64,
    /// Maximum center distance for a match candidate (default: 0.15)
    pub bbox_distance_threshold: f32,
    /// Minimum fingerprint similarity for a match candidate (default: 0.6)
    pub fingerprint_similarity_threshold: f32,
    /// Weight of the position term in the match score (default: 0.4)
    pub bbox_weight: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            expire_ms: 15_000,
            bbox_distance_threshold: 0.15,
            fingerprint_similarity_threshold: 0.6,
            bbox_weight: 0.4,
        }
    }
}

/// A live tracker entry for one handle
#[derive(Debug, Clone, Serialize)]
pub struct VidEntry {
    pub vid: Vid,
    pub bbox: BBox,
    /// Immutable for the lifetime of the entry
    pub kind: RegionKind,
    pub fingerprint: String,
    pub last_seen_ms: i64,
    pub confidence: f32,
}

/// Result of one [`VidTracker::process_regions`] call.
///
/// `assignments` pairs each accepted input-region index with its handle,
/// in input order. Every assigned handle is in `appeared` xor `updated`.
#[derive(Debug, Clone, Default)]
pub struct TrackerOutcome {
    pub assignments: Vec<(usize, Vid)>,
    pub appeared: Vec<Vid>,
    pub updated: Vec<Vid>,
    pub expired: Vec<Vid>,
}

/// Matches regions to persistent handles, minting and expiring as needed
pub struct VidTracker {
    config: TrackerConfig,
    entries: BTreeMap<Vid, VidEntry>,
    next_index: u32,
}

impl VidTracker {
    pub fn new(config: TrackerConfig) -> Self {
        debug!("Creating vid tracker with config: {:?}", config);
        Self {
            config,
            entries: BTreeMap::new(),
            next_index: 1,
        }
    }

    /// Match one snapshot's regions against the live entries.
    ///
    /// Regions are processed in input order. Each either reuses the
    /// best-scoring unclaimed entry of the same kind or mints a new
    /// handle. After all regions, unclaimed entries older than
    /// `expire_ms` are removed. Malformed regions are skipped.
    pub fn process_regions(&mut self, regions: &[DetectedRegion], now_ms: i64) -> TrackerOutcome {
        let mut outcome = TrackerOutcome::default();
        let mut claimed: BTreeSet<Vid> = BTreeSet::new();

        for (index, region) in regions.iter().enumerate() {
            if !region.bbox.is_valid() {
                warn!("Skipping region {index} with malformed bbox: {:?}", region.bbox);
                continue;
            }

            match self.best_match(region, &claimed) {
                Some((vid, score)) => {
                    let entry = self
                        .entries
                        .get_mut(&vid)
                        .unwrap_or_else(|| unreachable!("matched vid is live"));
                    entry.bbox = region.bbox;
                    entry.fingerprint = region.fingerprint.clone();
                    entry.last_seen_ms = now_ms;
                    entry.confidence = score;

                    claimed.insert(vid);
                    outcome.updated.push(vid);
                    outcome.assignments.push((index, vid));
                }
                None => {
                    let vid = self.mint(region, now_ms);
                    claimed.insert(vid);
                    outcome.appeared.push(vid);
                    outcome.assignments.push((index, vid));
                }
            }
        }

        let cutoff = now_ms - self.config.expire_ms;
        let expired: Vec<Vid> = self
            .entries
            .values()
            .filter(|e| !claimed.contains(&e.vid) && e.last_seen_ms < cutoff)
            .map(|e| e.vid)
            .collect();
        for vid in &expired {
            self.entries.remove(vid);
        }
        outcome.expired = expired;

        debug!(
            "Tracker processed {} regions: {} appeared, {} updated, {} expired, {} live",
            regions.len(),
            outcome.appeared.len(),
            outcome.updated.len(),
            outcome.expired.len(),
            self.entries.len()
        );

        outcome
    }

    /// Best-scoring unclaimed entry for a region, if any passes the gates.
    ///
    /// Ties keep the earliest-minted handle (ascending iteration order).
    fn best_match(&self, region: &DetectedRegion, claimed: &BTreeSet<Vid>) -> Option<(Vid, f32)> {
        let mut best: Option<(Vid, f32)> = None;

        for entry in self.entries.values() {
            if claimed.contains(&entry.vid) || entry.kind != region.kind {
                continue;
            }

            let distance = region.bbox.center_distance(&entry.bbox);
            if distance > self.config.bbox_distance_threshold {
                continue;
            }
            let similarity = hash_similarity(&entry.fingerprint, &region.fingerprint);
            if similarity < self.config.fingerprint_similarity_threshold {
                continue;
            }

            let score = self.config.bbox_weight
                * (1.0 - distance / self.config.bbox_distance_threshold)
                + (1.0 - self.config.bbox_weight) * similarity;

            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((entry.vid, score));
            }
        }

        best
    }

    fn mint(&mut self, region: &DetectedRegion, now_ms: i64) -> Vid {
        let vid = Vid::from_index(self.next_index);
        self.next_index += 1;
        self.entries.insert(
            vid,
            VidEntry {
                vid,
                bbox: region.bbox,
                kind: region.kind,
                fingerprint: region.fingerprint.clone(),
                last_seen_ms: now_ms,
                confidence: 1.0,
            },
        );
        debug!("Minted {vid} for {} region", region.kind);
        vid
    }

    /// Look up a live entry
    pub fn entry(&self, vid: Vid) -> Option<&VidEntry> {
        self.entries.get(&vid)
    }

    /// Live entries in ascending vid order
    pub fn entries(&self) -> impl Iterator<Item = &VidEntry> {
        self.entries.values()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
