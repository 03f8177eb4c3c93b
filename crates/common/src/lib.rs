/// Common types for the visual-delta pipeline
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tolerance applied to the `x + w <= 1` / `y + h <= 1` bounds check.
pub const BBOX_EPSILON: f32 = 0.01;

/// Errors shared across pipeline stages
#[derive(Debug, Error)]
pub enum VisualDeltaError {
    #[error("Invalid bounding box: {0}")]
    InvalidBBox(String),

    #[error("Invalid handle: {0}")]
    InvalidVid(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, VisualDeltaError>;

/// Normalized rectangle relative to the composite frame.
///
/// All fields are in `[0, 1]`. A valid box has positive width and height
/// and stays inside the frame up to [`BBOX_EPSILON`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Center point of the box
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Euclidean distance between box centers
    #[inline]
    pub fn center_distance(&self, other: &BBox) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Whether the box satisfies the normalized-frame invariants.
    ///
    /// Non-finite coordinates, degenerate sizes, and boxes extending past
    /// the frame (beyond [`BBOX_EPSILON`]) are all rejected.
    pub fn is_valid(&self) -> bool {
        let finite =
            self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite();
        finite
            && self.w > 0.0
            && self.h > 0.0
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.w <= 1.0 + BBOX_EPSILON
            && self.y + self.h <= 1.0 + BBOX_EPSILON
    }
}

/// Kind of a detected region. Immutable for the lifetime of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Tile,
    ScreenShare,
    Unknown,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tile => write!(f, "tile"),
            Self::ScreenShare => write!(f, "screen_share"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Overall arrangement of the meeting UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    Grid,
    Speaker,
    Presentation,
    #[default]
    Unknown,
}

impl fmt::Display for LayoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid => write!(f, "grid"),
            Self::Speaker => write!(f, "speaker"),
            Self::Presentation => write!(f, "presentation"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Session-local visual continuity handle.
///
/// Minted 1-based per tracker instance and never reused after expiry. The
/// handle carries no identity: it only answers "is this the same region as
/// before?". Wire representation is `"v"` followed by the decimal index,
/// which is also the `Display`/`FromStr` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vid(u32);

impl Vid {
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for Vid {
    type Err = VisualDeltaError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix('v')
            .ok_or_else(|| VisualDeltaError::InvalidVid(s.to_string()))?;
        let index: u32 = digits
            .parse()
            .map_err(|_| VisualDeltaError::InvalidVid(s.to_string()))?;
        Ok(Self(index))
    }
}

impl Serialize for Vid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct VidVisitor;

impl Visitor<'_> for VidVisitor {
    type Value = Vid;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a handle of the form \"v<n>\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Vid, E> {
        value.parse().map_err(|_| E::custom("invalid vid"))
    }
}

impl<'de> Deserialize<'de> for Vid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(VidVisitor)
    }
}

/// Opaque external reference to an audio stream. Uninterpreted by the core.
pub type AudioSid = String;

/// Instantaneous signals observed on a region in one snapshot.
///
/// All fields are optional; an absent boolean is treated as `false`
/// downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_raised: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active_speaker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_presenting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_hash: Option<String>,
}

/// A single region of a snapshot, as produced by the snapshot analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub bbox: BBox,
    pub kind: RegionKind,
    pub fingerprint: String,
    #[serde(default)]
    pub signals: RegionSignals,
}
