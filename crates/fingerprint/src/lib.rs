//! Fingerprint primitives for region continuity matching
//!
//! A fingerprint answers one question: "is this the same region as
//! before?". It is built from the region's position bucket and its average
//! color only, so continuity matching can never depend on biometrics.
//!
//! # Format
//! `POS:<px><py><pw><ph>` where each digit is `floor(value * 10)` clamped
//! to `[0, 9]`, optionally suffixed with `|CLR:<rrggbb>` when an average
//! color is available.
//!
//! # Example
//! ```
//! use visual_delta_common::BBox;
//! use visual_delta_fingerprint::{generate_fingerprint, hash_similarity};
//!
//! let a = generate_fingerprint(&BBox::new(0.0, 0.0, 0.5, 0.5), Some("#336699"));
//! let b = generate_fingerprint(&BBox::new(0.02, 0.01, 0.5, 0.5), Some("#336699"));
//! assert!(hash_similarity(&a, &b) > 0.9);
//! ```

use tracing::debug;
use visual_delta_common::BBox;

/// Weight of the position sub-score in [`hash_similarity`]
const POSITION_WEIGHT: f32 = 0.6;
/// Weight of the color sub-score in [`hash_similarity`]
const COLOR_WEIGHT: f32 = 0.4;
/// Maximum euclidean distance between two RGB colors
const MAX_COLOR_DISTANCE: f32 = 441.672_96; // sqrt(3 * 255^2)

/// Generate a position-bucket fingerprint for a region.
///
/// `color_hex` is an optional average color (`"rrggbb"`, `#` prefix and
/// uppercase accepted). An unparseable color is skipped rather than
/// rejected; the fingerprint then carries the position component only.
pub fn generate_fingerprint(bbox: &BBox, color_hex: Option<&str>) -> String {
    let mut out = String::with_capacity(19);
    out.push_str("POS:");
    for value in [bbox.x, bbox.y, bbox.w, bbox.h] {
        out.push(bucket_digit(value));
    }

    if let Some(raw) = color_hex {
        match normalize_color(raw) {
            Some(rgb_hex) => {
                out.push_str("|CLR:");
                out.push_str(&rgb_hex);
            }
            None => debug!("Skipping unparseable color component: {raw:?}"),
        }
    }

    out
}

/// Similarity between two fingerprints, in `[0, 1]`.
///
/// Equal strings score `1.0`; an empty string scores `0.0` against
/// anything. Two positional fingerprints are compared by position-bucket
/// distance (weight 0.6) and average-color distance (weight 0.4, neutral
/// `0.5` when either side lacks a color). Anything else falls back to the
/// fraction of positionally equal bytes.
pub fn hash_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    if let (Some(pa), Some(pb)) = (parse_fingerprint(a), parse_fingerprint(b)) {
        let mut pos_score = 0.0;
        for (da, db) in pa.digits.iter().zip(pb.digits.iter()) {
            pos_score += 1.0 - (f32::from(*da) - f32::from(*db)).abs() / 10.0;
        }
        pos_score /= 4.0;

        let color_score = match (pa.color, pb.color) {
            (Some(ca), Some(cb)) => 1.0 - color_distance(ca, cb) / MAX_COLOR_DISTANCE,
            _ => 0.5,
        };

        return POSITION_WEIGHT * pos_score + COLOR_WEIGHT * color_score;
    }

    // Non-positional strings: plain byte agreement
    let matching = a.bytes().zip(b.bytes()).filter(|(ba, bb)| ba == bb).count();
    matching as f32 / a.len().max(b.len()) as f32
}

/// Deterministic 32-bit rolling hash of a string, rendered as 8 lowercase
/// hex characters. Used for slide-content identity, never for images.
pub fn content_hash(s: &str) -> String {
    let mut hash: u32 = 0;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    format!("{hash:08x}")
}

fn bucket_digit(value: f32) -> char {
    let bucket = (value * 10.0).floor().clamp(0.0, 9.0) as u8;
    char::from(b'0' + bucket)
}

fn normalize_color(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#');
    if trimmed.len() != 6 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

struct ParsedFingerprint {
    digits: [u8; 4],
    color: Option<(u8, u8, u8)>,
}

fn parse_fingerprint(s: &str) -> Option<ParsedFingerprint> {
    let rest = s.strip_prefix("POS:")?;
    let mut parts = rest.split('|');

    let pos = parts.next()?;
    let pos_bytes = pos.as_bytes();
    if pos_bytes.len() < 4 {
        return None;
    }
    let mut digits = [0u8; 4];
    for (slot, byte) in digits.iter_mut().zip(pos_bytes.iter()) {
        if !byte.is_ascii_digit() {
            return None;
        }
        *slot = byte - b'0';
    }

    let color = parts
        .find_map(|part| part.strip_prefix("CLR:"))
        .and_then(parse_rgb);

    Some(ParsedFingerprint { digits, color })
}

fn parse_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn color_distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> f32 {
    let dr = f32::from(a.0) - f32::from(b.0);
    let dg = f32::from(a.1) - f32::from(b.1);
    let db = f32::from(a.2) - f32::from(b.2);
    (dr * dr + dg * dg + db * db).sqrt()
}
