//! Best-fit matching of a track profile to a static shape.
//!
//! Profiles that define include/exclude filters are matched exactly against
//! the shape's file name and texture names; profiles without filters are
//! scored by texture-name overlap, with a small penalty for each profile
//! texture the shape lacks and a larger one for each shape texture the
//! profile lacks. The highest score wins; on the heuristic path a score must
//! be positive to count as a match at all.

use std::sync::Arc;

use super::TrackProfile;

/// Penalty per profile texture absent from the shape.
const MISSING_FROM_SHAPE_PENALTY: f32 = 0.25;

/// Penalty per shape texture absent from the profile.
const MISSING_FROM_PROFILE_PENALTY: f32 = 1.0;

/// Score granted by an exact include-filter match; dominates any overlap.
const FILTER_MATCH_SCORE: f32 = 1000.0;

/// What profile selection knows about a static shape.
#[derive(Debug, Clone, Default)]
pub struct ShapeDescription {
    pub file_name: String,
    pub textures: Vec<String>,
}

/// Case-insensitive wildcard match supporting `*` (any run) and `?` (any one
/// character). Iterative with single backtrack point, so pathological
/// patterns stay linear.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(|c| c.to_lowercase()).collect();
    let text: Vec<char> = text.chars().flat_map(|c| c.to_lowercase()).collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}

fn any_match(patterns: &[String], text: &str) -> bool {
    patterns.iter().any(|p| wildcard_match(p, text))
}

/// Score one profile against one shape. `None` means rejected outright.
fn score(profile: &TrackProfile, shape: &ShapeDescription) -> Option<f32> {
    let has_filters = !profile.included_shapes.is_empty()
        || !profile.excluded_shapes.is_empty()
        || !profile.included_textures.is_empty()
        || !profile.excluded_textures.is_empty();

    if has_filters {
        if any_match(&profile.excluded_shapes, &shape.file_name) {
            return None;
        }
        if shape
            .textures
            .iter()
            .any(|t| any_match(&profile.excluded_textures, t))
        {
            return None;
        }
        if any_match(&profile.included_shapes, &shape.file_name)
            || shape
                .textures
                .iter()
                .any(|t| any_match(&profile.included_textures, t))
        {
            return Some(FILTER_MATCH_SCORE);
        }
        return None;
    }

    // Overlap heuristic. Comparison is by case-insensitive texture name.
    let profile_textures: Vec<String> = profile.images.iter().map(|s| s.to_lowercase()).collect();
    let shape_textures: Vec<String> = shape.textures.iter().map(|s| s.to_lowercase()).collect();

    let overlap = profile_textures
        .iter()
        .filter(|t| shape_textures.contains(t))
        .count() as f32;
    let missing_from_shape = profile_textures.len() as f32 - overlap;
    let missing_from_profile = shape_textures
        .iter()
        .filter(|t| !profile_textures.contains(t))
        .count() as f32;

    let score = overlap
        - MISSING_FROM_SHAPE_PENALTY * missing_from_shape
        - MISSING_FROM_PROFILE_PENALTY * missing_from_profile;
    (score > 0.0).then_some(score)
}

/// Index of the best-matching profile for the shape, or `None` when nothing
/// matches.
pub fn best_profile(profiles: &[Arc<TrackProfile>], shape: &ShapeDescription) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, profile) in profiles.iter().enumerate() {
        if let Some(s) = score(profile, shape) {
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((index, s));
            }
        }
    }
    best.map(|(index, _)| index)
}
