//! Superelevation (cant) assignment for curved track.
//!
//! Walks the placed sections of a path, groups consecutive curved pieces of
//! one bend direction into curves, decides whether each curve is eligible for
//! banking, and assigns a start/max/end cant profile to every section so the
//! mesh builder can ramp the roll in and out at curve transitions. A per-tile
//! registry guarantees each section is banked exactly once and lets the
//! bookkeeping be torn down when a tile unloads.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{
    GAUGE_TOLERANCE, MAX_CANT_M, MIN_END_SECTION_RUN, ROUTE_DESIGN_SPEED, SUPERELEVATION_MIN_RUN,
    TRACK_GAUGE,
};
use crate::track_sections::{SectionId, TrackSection};

/// Cant carried by one section, expressed as roll angles in radians.
///
/// `start` and `end` describe the roll already present at each boundary of
/// the section; `max` is the target roll. The mesh builder picks its ramp
/// shape from which of the three are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CantProfile {
    pub start: f32,
    pub max: f32,
    pub end: f32,
}

impl CantProfile {
    pub const NONE: CantProfile = CantProfile {
        start: 0.0,
        max: 0.0,
        end: 0.0,
    };

    pub fn is_none(&self) -> bool {
        self.max == 0.0
    }
}

/// Nominal cant angle for a curve of the given radius, in radians.
///
/// Ideal cant in meters is `E = G * V^2 / (g * R)`; dividing by the gauge and
/// taking the arctangent turns the rail height difference into a roll angle.
/// Clamped to the route ceiling so sharp curves don't produce absurd banking.
pub fn nominal_cant_angle(radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let cant_m = TRACK_GAUGE * ROUTE_DESIGN_SPEED * ROUTE_DESIGN_SPEED / (9.81 * radius);
    let cant_m = cant_m.clamp(0.0, MAX_CANT_M);
    (cant_m / TRACK_GAUGE).atan()
}

/// Whether a curve of the given total run and section gauge should be banked.
pub fn curve_eligible(total_run: f32, gauge: f32) -> bool {
    total_run >= SUPERELEVATION_MIN_RUN && (gauge - TRACK_GAUGE).abs() <= GAUGE_TOLERANCE
}

/// Assign cant profiles to a run of sections belonging to one path.
///
/// Consecutive curved sections with the same bend direction form one curve.
/// Eligible curves get: first section ramps 0 -> max, middle sections hold
/// max, last section ramps max -> 0; a single-section curve ramps up and back
/// down within itself. Straight sections and ineligible curves keep
/// [`CantProfile::NONE`]. Short curved sections at either end of the run are
/// treated as junction approaches and left unbanked.
pub fn assign_cant(sections: &mut [TrackSection], gauge: f32) {
    let len = sections.len();
    let mut i = 0;
    while i < len {
        if !is_bankable(sections, i, len) {
            sections[i].cant = CantProfile::NONE;
            i += 1;
            continue;
        }

        // Extend the group while the bend direction holds.
        let dir = sections[i].data.param1.signum();
        let mut j = i + 1;
        while j < len && is_bankable(sections, j, len) && sections[j].data.param1.signum() == dir {
            j += 1;
        }

        let total_run: f32 = sections[i..j].iter().map(|s| s.data.run_length()).sum();
        if !curve_eligible(total_run, gauge) {
            for section in &mut sections[i..j] {
                section.cant = CantProfile::NONE;
            }
            i = j;
            continue;
        }

        // Sharpest radius in the group sets the target roll for the curve.
        let min_radius = sections[i..j]
            .iter()
            .map(|s| s.data.param2)
            .fold(f32::INFINITY, f32::min);
        let max = nominal_cant_angle(min_radius);

        let count = j - i;
        for (k, section) in sections[i..j].iter_mut().enumerate() {
            let first = k == 0;
            let last = k == count - 1;
            section.cant = CantProfile {
                start: if first { 0.0 } else { max },
                max,
                end: if last { 0.0 } else { max },
            };
        }
        i = j;
    }
}

fn is_bankable(sections: &[TrackSection], index: usize, len: usize) -> bool {
    let section = &sections[index];
    if !section.data.is_curved || section.data.is_vacuous() {
        return false;
    }
    // First and last sections of a run border junctions or buffers.
    if (index == 0 || index == len - 1) && section.data.run_length() < MIN_END_SECTION_RUN {
        return false;
    }
    true
}

/// Tile-keyed registry of banked sections.
///
/// `register` refuses duplicates so a curve crossing a tile seam is only
/// banked by whichever tile loads it first.
#[derive(Resource, Default)]
pub struct CurveRegistry {
    by_tile: HashMap<(i32, i32), Vec<SectionId>>,
}

impl CurveRegistry {
    /// Returns false when the section was already registered on any tile.
    pub fn register(&mut self, tile: (i32, i32), id: SectionId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.by_tile.entry(tile).or_default().push(id);
        true
    }

    pub fn contains(&self, id: SectionId) -> bool {
        self.by_tile.values().any(|ids| ids.contains(&id))
    }

    /// Drop a tile's registrations, returning the section ids that should
    /// revert to plain rendering.
    pub fn remove_tile(&mut self, tile: (i32, i32)) -> Vec<SectionId> {
        self.by_tile.remove(&tile).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_sections::{DtrackData, TrackSectionStore};

    fn store_with(path: &[DtrackData]) -> TrackSectionStore {
        let mut store = TrackSectionStore::default();
        store.add_path(path, Transform::IDENTITY, false);
        store
    }

    #[test]
    fn test_nominal_cant_is_clamped_and_monotonic() {
        let sharp = nominal_cant_angle(300.0);
        let gentle = nominal_cant_angle(3000.0);
        assert!(sharp > gentle, "sharper curves bank more");
        assert!(sharp <= (MAX_CANT_M / TRACK_GAUGE).atan() + 1e-6);
        assert_eq!(nominal_cant_angle(0.0), 0.0);
        assert_eq!(nominal_cant_angle(-5.0), 0.0);
    }

    #[test]
    fn test_short_curve_not_eligible() {
        assert!(!curve_eligible(SUPERELEVATION_MIN_RUN - 1.0, TRACK_GAUGE));
        assert!(curve_eligible(SUPERELEVATION_MIN_RUN, TRACK_GAUGE));
    }

    #[test]
    fn test_off_gauge_curve_not_eligible() {
        assert!(!curve_eligible(500.0, TRACK_GAUGE + GAUGE_TOLERANCE + 0.01));
        assert!(curve_eligible(500.0, TRACK_GAUGE + GAUGE_TOLERANCE - 0.01));
    }

    #[test]
    fn test_assign_cant_ramps_across_group() {
        // straight, then three curved sections of 0.2 rad at 600 m radius
        // (120 m run each), then straight.
        let mut store = store_with(&[
            DtrackData::straight(50.0),
            DtrackData::curved(0.2, 600.0),
            DtrackData::curved(0.2, 600.0),
            DtrackData::curved(0.2, 600.0),
            DtrackData::straight(50.0),
        ]);
        assign_cant(&mut store.sections, TRACK_GAUGE);

        let cants: Vec<CantProfile> = store.sections.iter().map(|s| s.cant).collect();
        assert!(cants[0].is_none());
        assert!(cants[4].is_none());

        let max = cants[1].max;
        assert!(max > 0.0);
        assert_eq!(cants[1].start, 0.0, "curve entry ramps from zero");
        assert_eq!(cants[1].end, max);
        assert_eq!(cants[2].start, max, "curve middle holds max");
        assert_eq!(cants[2].end, max);
        assert_eq!(cants[3].start, max);
        assert_eq!(cants[3].end, 0.0, "curve exit ramps to zero");
    }

    #[test]
    fn test_single_section_curve_is_island() {
        let mut store = store_with(&[
            DtrackData::straight(50.0),
            DtrackData::curved(0.4, 500.0),
            DtrackData::straight(50.0),
        ]);
        assign_cant(&mut store.sections, TRACK_GAUGE);
        let cant = store.sections[1].cant;
        assert!(cant.max > 0.0);
        assert_eq!(cant.start, 0.0);
        assert_eq!(cant.end, 0.0);
    }

    #[test]
    fn test_direction_change_splits_group() {
        let mut store = store_with(&[
            DtrackData::straight(30.0),
            DtrackData::curved(0.3, 600.0),
            DtrackData::curved(-0.3, 600.0),
            DtrackData::straight(30.0),
        ]);
        assign_cant(&mut store.sections, TRACK_GAUGE);
        // Each bend is its own curve, so each ramps up and back down alone.
        let a = store.sections[1].cant;
        let b = store.sections[2].cant;
        assert_eq!(a.start, 0.0);
        assert_eq!(a.end, 0.0);
        assert_eq!(b.start, 0.0);
        assert_eq!(b.end, 0.0);
    }

    #[test]
    fn test_ineligible_short_run_gets_no_cant() {
        let mut store = store_with(&[
            DtrackData::straight(30.0),
            DtrackData::curved(0.1, 400.0), // 40 m run, below the minimum
            DtrackData::straight(30.0),
        ]);
        assign_cant(&mut store.sections, TRACK_GAUGE);
        assert!(store.sections[1].cant.is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = CurveRegistry::default();
        assert!(registry.register((0, 0), SectionId(7)));
        assert!(!registry.register((0, 0), SectionId(7)));
        assert!(!registry.register((1, 0), SectionId(7)), "other tile too");
        assert!(registry.contains(SectionId(7)));
    }

    #[test]
    fn test_registry_remove_tile() {
        let mut registry = CurveRegistry::default();
        registry.register((0, 0), SectionId(1));
        registry.register((0, 0), SectionId(2));
        registry.register((1, 0), SectionId(3));
        let removed = registry.remove_tile((0, 0));
        assert_eq!(removed, vec![SectionId(1), SectionId(2)]);
        assert!(!registry.contains(SectionId(1)));
        assert!(registry.contains(SectionId(3)));
    }
}
