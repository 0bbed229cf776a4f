//! Demo route placed at startup: a mainline with a long banked curve and an
//! electrified branch, enough to exercise every mesh-building path.

use bevy::prelude::*;

use crate::config::TRACK_GAUGE;
use crate::superelevation::{assign_cant, CurveRegistry};
use crate::track_sections::{DtrackData, TrackSectionStore};

/// Build the demo layout. Runs once at startup.
pub fn init_route(mut store: ResMut<TrackSectionStore>, mut registry: ResMut<CurveRegistry>) {
    // Mainline: approach straight, a sweeping 30 degree curve split into
    // three subsections so the cant ramps across them, then a departure.
    let mainline = [
        DtrackData::straight(200.0),
        DtrackData::curved(0.1745, 500.0),
        DtrackData::curved(0.1745, 500.0),
        DtrackData::curved(0.1745, 500.0),
        DtrackData::straight(150.0).with_delta_y(1.5),
    ];
    add_route_path(&mut store, &mut registry, &mainline, Transform::IDENTITY, false);

    // Electrified branch leaving to the left.
    let branch_origin = Transform::from_xyz(-6.0, 0.0, 0.0);
    let branch = [
        DtrackData::straight(120.0),
        DtrackData::curved(-0.5236, 300.0),
        DtrackData::straight(80.0),
    ];
    add_route_path(&mut store, &mut registry, &branch, branch_origin, true);

    info!("route initialized: {} track sections", store.sections.len());
}

/// Add one path, assign cant across its own sections only, and register the
/// banked ones so they are never banked twice.
pub fn add_route_path(
    store: &mut TrackSectionStore,
    registry: &mut CurveRegistry,
    subsections: &[DtrackData],
    origin: Transform,
    wired: bool,
) {
    let start = store.sections.len();
    store.add_path(subsections, origin, wired);
    let added = &mut store.sections[start..];
    assign_cant(added, TRACK_GAUGE);
    for section in added.iter() {
        if !section.cant.is_none() {
            registry.register(section.tile, section.id);
        }
    }
}
