//! Overhead wire generation.
//!
//! The horizontal wires (contact wire, and the messenger above it when
//! double-wire is on) ride the normal replication engine unchanged. The
//! vertical dropper polyline is different: it is excluded from the sweep and
//! instead stacked downward at every generated cross section, each copy
//! placed by that section's transform so droppers follow the curve.

use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

use super::{EmitContext, ReplicationStyle, SectionFrame, SectionPath, MAX_SECTIONS};
use crate::track_profile::{
    Lod, LodItem, ProfilePolyline, ProfileVertex, SuperElevationStyle, TrackProfile,
};
use simulation::track_sections::DtrackData;

/// Contact wire height above the railhead (meters).
const WIRE_HEIGHT: f32 = 5.75;

/// Vertical separation between contact and messenger wire (meters).
const WIRE_SEPARATION: f32 = 1.4;

/// Lateral offset between the two power lines of a triphase catenary.
const TRIPHASE_OFFSET: f32 = 0.6;

/// Half-width of one wire ribbon (meters).
const WIRE_HALF_WIDTH: f32 = 0.012;

/// Target distance between generated wire cross sections. Wire sags are not
/// modeled, so it does not need the rail mesh's chord tolerance.
const WIRE_SPAN_TARGET: f32 = 40.0;

/// The wire profile in its default arrangement: double wire, single phase.
pub fn wire_profile(gauge: f32) -> TrackProfile {
    wire_profile_with(gauge, true, false)
}

/// Build a wire profile. `double_wire` adds the messenger wire and the
/// vertical dropper; `triphase` spreads two power lines laterally at the
/// contact height instead of stacking them.
pub fn wire_profile_with(gauge: f32, double_wire: bool, triphase: bool) -> TrackProfile {
    let mut profile = TrackProfile::empty("Overhead wire");
    profile.gauge = gauge;
    profile.elevation_style = SuperElevationStyle::None;

    let mut item = LodItem::named("Wire");
    item.tex_name = "textures/wire.png".to_string();
    item.shader_name = "diffuse".to_string();
    item.light_model_name = "spec25".to_string();

    let wrap = Vec2::new(0.05, 0.0);
    let contact_x = if triphase { -TRIPHASE_OFFSET } else { 0.0 };
    item.polylines.push(wire_ribbon("TopWire", contact_x, WIRE_HEIGHT, wrap));

    if double_wire {
        let (second_x, second_y) = if triphase {
            (TRIPHASE_OFFSET, WIRE_HEIGHT)
        } else {
            (0.0, WIRE_HEIGHT + WIRE_SEPARATION)
        };
        item.polylines
            .push(wire_ribbon("TopWire1", second_x, second_y, wrap));

        if !triphase {
            let mut dropper = ProfilePolyline::new(
                "TopWireVertical",
                Vec2::new(0.0, 0.1),
                vec![
                    ProfileVertex::new(
                        -0.008,
                        WIRE_HEIGHT + WIRE_SEPARATION,
                        0.0,
                        0.0,
                        0.0,
                        -1.0,
                        0.45,
                        0.0,
                    ),
                    ProfileVertex::new(
                        0.008,
                        WIRE_HEIGHT + WIRE_SEPARATION,
                        0.0,
                        0.0,
                        0.0,
                        -1.0,
                        0.55,
                        0.0,
                    ),
                ],
            );
            dropper.vertical = true;
            item.polylines.push(dropper);
        }
    }

    let mut lod = Lod::new(1200.0);
    lod.items.push(item);
    profile.lods.push(lod);

    profile
        .finalize()
        .expect("built-in wire profile is always valid")
}

fn wire_ribbon(name: &str, x: f32, y: f32, wrap: Vec2) -> ProfilePolyline {
    ProfilePolyline::new(
        name,
        wrap,
        vec![
            ProfileVertex::new(x - WIRE_HALF_WIDTH, y, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0),
            ProfileVertex::new(x + WIRE_HALF_WIDTH, y, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0),
        ],
    )
}

/// [`ReplicationStyle`] for overhead wire: distance-based section spacing and
/// the vertical-stacking pass for droppers.
pub struct WireStyle;

impl ReplicationStyle for WireStyle {
    fn section_count(&self, _profile: &TrackProfile, data: &DtrackData) -> u32 {
        let spans = (data.run_length() / WIRE_SPAN_TARGET).ceil() as u32;
        if data.is_curved {
            let minimum = if data.param1.abs() > FRAC_PI_2 { 3 } else { 2 };
            spans.max(minimum).min(MAX_SECTIONS)
        } else {
            spans.max(1).min(MAX_SECTIONS)
        }
    }

    fn extra_vertex_count(&self, item: &LodItem, num_sections: u32) -> u32 {
        vertical_polylines(item)
            .map(|pl| 2 * pl.vertices.len() as u32 * (num_sections + 1))
            .sum()
    }

    fn extra_index_count(&self, item: &LodItem, num_sections: u32) -> u32 {
        vertical_polylines(item)
            .map(|pl| (pl.vertices.len() as u32 - 1) * 6 * (num_sections + 1))
            .sum()
    }

    fn emit_extra(
        &self,
        ctx: &mut EmitContext,
        item: &LodItem,
        path: &SectionPath,
        root_rotation: Quat,
    ) {
        // One dropper per generated cross section: the polyline is placed at
        // the section transform, then stacked straight down to the contact
        // wire, forming a short two-ring ribbon.
        for offset in 0..=path.num_sections {
            let frame = SectionFrame::at(path, root_rotation, offset, 0.0);
            for pl in vertical_polylines(item) {
                let stride = pl.vertices.len() as u16;
                for level in 0..2u32 {
                    for (plv, vertex) in pl.vertices.iter().enumerate() {
                        let (mut position, normal) = frame.place(vertex, false);
                        let mut uv = vertex.tex_coord;
                        if level == 1 {
                            position -= Vec3::Y * WIRE_SEPARATION;
                            uv += pl.delta_tex_coord * WIRE_SEPARATION;
                        }
                        ctx.positions.push(position.to_array());
                        ctx.normals.push(normal.to_array());
                        ctx.uvs.push(uv.to_array());

                        if level == 1 && plv > 0 {
                            let cur = (ctx.positions.len() - 1) as u16;
                            ctx.indices.push(cur);
                            ctx.indices.push(cur - 1 - stride);
                            ctx.indices.push(cur - 1);
                            ctx.indices.push(cur);
                            ctx.indices.push(cur - stride);
                            ctx.indices.push(cur - 1 - stride);
                        }
                    }
                }
            }
        }
    }
}

fn vertical_polylines(item: &LodItem) -> impl Iterator<Item = &ProfilePolyline> {
    item.polylines.iter().filter(|pl| pl.vertical)
}
