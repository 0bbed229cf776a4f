//! Cross-section replication: turns a track profile plus one section's
//! geometry into triangle meshes.
//!
//! For each LODItem the engine generates `num_sections + 1` copies of the
//! item's polylines, each transformed into place along the section (translated
//! for straight track, rotated about the curve center for arcs), and stitches
//! consecutive copies into a triangulated ribbon. Texture coordinates advance
//! by each polyline's `delta_tex_coord` times the distance run, so textures
//! tile seamlessly across section boundaries. The superelevation and
//! overhead-wire variants plug into the same engine through
//! [`ReplicationStyle`].

mod superelevation;
mod tests;
mod wire;

pub use superelevation::{RampCase, RollPlan, SuperelevationStyle};
pub use wire::{wire_profile, wire_profile_with, WireStyle};

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use std::fmt;

use crate::materials::MaterialKey;
use crate::track_profile::{LodItem, PitchControl, ProfileVertex, TrackProfile};
use simulation::track_sections::DtrackData;

/// Hard ceiling on generated cross sections per track piece. Triangle
/// indices are 16-bit; this bound, together with profile validation, keeps
/// the highest vertex index addressable.
pub const MAX_SECTIONS: u32 = 250;

// ---------------------------------------------------------------------------
// Build output
// ---------------------------------------------------------------------------

/// One renderable sub-mesh: the generated geometry for a single LODItem.
pub struct TrackPrimitive {
    pub item_name: String,
    pub mesh: Mesh,
    pub material: MaterialKey,
    pub lod_index: usize,
}

/// Contiguous range of primitives belonging to one LOD, with its cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodRange {
    pub start: usize,
    pub stop: usize,
    pub cutoff_radius: f32,
}

/// Everything the renderer needs for one placed track piece.
pub struct BuiltTrackShape {
    /// One primitive per LODItem across all LODs, in profile order.
    pub primitives: Vec<TrackPrimitive>,
    /// Per LOD, the sub-range of `primitives` it owns.
    pub lod_ranges: Vec<LodRange>,
    /// Bounding sphere radius for culling: half length for straight pieces,
    /// half chord for arcs.
    pub object_radius: f32,
}

#[derive(Debug)]
pub enum MeshBuildError {
    /// Zero-length sections must be filtered out by the caller.
    VacuousSection,
    /// The profile would need vertex indices past the 16-bit range.
    IndexOverflow { item: String, vertices: u32 },
}

impl fmt::Display for MeshBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshBuildError::VacuousSection => write!(f, "cannot build a zero-length section"),
            MeshBuildError::IndexOverflow { item, vertices } => write!(
                f,
                "LODItem {item} needs {vertices} vertices, past the 16-bit index range"
            ),
        }
    }
}

impl std::error::Error for MeshBuildError {}

// ---------------------------------------------------------------------------
// Section count
// ---------------------------------------------------------------------------

/// Number of cross sections for one piece. Pure: identical inputs always
/// yield the same count, and the result is even, at least 2, and at most
/// [`MAX_SECTIONS`] for curves (straight pieces always use exactly 1).
pub fn compute_section_count(profile: &TrackProfile, data: &DtrackData) -> u32 {
    if !data.is_curved {
        return 1;
    }
    let angle = data.param1.abs();
    let mut sections = (angle.to_degrees() / profile.chord_span) as u32;
    if sections < 2 {
        sections = 2;
    }

    // Pitch control rebounds the count from its own spacing target. The
    // inverse-trig inputs are clamped so a threshold larger than the curve
    // can express falls back to the chord-span estimate.
    match profile.pitch_control {
        PitchControl::None => {}
        PitchControl::ChordLength => {
            if data.param2 > 0.0 {
                let ratio = 0.5 * profile.pitch_control_scalar / data.param2;
                if ratio > 0.0 && ratio < 1.0 {
                    let chord_angle = 2.0 * ratio.asin();
                    if chord_angle > 0.0 {
                        sections = ((angle / chord_angle) as u32).max(2);
                    }
                }
            }
        }
        PitchControl::ChordDisplacement => {
            if data.param2 > 0.0 {
                let ratio = 1.0 - profile.pitch_control_scalar / data.param2;
                if ratio > -1.0 && ratio < 1.0 {
                    let chord_angle = 2.0 * ratio.acos();
                    if chord_angle > 0.0 {
                        sections = ((angle / chord_angle) as u32).max(2);
                    }
                }
            }
        }
    }

    let mut sections = sections.clamp(2, MAX_SECTIONS);
    // The superelevation ramps split a piece at its midpoint; an even count
    // keeps that split on a section boundary.
    if sections % 2 == 1 {
        sections += 1;
    }
    sections
}

// ---------------------------------------------------------------------------
// Per-section transforms
// ---------------------------------------------------------------------------

/// Shared geometric state for one piece: how to place cross section `offset`.
pub struct SectionPath {
    curved: bool,
    /// Meters per step when straight, radians per step when curved (signed).
    segment_length: f32,
    delta_y_step: f32,
    /// Local curve center; the bend direction picks the side.
    center: Vec3,
    /// Distance run between consecutive cross sections; drives texture wrap.
    step_run: f32,
    pub num_sections: u32,
}

impl SectionPath {
    pub fn new(data: &DtrackData, num_sections: u32) -> Self {
        let segment_length = data.param1 / num_sections as f32;
        let delta_y_step = data.delta_y / num_sections as f32;
        let (center, step_run) = if data.is_curved {
            let center = data.param2 * if data.param1 < 0.0 { Vec3::NEG_X } else { Vec3::X };
            // Centerline chord between consecutive sections, in-plane.
            let step_run = 2.0 * data.param2 * (0.5 * segment_length.abs()).sin();
            (center, step_run)
        } else {
            let step_run = Vec2::new(segment_length, delta_y_step).length();
            (Vec3::ZERO, step_run)
        };
        Self {
            curved: data.is_curved,
            segment_length,
            delta_y_step,
            center,
            step_run,
            num_sections,
        }
    }

    /// Cross-section origin in the piece's local frame.
    fn origin_at(&self, offset: u32) -> Vec3 {
        let dy = Vec3::Y * (self.delta_y_step * offset as f32);
        if self.curved {
            let rot = Quat::from_rotation_y(-self.segment_length * offset as f32);
            self.center + rot * -self.center + dy
        } else {
            Vec3::new(0.0, 0.0, -self.segment_length * offset as f32) + dy
        }
    }

    /// Travel direction at a cross section, local frame, roll-free.
    fn forward_at(&self, offset: u32) -> Vec3 {
        if self.curved {
            Quat::from_rotation_y(-self.segment_length * offset as f32) * Vec3::NEG_Z
        } else {
            Vec3::NEG_Z
        }
    }
}

/// Basis of one placed cross section. `right`/`up` are roll-free;
/// `right_rolled`/`up_rolled` include the style's roll for vertices that
/// follow it.
pub struct SectionFrame {
    pub origin: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub back: Vec3,
    pub right_rolled: Vec3,
    pub up_rolled: Vec3,
    /// Distance run from the piece root to this cross section.
    pub tot_length: f32,
}

impl SectionFrame {
    /// Place cross section `offset`, applying the root orientation and
    /// re-deriving the lateral basis from the global up vector. The
    /// re-derivation strips any roll the root orientation carries, which is
    /// what keeps long chains of sections from slowly corkscrewing.
    pub fn at(path: &SectionPath, root_rotation: Quat, offset: u32, roll: f32) -> SectionFrame {
        let origin = root_rotation * path.origin_at(offset);
        let forward = root_rotation * path.forward_at(offset);

        let mut left = Vec3::Y.cross(forward).normalize_or_zero();
        if left == Vec3::ZERO {
            // Vertical track; fall back to the root's own lateral axis.
            left = root_rotation * Vec3::NEG_X;
        }
        let mut up = forward.cross(left).normalize();
        let mut right = -left;
        // An inverted root would render the profile upside-down; rotate it
        // 180 degrees about the forward axis instead.
        if up.y < 0.0 {
            up = -up;
            right = -right;
        }

        let (right_rolled, up_rolled) = if roll != 0.0 {
            let (sin, cos) = roll.sin_cos();
            (cos * right + sin * up, -sin * right + cos * up)
        } else {
            (right, up)
        };

        SectionFrame {
            origin,
            right,
            up,
            back: -forward,
            right_rolled,
            up_rolled,
            tot_length: path.step_run * offset as f32,
        }
    }

    fn place(&self, vertex: &ProfileVertex, rolled: bool) -> (Vec3, Vec3) {
        let (right, up) = if rolled {
            (self.right_rolled, self.up_rolled)
        } else {
            (self.right, self.up)
        };
        let p = vertex.position;
        let n = vertex.normal;
        (
            self.origin + p.x * right + p.y * up + p.z * self.back,
            n.x * right + n.y * up + n.z * self.back,
        )
    }
}

// ---------------------------------------------------------------------------
// Replication styles
// ---------------------------------------------------------------------------

/// Scratch buffers for one LODItem build, exposed to styles that append
/// extra geometry after the normal sweep.
pub struct EmitContext {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u16>,
}

/// Strategy hooks for the three mesh variants (plain, superelevated, wire).
pub trait ReplicationStyle {
    fn section_count(&self, profile: &TrackProfile, data: &DtrackData) -> u32 {
        compute_section_count(profile, data)
    }

    /// Signed roll at a section boundary, radians.
    fn roll_at(&self, _offset: u32, _num_sections: u32) -> f32 {
        0.0
    }

    /// Whether this vertex follows the roll rotation.
    fn vertex_rolls(&self, _vertex: &ProfileVertex) -> bool {
        true
    }

    fn extra_vertex_count(&self, _item: &LodItem, _num_sections: u32) -> u32 {
        0
    }

    fn extra_index_count(&self, _item: &LodItem, _num_sections: u32) -> u32 {
        0
    }

    /// Append extra geometry (wire droppers) once the sweep is complete.
    fn emit_extra(
        &self,
        _ctx: &mut EmitContext,
        _item: &LodItem,
        _path: &SectionPath,
        _root_rotation: Quat,
    ) {
    }
}

/// The unmodified engine: no roll, no extra geometry.
pub struct PlainStyle;

impl ReplicationStyle for PlainStyle {}

// ---------------------------------------------------------------------------
// The builder
// ---------------------------------------------------------------------------

/// Build every LODItem of every LOD for one placed piece.
///
/// The mesh is emitted in the piece's oriented local space (root rotation
/// baked in); the caller spawns it at the root translation. The elevation
/// change `delta_y` and the curve direction come from `data`; the roll comes
/// from `style`.
pub fn build_track_shape(
    profile: &TrackProfile,
    data: &DtrackData,
    root_rotation: Quat,
    style: &dyn ReplicationStyle,
) -> Result<BuiltTrackShape, MeshBuildError> {
    if data.is_vacuous() {
        return Err(MeshBuildError::VacuousSection);
    }

    let num_sections = style.section_count(profile, data);
    let path = SectionPath::new(data, num_sections);

    // Frames are shared by every LODItem; compute them once.
    let frames: Vec<SectionFrame> = (0..=num_sections)
        .map(|offset| {
            SectionFrame::at(
                &path,
                root_rotation,
                offset,
                style.roll_at(offset, num_sections),
            )
        })
        .collect();

    let mut primitives = Vec::new();
    let mut lod_ranges = Vec::with_capacity(profile.lods.len());

    for (lod_index, lod) in profile.lods.iter().enumerate() {
        let start = primitives.len();
        for item in &lod.items {
            let mesh = build_lod_item(item, &path, &frames, style, root_rotation, num_sections)?;
            primitives.push(TrackPrimitive {
                item_name: item.name.clone(),
                mesh,
                material: MaterialKey::for_item(item),
                lod_index,
            });
        }
        lod_ranges.push(LodRange {
            start,
            stop: primitives.len(),
            cutoff_radius: lod.cutoff_radius,
        });
    }

    let object_radius = if data.is_curved {
        data.param2 * (0.5 * data.param1.abs()).sin()
    } else {
        0.5 * data.param1.abs()
    };

    Ok(BuiltTrackShape {
        primitives,
        lod_ranges,
        object_radius,
    })
}

fn build_lod_item(
    item: &LodItem,
    path: &SectionPath,
    frames: &[SectionFrame],
    style: &dyn ReplicationStyle,
    root_rotation: Quat,
    num_sections: u32,
) -> Result<Mesh, MeshBuildError> {
    let stride = item.sweep_vertex_count();
    let vertex_count = stride * (num_sections + 1) + style.extra_vertex_count(item, num_sections);
    let index_count =
        item.sweep_segment_count() * num_sections * 6 + style.extra_index_count(item, num_sections);

    if vertex_count > u16::MAX as u32 + 1 {
        return Err(MeshBuildError::IndexOverflow {
            item: item.name.clone(),
            vertices: vertex_count,
        });
    }

    let mut ctx = EmitContext {
        positions: Vec::with_capacity(vertex_count as usize),
        normals: Vec::with_capacity(vertex_count as usize),
        uvs: Vec::with_capacity(vertex_count as usize),
        indices: Vec::with_capacity(index_count as usize),
    };

    for (section, frame) in frames.iter().enumerate() {
        for pl in item.polylines.iter().filter(|pl| !pl.vertical) {
            for (plv, vertex) in pl.vertices.iter().enumerate() {
                let (position, normal) = frame.place(vertex, style.vertex_rolls(vertex));
                let uv = vertex.tex_coord + pl.delta_tex_coord * frame.tot_length;
                ctx.positions.push(position.to_array());
                ctx.normals.push(normal.to_array());
                ctx.uvs.push(uv.to_array());

                if section > 0 && plv > 0 {
                    // Sense for triangles is clockwise.
                    let cur = (ctx.positions.len() - 1) as u16;
                    let stride = stride as u16;
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

    style.emit_extra(&mut ctx, item, path, root_rotation);

    debug_assert_eq!(ctx.positions.len(), vertex_count as usize);
    debug_assert_eq!(ctx.indices.len(), index_count as usize);

    Ok(Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, ctx.positions)
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, ctx.normals)
    .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, ctx.uvs)
    .with_inserted_indices(Indices::U16(ctx.indices)))
}
