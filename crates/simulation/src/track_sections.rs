//! Placed track sections and the decomposition walk that turns a
//! multi-subsection track path into individually-buildable pieces.
//!
//! Each placed piece carries a [`DtrackData`] (straight length or curve
//! radius + angle plus elevation change), a world transform for its root and
//! for its end, and the cant profile assigned by the superelevation pass.
//! The rendering crate consumes the store and builds one mesh per piece.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TILE_SIZE;
use crate::superelevation::CantProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub u32);

/// Minimal geometry descriptor for one track subsection.
///
/// `param1` is the length in meters when straight, or the turn angle in
/// radians when curved (sign picks the bend direction). `param2` is the curve
/// radius in meters, unused for straight pieces. `delta_y` is the elevation
/// change from the beginning to the end of the subsection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DtrackData {
    pub is_curved: bool,
    pub param1: f32,
    pub param2: f32,
    pub delta_y: f32,
}

impl DtrackData {
    pub fn straight(length: f32) -> Self {
        Self {
            is_curved: false,
            param1: length,
            ..Default::default()
        }
    }

    pub fn curved(angle: f32, radius: f32) -> Self {
        Self {
            is_curved: true,
            param1: angle,
            param2: radius,
            delta_y: 0.0,
        }
    }

    pub fn with_delta_y(mut self, delta_y: f32) -> Self {
        self.delta_y = delta_y;
        self
    }

    /// Distance traveled along the centerline, in meters.
    pub fn run_length(&self) -> f32 {
        if self.is_curved {
            self.param2 * self.param1.abs()
        } else {
            self.param1.abs()
        }
    }

    /// Zero-length subsections carry no geometry and are skipped everywhere.
    pub fn is_vacuous(&self) -> bool {
        self.param1 == 0.0
    }
}

/// One subsection with resolved world transforms for both of its ends.
#[derive(Debug, Clone, Copy)]
pub struct SubsectionPlacement {
    pub data: DtrackData,
    /// World transform at the start of the subsection.
    pub root: Transform,
    /// World transform at the end; becomes the root of the next subsection.
    pub end: Transform,
}

/// Walk a multi-subsection path and compute root/end world transforms for
/// every non-vacuous subsection.
///
/// The walk keeps all intermediate positions in the local frame of the path
/// origin: `heading` starts along local -Z, straight pieces advance along it,
/// curved pieces advance point-of-curve -> center -> point-of-tangent by
/// rotating about the vertical axis. Only the heading component of rotation
/// changes from piece to piece.
pub fn decompose(subsections: &[DtrackData], origin: Transform) -> Vec<SubsectionPlacement> {
    let mut placements = Vec::with_capacity(subsections.len());

    let world_rot = origin.rotation;
    let section_origin = origin.translation;

    let mut local_v = Vec3::ZERO;
    let mut heading = Vec3::NEG_Z;
    let mut cursor = Transform::from_translation(section_origin).with_rotation(world_rot);

    for data in subsections {
        if data.is_vacuous() {
            continue;
        }
        let root = cursor;

        let local_projected;
        let end_rot;
        if data.is_curved {
            // Signed radius puts the curve center on the correct side: a
            // positive turn angle bends right, center at local +x.
            let radius = data.param2 * -data.param1.signum();
            let to_center = radius * Vec3::Y.cross(heading);
            let rot = Quat::from_rotation_y(-data.param1);
            let from_center = rot * -to_center;
            local_projected = local_v + to_center + from_center;
            heading = rot * heading;
            end_rot = root.rotation * rot;
        } else {
            local_projected = local_v + data.param1 * heading;
            end_rot = root.rotation;
        }
        let displacement = world_rot * local_projected;

        let end = Transform::from_translation(section_origin + displacement).with_rotation(end_rot);
        placements.push(SubsectionPlacement {
            data: *data,
            root,
            end,
        });
        cursor = end;
        local_v = local_projected;
    }
    placements
}

/// World tile containing a position. Sections are bucketed by tile so curve
/// bookkeeping can be removed when a tile unloads.
pub fn tile_of(position: Vec3) -> (i32, i32) {
    (
        (position.x / TILE_SIZE).floor() as i32,
        (position.z / TILE_SIZE).floor() as i32,
    )
}

/// One placed, buildable track piece.
#[derive(Debug, Clone, Copy)]
pub struct TrackSection {
    pub id: SectionId,
    pub data: DtrackData,
    pub root: Transform,
    pub end: Transform,
    pub cant: CantProfile,
    /// Section carries overhead wire in addition to the rail mesh.
    pub wired: bool,
    pub tile: (i32, i32),
}

/// All placed track sections for the loaded route.
#[derive(Resource, Default)]
pub struct TrackSectionStore {
    pub sections: Vec<TrackSection>,
    next_id: u32,
    removed: Vec<SectionId>,
}

impl TrackSectionStore {
    /// Decompose a path at `origin` and add every non-vacuous subsection.
    /// Returns the ids added, in path order.
    pub fn add_path(
        &mut self,
        subsections: &[DtrackData],
        origin: Transform,
        wired: bool,
    ) -> Vec<SectionId> {
        let mut added = Vec::new();
        for placement in decompose(subsections, origin) {
            let id = SectionId(self.next_id);
            self.next_id += 1;
            self.sections.push(TrackSection {
                id,
                data: placement.data,
                root: placement.root,
                end: placement.end,
                cant: CantProfile::NONE,
                wired,
                tile: tile_of(placement.root.translation),
            });
            added.push(id);
        }
        added
    }

    pub fn get(&self, id: SectionId) -> Option<&TrackSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn remove(&mut self, id: SectionId) {
        if let Some(pos) = self.sections.iter().position(|s| s.id == id) {
            self.sections.remove(pos);
            self.removed.push(id);
        }
    }

    /// Whether any removals are waiting to be drained.
    pub fn removed_pending(&self) -> bool {
        !self.removed.is_empty()
    }

    /// Ids removed since the last drain; consumed by the mesh sync system.
    pub fn drain_removed(&mut self) -> Vec<SectionId> {
        std::mem::take(&mut self.removed)
    }
}
