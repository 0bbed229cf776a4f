//! Per-frame LOD visibility for track meshes.
//!
//! Each spawned primitive carries the cutoff of its LOD and the cutoff of the
//! next more detailed LOD in the same profile. Visibility is a threshold
//! comparison against the camera distance, honoring the profile's LOD
//! combination method.

use bevy::prelude::*;

use crate::track_profile::LodMethod;

/// User-tunable scale on every LOD cutoff. 1.0 is neutral; larger values
/// keep detail visible further out.
#[derive(Resource)]
pub struct LodBias(pub f32);

impl Default for LodBias {
    fn default() -> Self {
        LodBias(1.0)
    }
}

/// Visibility parameters for one spawned track primitive.
#[derive(Component)]
pub struct LodVisibility {
    /// Midpoint of the owning section (chord center for curves).
    pub center: Vec3,
    /// Cutoff radius of this primitive's LOD.
    pub cutoff: f32,
    /// Cutoff of the next more detailed LOD, 0.0 for the most detailed one.
    /// Only consulted by the complete-replacement method.
    pub inner_cutoff: f32,
    pub method: LodMethod,
}

/// Whether a primitive should draw at the given camera distance.
pub fn should_draw_lod(
    distance: f32,
    cutoff: f32,
    inner_cutoff: f32,
    method: LodMethod,
    bias: f32,
) -> bool {
    match method {
        // Additive: everything in range draws, outer LODs under inner ones.
        LodMethod::ComponentAdditive => distance <= cutoff * bias,
        // Replacement: only the band between the inner cutoff and ours.
        LodMethod::CompleteReplacement => {
            distance <= cutoff * bias && distance > inner_cutoff * bias
        }
    }
}

/// Toggle visibility of every track primitive from the camera distance.
pub fn update_track_lod(
    bias: Res<LodBias>,
    camera: Query<&GlobalTransform, With<Camera3d>>,
    mut primitives: Query<(&LodVisibility, &mut Visibility)>,
) {
    let Ok(camera) = camera.get_single() else {
        return;
    };
    let camera_pos = camera.translation();
    for (lod, mut visibility) in &mut primitives {
        let distance = camera_pos.distance(lod.center);
        *visibility = if should_draw_lod(distance, lod.cutoff, lod.inner_cutoff, lod.method, bias.0)
        {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}
