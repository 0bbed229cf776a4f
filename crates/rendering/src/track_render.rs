//! Synchronize track meshes with the placed-section store.
//!
//! Spawns one entity per generated primitive for new sections (plain,
//! banked, and wired variants), despawns entities for removed sections, and
//! keeps going when a single build fails: the offending section is logged and
//! skipped so the rest of the route still loads.

use bevy::prelude::*;
use std::collections::HashSet;

use simulation::track_sections::{SectionId, TrackSection, TrackSectionStore};

use crate::lod_select::LodVisibility;
use crate::materials::TrackMaterials;
use crate::track_mesh::{
    build_track_shape, BuiltTrackShape, PlainStyle, SuperelevationStyle, WireStyle,
};
use crate::track_profile::{LodMethod, TrackProfileSet};

/// Marker for one spawned track primitive.
#[derive(Component)]
pub struct TrackPieceMesh {
    pub section_id: SectionId,
    pub lod_index: usize,
    /// Bounding sphere radius of the whole piece.
    pub object_radius: f32,
}

/// Build meshes for new sections, drop meshes for removed ones.
#[allow(clippy::too_many_arguments)]
pub fn sync_track_meshes(
    mut store: ResMut<TrackSectionStore>,
    profiles: Res<TrackProfileSet>,
    existing: Query<(Entity, &TrackPieceMesh)>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut material_cache: ResMut<TrackMaterials>,
    asset_server: Res<AssetServer>,
) {
    if !store.is_changed() {
        return;
    }

    if store.removed_pending() {
        let removed: HashSet<SectionId> = store.drain_removed().into_iter().collect();
        for (entity, piece) in &existing {
            if removed.contains(&piece.section_id) {
                commands.entity(entity).despawn();
            }
        }
    }

    let existing_ids: HashSet<SectionId> = existing.iter().map(|(_, m)| m.section_id).collect();

    for section in &store.sections {
        if existing_ids.contains(&section.id) || section.data.is_vacuous() {
            continue;
        }

        // Dynamic track always uses the default profile slot.
        let profile = profiles.default_profile();
        let result = if section.cant.is_none() {
            build_track_shape(profile, &section.data, section.root.rotation, &PlainStyle)
        } else {
            let style =
                SuperelevationStyle::new(&section.cant, &section.data, profile.elevation_style);
            build_track_shape(profile, &section.data, section.root.rotation, &style)
        };
        match result {
            Ok(shape) => spawn_shape(
                &mut commands,
                &mut meshes,
                &mut materials,
                &mut material_cache,
                &asset_server,
                section,
                profile.lod_method,
                shape,
            ),
            Err(e) => {
                warn!("track mesh build failed for {:?}: {e}; skipped", section.id);
            }
        }

        if section.wired {
            match build_track_shape(
                &profiles.wire,
                &section.data,
                section.root.rotation,
                &WireStyle,
            ) {
                Ok(shape) => spawn_shape(
                    &mut commands,
                    &mut meshes,
                    &mut materials,
                    &mut material_cache,
                    &asset_server,
                    section,
                    profiles.wire.lod_method,
                    shape,
                ),
                Err(e) => {
                    warn!("wire mesh build failed for {:?}: {e}; skipped", section.id);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_shape(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    material_cache: &mut TrackMaterials,
    asset_server: &AssetServer,
    section: &TrackSection,
    lod_method: LodMethod,
    shape: BuiltTrackShape,
) {
    // LOD distances measure from the section midpoint (chord center on
    // curves), not the root.
    let center = 0.5 * (section.root.translation + section.end.translation);

    // Map each primitive to its LOD's cutoffs. LODs are ordered most
    // detailed first, so the previous range carries the inner cutoff.
    let mut cutoffs: Vec<(f32, f32)> = Vec::with_capacity(shape.lod_ranges.len());
    let mut inner = 0.0;
    for range in &shape.lod_ranges {
        cutoffs.push((range.cutoff_radius, inner));
        inner = range.cutoff_radius;
    }

    for primitive in shape.primitives {
        let (cutoff, inner_cutoff) = cutoffs[primitive.lod_index];
        let texture = (!primitive.material.tex_name.is_empty())
            .then(|| asset_server.load(primitive.material.tex_name.clone()));
        let material = material_cache.resolve(&primitive.material, texture, materials);
        commands.spawn((
            TrackPieceMesh {
                section_id: section.id,
                lod_index: primitive.lod_index,
                object_radius: shape.object_radius,
            },
            Mesh3d(meshes.add(primitive.mesh)),
            MeshMaterial3d(material),
            Transform::from_translation(section.root.translation),
            LodVisibility {
                center,
                cutoff,
                inner_cutoff,
                method: lod_method,
            },
        ));
    }
}
