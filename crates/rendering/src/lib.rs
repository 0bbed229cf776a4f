use bevy::prelude::*;

pub mod lod_select;
pub mod materials;
pub mod track_mesh;
pub mod track_profile;
pub mod track_render;

pub struct RenderingPlugin;

impl Plugin for RenderingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<materials::TrackMaterials>()
            .init_resource::<lod_select::LodBias>()
            .add_systems(
                Startup,
                (
                    track_profile::load_track_profiles,
                    materials::preload_profile_textures,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (track_render::sync_track_meshes, lod_select::update_track_lod),
            );
    }
}
