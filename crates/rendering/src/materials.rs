//! Shared material resolution for track meshes.
//!
//! Every LODItem describes its material as a tuple of texture, shader,
//! lighting model, alpha mode, address mode, and mip bias. All instances
//! asking for the same tuple share one `StandardMaterial` handle; the cache
//! lives for the route and is dropped with it.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::track_profile::{LodItem, TrackProfileSet};

/// Composite cache key for one material. The mip bias is stored as raw bits
/// so the key can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub tex_name: String,
    pub shader_name: String,
    pub light_model_name: String,
    pub alpha_test_mode: i32,
    pub tex_addr_mode: String,
    pub alternate_texture: u32,
    mip_bias_bits: u32,
}

impl MaterialKey {
    pub fn for_item(item: &LodItem) -> MaterialKey {
        MaterialKey {
            tex_name: item.tex_name.clone(),
            shader_name: item.shader_name.clone(),
            light_model_name: item.light_model_name.clone(),
            alpha_test_mode: item.alpha_test_mode,
            tex_addr_mode: item.tex_addr_mode.clone(),
            alternate_texture: item.alternate_texture,
            mip_bias_bits: item.mip_bias.to_bits(),
        }
    }

    pub fn mip_bias(&self) -> f32 {
        f32::from_bits(self.mip_bias_bits)
    }
}

/// Route-wide material cache: tuple -> shared handle.
#[derive(Resource, Default)]
pub struct TrackMaterials {
    cache: HashMap<MaterialKey, Handle<StandardMaterial>>,
}

impl TrackMaterials {
    /// Resolve a key to its shared handle, creating the material on first
    /// use. The caller supplies the texture handle (if any) so the cache
    /// itself stays independent of the asset server.
    pub fn resolve(
        &mut self,
        key: &MaterialKey,
        texture: Option<Handle<Image>>,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        if let Some(handle) = self.cache.get(key) {
            return handle.clone();
        }
        let material = StandardMaterial {
            base_color: Color::WHITE,
            base_color_texture: texture,
            perceptual_roughness: 0.9,
            alpha_mode: if key.alpha_test_mode > 0 {
                AlphaMode::Mask(0.5)
            } else {
                AlphaMode::Opaque
            },
            // Track ribbons are stitched clockwise; draw both faces rather
            // than depending on the backend's winding convention.
            double_sided: true,
            cull_mode: None,
            ..default()
        };
        let handle = materials.add(material);
        self.cache.insert(key.clone(), handle.clone());
        handle
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Handles to every texture referenced by the loaded profiles, requested up
/// front so materials resolve against already-loading images.
#[derive(Resource, Default)]
pub struct PreloadedTrackTextures(pub Vec<Handle<Image>>);

/// Startup system: kick off loads for the profiles' texture lists.
pub fn preload_profile_textures(
    profiles: Res<TrackProfileSet>,
    asset_server: Res<AssetServer>,
    mut commands: Commands,
) {
    let mut handles = Vec::new();
    for profile in profiles
        .profiles
        .iter()
        .chain(std::iter::once(&profiles.wire))
    {
        for image in &profile.images {
            handles.push(asset_server.load::<Image>(image.clone()));
        }
    }
    info!("preloading {} track texture(s)", handles.len());
    commands.insert_resource(PreloadedTrackTextures(handles));
}
