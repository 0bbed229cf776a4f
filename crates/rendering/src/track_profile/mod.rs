//! Track profile data model: a reusable cross-section template for rail,
//! ballast, and overhead wire, organized into levels of detail.
//!
//! A profile is a tree: `TrackProfile` -> `Lod` (distance band) -> `LodItem`
//! (one named sub-mesh with its own material) -> `ProfilePolyline` (connected
//! chain of cross-section vertices) -> `ProfileVertex`. Profiles are built
//! once when a route loads -- from the built-in default, a legacy `.dat`
//! file, or an XML file -- then shared immutably by every placed track piece.

mod error;
mod legacy;
mod profiles;
mod select;
mod xml;

pub use error::ProfileError;
pub use legacy::parse_legacy_profile;
pub use profiles::{load_profile_file, load_profiles_from_dir, load_track_profiles, TrackProfileSet};
pub use select::{best_profile, wildcard_match, ShapeDescription};
pub use xml::parse_xml_profile;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::track_mesh::MAX_SECTIONS;

/// How the LODs of a profile combine at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LodMethod {
    /// Every LOD whose cutoff covers the camera distance is drawn; nearer
    /// LODs add detail on top of the farther ones.
    #[default]
    ComponentAdditive,
    /// Only the nearest in-range LOD is drawn; each LOD is a complete model.
    CompleteReplacement,
}

/// Policy bounding the spacing of generated cross sections on curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PitchControl {
    #[default]
    None,
    /// Bound the chord length between consecutive cross sections (meters).
    ChordLength,
    /// Bound the chord-to-arc displacement (sagitta, meters).
    ChordDisplacement,
}

/// Which rail(s) of the cross section rotate under superelevation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuperElevationStyle {
    None,
    #[default]
    Both,
    Outside,
    Inside,
}

/// Per-vertex tag deciding whether the vertex follows the rotating profile
/// under superelevation. `Inside`/`Outside` are resolved against the curve
/// direction at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositionControl {
    None,
    #[default]
    All,
    Inside,
    Outside,
}

impl LodMethod {
    /// Unknown strings fall back to the additive method.
    pub fn parse(s: &str) -> LodMethod {
        match s.to_ascii_lowercase().as_str() {
            "completereplacement" => LodMethod::CompleteReplacement,
            _ => LodMethod::ComponentAdditive,
        }
    }
}

impl PitchControl {
    pub fn parse(s: &str) -> PitchControl {
        match s.to_ascii_lowercase().as_str() {
            "chordlength" => PitchControl::ChordLength,
            "chorddisplacement" => PitchControl::ChordDisplacement,
            _ => PitchControl::None,
        }
    }
}

impl SuperElevationStyle {
    pub fn parse(s: &str) -> SuperElevationStyle {
        match s.to_ascii_lowercase().as_str() {
            "none" => SuperElevationStyle::None,
            "outside" => SuperElevationStyle::Outside,
            "inside" => SuperElevationStyle::Inside,
            _ => SuperElevationStyle::Both,
        }
    }
}

impl PositionControl {
    pub fn parse(s: &str) -> PositionControl {
        match s.to_ascii_lowercase().as_str() {
            "none" => PositionControl::None,
            "inside" => PositionControl::Inside,
            "outside" => PositionControl::Outside,
            _ => PositionControl::All,
        }
    }
}

/// One point of the base cross section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub position_control: PositionControl,
}

impl ProfileVertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32, u: f32, v: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            normal: Vec3::new(nx, ny, nz),
            tex_coord: Vec2::new(u, v),
            position_control: PositionControl::All,
        }
    }

    pub fn with_control(mut self, control: PositionControl) -> Self {
        self.position_control = control;
        self
    }
}

/// One connected chain of cross-section vertices (a rail side, a ballast
/// slope, a wire). `delta_tex_coord` is the per-meter UV increment applied as
/// the polyline sweeps along the section, which is what keeps textures
/// continuous across section boundaries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfilePolyline {
    pub name: String,
    pub delta_tex_coord: Vec2,
    pub vertices: Vec<ProfileVertex>,
    /// Vertical polylines (wire droppers) are excluded from the normal sweep
    /// and replicated by the wire builder's vertical-stacking pass.
    pub vertical: bool,
}

impl ProfilePolyline {
    pub fn new(name: &str, delta_tex_coord: Vec2, vertices: Vec<ProfileVertex>) -> Self {
        Self {
            name: name.to_string(),
            delta_tex_coord,
            vertices,
            vertical: false,
        }
    }
}

/// One named sub-mesh within an LOD, carrying the material description and
/// the polylines that make up its share of the cross section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LodItem {
    pub name: String,
    pub tex_name: String,
    pub shader_name: String,
    pub light_model_name: String,
    pub alpha_test_mode: i32,
    pub tex_addr_mode: String,
    pub alternate_texture: u32,
    pub mip_bias: f32,
    pub polylines: Vec<ProfilePolyline>,
    /// Total vertices across all polylines; sizes the vertex buffer.
    pub num_vertices: u32,
    /// Total line segments across all polylines; sizes the index buffer.
    pub num_segments: u32,
}

impl LodItem {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tex_addr_mode: "Wrap".to_string(),
            ..Default::default()
        }
    }

    /// Recompute vertex/segment totals from the polyline list in one pass.
    /// Called once after parsing completes.
    pub fn compute_totals(&mut self) {
        self.num_vertices = self.polylines.iter().map(|pl| pl.vertices.len() as u32).sum();
        self.num_segments = self
            .polylines
            .iter()
            .map(|pl| pl.vertices.len().saturating_sub(1) as u32)
            .sum();
    }

    /// Vertices taking part in the normal sweep (vertical polylines excluded).
    pub fn sweep_vertex_count(&self) -> u32 {
        self.polylines
            .iter()
            .filter(|pl| !pl.vertical)
            .map(|pl| pl.vertices.len() as u32)
            .sum()
    }

    /// Segments taking part in the normal sweep.
    pub fn sweep_segment_count(&self) -> u32 {
        self.polylines
            .iter()
            .filter(|pl| !pl.vertical)
            .map(|pl| pl.vertices.len().saturating_sub(1) as u32)
            .sum()
    }
}

/// One level of detail: a cutoff radius and the sub-meshes drawn inside it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lod {
    /// Distance beyond which this LOD is not drawn (meters).
    pub cutoff_radius: f32,
    pub items: Vec<LodItem>,
}

impl Lod {
    pub fn new(cutoff_radius: f32) -> Self {
        Self {
            cutoff_radius,
            items: Vec::new(),
        }
    }
}

/// The root template for a cross-section family. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackProfile {
    pub name: String,
    pub lod_method: LodMethod,
    /// Maximum degrees of arc represented by one generated cross section.
    pub chord_span: f32,
    pub pitch_control: PitchControl,
    /// Threshold for the pitch control method, in meters.
    pub pitch_control_scalar: f32,
    /// Gauge the profile geometry is built for, in meters.
    pub gauge: f32,
    pub elevation_style: SuperElevationStyle,
    /// Wildcard filters used by profile selection; empty lists mean "no
    /// filter defined", which routes selection through the overlap heuristic.
    pub included_shapes: Vec<String>,
    pub excluded_shapes: Vec<String>,
    pub included_textures: Vec<String>,
    pub excluded_textures: Vec<String>,
    /// Ordered outer to inner, by increasing detail.
    pub lods: Vec<Lod>,
    /// Distinct texture names across all LODItems, for preloading.
    pub images: Vec<String>,
}

impl TrackProfile {
    /// Skeleton with sensible field defaults and no LODs. Callers fill in
    /// LODs and then run [`TrackProfile::finalize`].
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lod_method: LodMethod::ComponentAdditive,
            chord_span: 1.0,
            pitch_control: PitchControl::None,
            pitch_control_scalar: 0.0,
            gauge: simulation::config::TRACK_GAUGE,
            elevation_style: SuperElevationStyle::Both,
            included_shapes: Vec::new(),
            excluded_shapes: Vec::new(),
            included_textures: Vec::new(),
            excluded_textures: Vec::new(),
            lods: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Compute totals, collect texture names, and validate. Every profile
    /// goes through this exactly once before it is shared.
    pub fn finalize(mut self) -> Result<TrackProfile, ProfileError> {
        for lod in &mut self.lods {
            for item in &mut lod.items {
                item.compute_totals();
            }
        }
        self.collect_images();
        self.validate()?;
        Ok(self)
    }

    fn collect_images(&mut self) {
        self.images.clear();
        for lod in &self.lods {
            for item in &lod.items {
                if !item.tex_name.is_empty() && !self.images.contains(&item.tex_name) {
                    self.images.push(item.tex_name.clone());
                }
            }
        }
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.lods.is_empty() {
            return Err(ProfileError::MissingLods);
        }
        for lod in &self.lods {
            if lod.cutoff_radius <= 0.0 {
                return Err(ProfileError::BadLod(format!(
                    "cutoff radius {} must be positive",
                    lod.cutoff_radius
                )));
            }
            if lod.items.is_empty() {
                return Err(ProfileError::BadLod("LOD defines no LODItems".to_string()));
            }
            for item in &lod.items {
                if item.polylines.is_empty() {
                    return Err(ProfileError::MissingPolylines(item.name.clone()));
                }
                for pl in &item.polylines {
                    if pl.vertices.is_empty() {
                        return Err(ProfileError::MissingVertices(pl.name.clone()));
                    }
                }
                // Even the minimum section count must not push the highest
                // vertex index past what a 16-bit index can address.
                if item.num_vertices * (MAX_SECTIONS + 1) > u16::MAX as u32 + 1 {
                    return Err(ProfileError::TooManyVertices {
                        item: item.name.clone(),
                        vertices: item.num_vertices,
                    });
                }
            }
        }
        Ok(())
    }

    /// The built-in default profile: railsides, railtops, and ballast for a
    /// reference standard-gauge track, scaled to the requested gauge.
    pub fn default_profile(gauge: f32) -> TrackProfile {
        let scale = gauge / simulation::config::REFERENCE_GAUGE;
        let inner = gauge / 2.0;
        let outer = inner + 0.15 * scale;

        let mut profile = TrackProfile::empty("Default track profile");
        profile.gauge = gauge;
        profile.pitch_control = PitchControl::ChordLength;
        profile.pitch_control_scalar = 10.0;

        // Railsides: four vertical faces, two per rail.
        let mut railsides = LodItem::named("Railsides");
        railsides.tex_name = "textures/rails.png".to_string();
        railsides.shader_name = "diffuse".to_string();
        railsides.light_model_name = "spec0".to_string();
        let side_delta = Vec2::new(0.167_337_2, 0.0);
        railsides.polylines = vec![
            ProfilePolyline::new(
                "left_outer",
                side_delta,
                vec![
                    ProfileVertex::new(-outer, 0.200, 0.0, -1.0, 0.0, 0.0, -0.139_362, 0.101_563),
                    ProfileVertex::new(-outer, 0.325, 0.0, -1.0, 0.0, 0.0, -0.139_363, 0.003_906),
                ],
            ),
            ProfilePolyline::new(
                "left_inner",
                side_delta,
                vec![
                    ProfileVertex::new(-inner, 0.325, 0.0, 1.0, 0.0, 0.0, -0.139_363, 0.003_906),
                    ProfileVertex::new(-inner, 0.200, 0.0, 1.0, 0.0, 0.0, -0.139_362, 0.101_563),
                ],
            ),
            ProfilePolyline::new(
                "right_inner",
                side_delta,
                vec![
                    ProfileVertex::new(inner, 0.200, 0.0, -1.0, 0.0, 0.0, -0.139_362, 0.101_563),
                    ProfileVertex::new(inner, 0.325, 0.0, -1.0, 0.0, 0.0, -0.139_363, 0.003_906),
                ],
            ),
            ProfilePolyline::new(
                "right_outer",
                side_delta,
                vec![
                    ProfileVertex::new(outer, 0.325, 0.0, 1.0, 0.0, 0.0, -0.139_363, 0.003_906),
                    ProfileVertex::new(outer, 0.200, 0.0, 1.0, 0.0, 0.0, -0.139_362, 0.101_563),
                ],
            ),
        ];
        let mut lod = Lod::new(700.0);
        lod.items.push(railsides);
        profile.lods.push(lod);

        // Railtops: two horizontal running surfaces.
        let mut railtops = LodItem::named("Railtops");
        railtops.tex_name = "textures/rails.png".to_string();
        railtops.shader_name = "diffuse".to_string();
        railtops.light_model_name = "spec25".to_string();
        let top_delta = Vec2::new(0.074_472_6, 0.0);
        railtops.polylines = vec![
            ProfilePolyline::new(
                "left",
                top_delta,
                vec![
                    ProfileVertex::new(-outer, 0.325, 0.0, 0.0, 1.0, 0.0, 0.232_067, 0.126_953),
                    ProfileVertex::new(-inner, 0.325, 0.0, 0.0, 1.0, 0.0, 0.232_067, 0.224_609),
                ],
            ),
            ProfilePolyline::new(
                "right",
                top_delta,
                vec![
                    ProfileVertex::new(inner, 0.325, 0.0, 0.0, 1.0, 0.0, 0.232_067, 0.126_953),
                    ProfileVertex::new(outer, 0.325, 0.0, 0.0, 1.0, 0.0, 0.232_067, 0.224_609),
                ],
            ),
        ];
        let mut lod = Lod::new(1200.0);
        lod.items.push(railtops);
        profile.lods.push(lod);

        // Ballast: one wide strip, visible at any distance.
        let mut ballast = LodItem::named("Ballast");
        ballast.tex_name = "textures/ballast.png".to_string();
        ballast.shader_name = "blend_diffuse".to_string();
        ballast.light_model_name = "spec0".to_string();
        ballast.alternate_texture = 1;
        ballast.mip_bias = -1.0;
        ballast.polylines = vec![ProfilePolyline::new(
            "ballast",
            Vec2::new(0.0, 0.208_854_5),
            vec![
                ProfileVertex::new(-2.5 * scale, 0.2, 0.0, 0.0, 1.0, 0.0, -0.153_916, -0.280_582),
                ProfileVertex::new(2.5 * scale, 0.2, 0.0, 0.0, 1.0, 0.0, 0.862_105, -0.280_582),
            ],
        )];
        let mut lod = Lod::new(f32::MAX);
        lod.items.push(ballast);
        profile.lods.push(lod);

        profile
            .finalize()
            .expect("built-in default profile is always valid")
    }
}
