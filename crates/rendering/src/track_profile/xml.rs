//! Parser for the XML profile format: one `TrProfile` root element carrying
//! the scalar fields as attributes, with nested `LOD`/`LODItem`/`Polyline`/
//! `Vertex` elements. Vector attributes are space-separated numeric lists.

use bevy::prelude::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::error::ProfileError;
use super::{
    Lod, LodItem, LodMethod, PitchControl, PositionControl, ProfilePolyline, ProfileVertex,
    SuperElevationStyle, TrackProfile,
};

/// Parse an XML profile document. `gauge` seeds the profile's gauge when the
/// document does not override it.
pub fn parse_xml_profile(text: &str, gauge: f32) -> Result<TrackProfile, ProfileError> {
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.trim_text(true);

    let mut profile: Option<TrackProfile> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attrs = collect_attributes(&e)?;
                match name.as_str() {
                    "TrProfile" => {
                        let mut p = parse_root(&attrs, gauge)?;
                        p.lods = Vec::new();
                        profile = Some(p);
                    }
                    "LOD" => {
                        let profile = profile.as_mut().ok_or_else(root_missing)?;
                        let cutoff = required_f32(&attrs, "CutoffRadius")?;
                        profile.lods.push(Lod::new(cutoff));
                    }
                    "LODItem" => {
                        let profile = profile.as_mut().ok_or_else(root_missing)?;
                        let lod = profile.lods.last_mut().ok_or_else(|| {
                            ProfileError::Malformed("LODItem outside of LOD".to_string())
                        })?;
                        lod.items.push(parse_lod_item(&attrs)?);
                    }
                    "Polyline" => {
                        let item = current_item(&mut profile)?;
                        item.polylines.push(parse_polyline(&attrs)?);
                    }
                    "Vertex" => {
                        let item = current_item(&mut profile)?;
                        let polyline = item.polylines.last_mut().ok_or_else(|| {
                            ProfileError::Malformed("Vertex outside of Polyline".to_string())
                        })?;
                        polyline.vertices.push(parse_vertex(&attrs)?);
                    }
                    other => {
                        warn!("skipping unknown profile element {other}");
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ProfileError::Malformed(e.to_string())),
        }
        buf.clear();
    }

    profile.ok_or_else(root_missing)?.finalize()
}

fn root_missing() -> ProfileError {
    ProfileError::Malformed("document has no TrProfile root element".to_string())
}

fn collect_attributes(e: &BytesStart) -> Result<HashMap<String, String>, ProfileError> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ProfileError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| ProfileError::Malformed(e.to_string()))?
            .to_string();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn current_item<'a>(
    profile: &'a mut Option<TrackProfile>,
) -> Result<&'a mut LodItem, ProfileError> {
    profile
        .as_mut()
        .ok_or_else(root_missing)?
        .lods
        .last_mut()
        .and_then(|lod| lod.items.last_mut())
        .ok_or_else(|| ProfileError::Malformed("element outside of LODItem".to_string()))
}

fn required<'a>(
    attrs: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a String, ProfileError> {
    attrs
        .get(key)
        .ok_or_else(|| ProfileError::MissingField(key.to_string()))
}

fn required_f32(attrs: &HashMap<String, String>, key: &str) -> Result<f32, ProfileError> {
    let s = required(attrs, key)?;
    s.parse::<f32>()
        .map_err(|_| ProfileError::BadNumber(format!("{key}: {s}")))
}

fn optional_f32(attrs: &HashMap<String, String>, key: &str, fallback: f32) -> Result<f32, ProfileError> {
    match attrs.get(key) {
        Some(s) => s
            .parse::<f32>()
            .map_err(|_| ProfileError::BadNumber(format!("{key}: {s}"))),
        None => Ok(fallback),
    }
}

fn optional_i32(attrs: &HashMap<String, String>, key: &str, fallback: i32) -> Result<i32, ProfileError> {
    match attrs.get(key) {
        Some(s) => s
            .parse::<i32>()
            .map_err(|_| ProfileError::BadNumber(format!("{key}: {s}"))),
        None => Ok(fallback),
    }
}

fn filter_list(attrs: &HashMap<String, String>, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse space-separated floats from an attribute, padding a missing third
/// component with zero when `pad_z` is set.
fn vector_attr(
    attrs: &HashMap<String, String>,
    key: &str,
    count: usize,
    pad_z: bool,
) -> Result<Vec<f32>, ProfileError> {
    let s = required(attrs, key)?;
    let mut values = Vec::with_capacity(count);
    for part in s.split_whitespace() {
        values.push(
            part.parse::<f32>()
                .map_err(|_| ProfileError::BadNumber(format!("{key}: {part}")))?,
        );
    }
    if pad_z && values.len() == count - 1 {
        values.push(0.0);
    }
    if values.len() != count {
        return Err(ProfileError::Malformed(format!(
            "{key} needs {count} values, found {}",
            values.len()
        )));
    }
    Ok(values)
}

fn parse_root(attrs: &HashMap<String, String>, gauge: f32) -> Result<TrackProfile, ProfileError> {
    let mut profile = TrackProfile::empty(
        attrs
            .get("Name")
            .map(String::as_str)
            .unwrap_or("Default track profile"),
    );
    profile.lod_method = LodMethod::parse(attrs.get("LODMethod").map(String::as_str).unwrap_or(""));
    profile.chord_span = required_f32(attrs, "ChordSpan")?;
    profile.pitch_control =
        PitchControl::parse(attrs.get("PitchControl").map(String::as_str).unwrap_or(""));
    profile.pitch_control_scalar = optional_f32(attrs, "PitchControlScalar", 0.0)?;
    profile.gauge = optional_f32(attrs, "TrackGauge", gauge)?;
    profile.elevation_style = SuperElevationStyle::parse(
        attrs
            .get("SuperElevationMethod")
            .map(String::as_str)
            .unwrap_or(""),
    );
    profile.included_shapes = filter_list(attrs, "IncludedShapes");
    profile.excluded_shapes = filter_list(attrs, "ExcludedShapes");
    profile.included_textures = filter_list(attrs, "IncludedTextures");
    profile.excluded_textures = filter_list(attrs, "ExcludedTextures");
    Ok(profile)
}

fn parse_lod_item(attrs: &HashMap<String, String>) -> Result<LodItem, ProfileError> {
    let mut item = LodItem::named(attrs.get("Name").map(String::as_str).unwrap_or(""));
    item.tex_name = required(attrs, "TexName")?.clone();
    if let Some(shader) = attrs.get("ShaderName") {
        item.shader_name = shader.clone();
    }
    if let Some(light) = attrs.get("LightModelName") {
        item.light_model_name = light.clone();
    }
    item.alpha_test_mode = optional_i32(attrs, "AlphaTestMode", 0)?;
    if let Some(mode) = attrs.get("TexAddrModeName") {
        item.tex_addr_mode = mode.clone();
    }
    item.alternate_texture = optional_i32(attrs, "AlternateTexture", 0)?.max(0) as u32;
    item.mip_bias = optional_f32(attrs, "MipMapLevelOfDetailBias", 0.0)?;
    Ok(item)
}

fn parse_polyline(attrs: &HashMap<String, String>) -> Result<ProfilePolyline, ProfileError> {
    let delta = vector_attr(attrs, "DeltaTexCoord", 2, false)?;
    let mut polyline = ProfilePolyline::default();
    polyline.name = attrs.get("Name").cloned().unwrap_or_default();
    polyline.delta_tex_coord = Vec2::new(delta[0], delta[1]);
    Ok(polyline)
}

fn parse_vertex(attrs: &HashMap<String, String>) -> Result<ProfileVertex, ProfileError> {
    let p = vector_attr(attrs, "Position", 3, true)?;
    let n = vector_attr(attrs, "Normal", 3, false)?;
    let t = vector_attr(attrs, "TexCoord", 2, false)?;
    let control = PositionControl::parse(
        attrs
            .get("PositionControl")
            .map(String::as_str)
            .unwrap_or(""),
    );
    Ok(ProfileVertex {
        position: Vec3::new(p[0], p[1], p[2]),
        normal: Vec3::new(n[0], n[1], n[2]),
        tex_coord: Vec2::new(t[0], t[1]),
        position_control: control,
    })
}
