//! Profile discovery and the shared profile set resource.
//!
//! A route may ship a `TrackProfiles/` directory: `TrProfile.xml` (preferred)
//! or `TrProfile.dat` fills the default slot, and any further
//! `TrProfile*.xml` / `TrProfile*.dat` files add selectable profiles, XML
//! winning when both exist with the same stem. Anything missing or malformed
//! falls back to the built-in default with a warning; route loading never
//! aborts over a bad profile.

use bevy::prelude::*;
use std::path::Path;
use std::sync::Arc;

use super::error::ProfileError;
use super::{parse_legacy_profile, parse_xml_profile, TrackProfile};
use crate::track_mesh::wire_profile;

/// Directory scanned for profile files, relative to the working directory.
const PROFILE_DIR: &str = "assets/TrackProfiles";

/// The shared, immutable profile set for the loaded route. Index 0 is the
/// default profile; dynamic track always uses it, static shapes may select
/// another via [`super::best_profile`].
#[derive(Resource)]
pub struct TrackProfileSet {
    pub profiles: Vec<Arc<TrackProfile>>,
    pub wire: Arc<TrackProfile>,
}

impl TrackProfileSet {
    pub fn built_in(gauge: f32) -> Self {
        Self {
            profiles: vec![Arc::new(TrackProfile::default_profile(gauge))],
            wire: Arc::new(wire_profile(gauge)),
        }
    }

    pub fn default_profile(&self) -> &Arc<TrackProfile> {
        &self.profiles[0]
    }
}

/// Parse one profile file, dispatching on extension.
pub fn load_profile_file(path: &Path, gauge: f32) -> Result<TrackProfile, ProfileError> {
    let text = std::fs::read_to_string(path)?;
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("xml") => parse_xml_profile(&text, gauge),
        Some("dat") => parse_legacy_profile(&text, gauge),
        other => Err(ProfileError::Malformed(format!(
            "unsupported profile extension {other:?}"
        ))),
    }
}

/// Scan a route's profile directory. Always returns at least one profile;
/// the default slot is filled by the built-in profile when no usable file
/// exists.
pub fn load_profiles_from_dir(dir: &Path, gauge: f32) -> Vec<Arc<TrackProfile>> {
    let mut profiles: Vec<Arc<TrackProfile>> = Vec::new();
    let mut stems: Vec<String> = Vec::new();

    let default_xml = dir.join("TrProfile.xml");
    let default_dat = dir.join("TrProfile.dat");
    let default_path = if default_xml.exists() {
        Some(default_xml)
    } else if default_dat.exists() {
        Some(default_dat)
    } else {
        None
    };

    if let Some(path) = default_path {
        match load_profile_file(&path, gauge) {
            Ok(profile) => {
                profiles.push(Arc::new(profile));
                stems.push("TrProfile".to_string());
            }
            Err(e) => {
                warn!("profile {} failed to load: {e}; using built-in default", path.display());
            }
        }
    }
    if profiles.is_empty() {
        profiles.push(Arc::new(TrackProfile::default_profile(gauge)));
        stems.push("TrProfile".to_string());
    }

    // Extra selectable profiles, XML before legacy so XML wins stem clashes.
    for extension in ["xml", "dat"] {
        let Ok(entries) = std::fs::read_dir(dir) else {
            break;
        };
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension().and_then(|e| e.to_str()) == Some(extension)
                    && p.file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|s| s.starts_with("TrProfile"))
            })
            .collect();
        paths.sort();
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            if stems.contains(&stem) {
                continue;
            }
            match load_profile_file(&path, gauge) {
                Ok(profile) => {
                    profiles.push(Arc::new(profile));
                    stems.push(stem);
                }
                Err(e) => warn!("profile {} failed to load: {e}; skipped", path.display()),
            }
        }
    }

    profiles
}

/// Startup system: build the route's profile set.
pub fn load_track_profiles(mut commands: Commands) {
    let gauge = simulation::config::TRACK_GAUGE;
    let dir = Path::new(PROFILE_DIR);
    let set = if dir.is_dir() {
        TrackProfileSet {
            profiles: load_profiles_from_dir(dir, gauge),
            wire: Arc::new(wire_profile(gauge)),
        }
    } else {
        TrackProfileSet::built_in(gauge)
    };
    info!("loaded {} track profile(s)", set.profiles.len());
    commands.insert_resource(set);
}
