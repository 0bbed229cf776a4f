/// Nominal track gauge for the route, in meters (standard gauge).
pub const TRACK_GAUGE: f32 = 1.435;

/// Gauge the built-in profile geometry was authored against. Profile x
/// coordinates are scaled by `TRACK_GAUGE / REFERENCE_GAUGE` at build time.
pub const REFERENCE_GAUGE: f32 = 1.435;

/// Sections whose gauge differs from the route gauge by more than this are
/// excluded from superelevation (meters).
pub const GAUGE_TOLERANCE: f32 = 0.2;

/// Minimum total run of a curve (meters) before it receives superelevation.
pub const SUPERELEVATION_MIN_RUN: f32 = 100.0;

/// Curved sections shorter than this at the start or end of a node connect to
/// junctions or buffers, where partial banking looks wrong; they are skipped.
pub const MIN_END_SECTION_RUN: f32 = 15.0;

/// Route design speed used for the nominal cant calculation (m/s).
pub const ROUTE_DESIGN_SPEED: f32 = 40.0;

/// Hard ceiling on cant, expressed in meters of rail height difference.
pub const MAX_CANT_M: f32 = 0.18;

/// World tile edge length in meters. Placed sections are bucketed by tile so
/// curve bookkeeping can be torn down when a tile unloads.
pub const TILE_SIZE: f32 = 2048.0;
