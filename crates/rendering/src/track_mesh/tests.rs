//! Tests for the replication engine: section counts, transforms, buffer
//! sizing, texture wrap, winding, superelevation ramps, and wire droppers.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;
    use bevy::render::mesh::{Indices, VertexAttributeValues};

    use crate::track_mesh::{
        build_track_shape, compute_section_count, wire_profile, wire_profile_with, PlainStyle,
        RollPlan, SectionFrame, SectionPath, WireStyle, MAX_SECTIONS,
    };
    use crate::track_mesh::{RampCase, SuperelevationStyle};
    use crate::track_profile::{PitchControl, TrackProfile};
    use simulation::config::TRACK_GAUGE;
    use simulation::superelevation::CantProfile;
    use simulation::track_sections::DtrackData;

    fn positions_of(mesh: &Mesh) -> Vec<Vec3> {
        match mesh.attribute(Mesh::ATTRIBUTE_POSITION).unwrap() {
            VertexAttributeValues::Float32x3(v) => v.iter().map(|p| Vec3::from_array(*p)).collect(),
            _ => panic!("positions must be f32x3"),
        }
    }

    fn uvs_of(mesh: &Mesh) -> Vec<Vec2> {
        match mesh.attribute(Mesh::ATTRIBUTE_UV_0).unwrap() {
            VertexAttributeValues::Float32x2(v) => v.iter().map(|p| Vec2::from_array(*p)).collect(),
            _ => panic!("uvs must be f32x2"),
        }
    }

    fn indices_of(mesh: &Mesh) -> Vec<u16> {
        match mesh.indices().unwrap() {
            Indices::U16(v) => v.clone(),
            Indices::U32(_) => panic!("track meshes use 16-bit indices"),
        }
    }

    // =======================================================================
    // Section counts
    // =======================================================================

    #[test]
    fn test_section_count_straight_is_one() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        assert_eq!(
            compute_section_count(&profile, &DtrackData::straight(20.0)),
            1
        );
        assert_eq!(
            compute_section_count(&profile, &DtrackData::straight(2000.0)),
            1
        );
    }

    #[test]
    fn test_section_count_deterministic_even_bounded() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        for &(angle, radius) in &[
            (0.008_f32, 20.0_f32),
            (0.5236, 500.0),
            (-0.5236, 500.0),
            (1.5, 180.0),
            (6.28, 5000.0),
        ] {
            let data = DtrackData::curved(angle, radius);
            let a = compute_section_count(&profile, &data);
            let b = compute_section_count(&profile, &data);
            assert_eq!(a, b, "pure function");
            assert_eq!(a % 2, 0, "even count for {angle}/{radius}");
            assert!((2..=MAX_SECTIONS).contains(&a), "bounds for {angle}/{radius}");
        }
    }

    #[test]
    fn test_section_count_chord_length_rebound() {
        // 30 degrees at 500 m with a 1 degree chord span starts at 30
        // sections; a 10 m chord subtends about 1.146 degrees, so the chord
        // length control rebounds the count to 26.
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        assert_eq!(profile.pitch_control, PitchControl::ChordLength);
        let data = DtrackData::curved(0.5236, 500.0);
        assert_eq!(compute_section_count(&profile, &data), 26);
    }

    #[test]
    fn test_section_count_without_pitch_control() {
        let mut profile = TrackProfile::default_profile(TRACK_GAUGE);
        profile.pitch_control = PitchControl::None;
        let data = DtrackData::curved(0.5236, 500.0);
        // 30 degrees / 1 degree span, already even.
        assert_eq!(compute_section_count(&profile, &data), 30);
        // Tiny curves floor at 2 sections.
        let tiny = DtrackData::curved(0.008, 20.0);
        assert_eq!(compute_section_count(&profile, &tiny), 2);
    }

    #[test]
    fn test_section_count_chord_displacement() {
        let mut profile = TrackProfile::default_profile(TRACK_GAUGE);
        profile.pitch_control = PitchControl::ChordDisplacement;
        profile.pitch_control_scalar = 0.2;
        let data = DtrackData::curved(0.5236, 500.0);
        let n = compute_section_count(&profile, &data);
        // Verify the sagitta bound holds for the chosen count.
        let half_step = 0.5 * data.param1.abs() / n as f32;
        let sagitta = data.param2 * (1.0 - half_step.cos());
        assert!(
            sagitta <= profile.pitch_control_scalar * 1.02,
            "sagitta {sagitta} exceeds threshold at n={n}"
        );
    }

    #[test]
    fn test_section_count_ceiling() {
        let mut profile = TrackProfile::default_profile(TRACK_GAUGE);
        profile.chord_span = 0.1;
        profile.pitch_control = PitchControl::None;
        let data = DtrackData::curved(6.28, 5000.0);
        assert_eq!(compute_section_count(&profile, &data), MAX_SECTIONS);
    }

    #[test]
    fn test_chord_length_property() {
        // Under chord-length control every generated chord stays within the
        // threshold (truncation in the count can run a sliver over).
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.5236, 500.0);
        let n = compute_section_count(&profile, &data);
        let path = SectionPath::new(&data, n);
        for offset in 1..=n {
            let chord = (path.origin_at(offset) - path.origin_at(offset - 1)).length();
            assert!(
                chord <= profile.pitch_control_scalar * 1.02,
                "chord {chord} at section {offset} exceeds threshold"
            );
        }
    }

    // =======================================================================
    // The plain build
    // =======================================================================

    #[test]
    fn test_straight_20m_build() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::straight(20.0);
        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();

        assert_eq!(shape.primitives.len(), 3, "one primitive per LODItem");
        assert_eq!(shape.lod_ranges.len(), 3);
        assert_eq!(shape.object_radius, 10.0);

        for (primitive, lod) in shape.primitives.iter().zip(&profile.lods) {
            let item = &lod.items[0];
            let positions = positions_of(&primitive.mesh);
            // One section: two cross sections in the buffer.
            assert_eq!(positions.len(), item.num_vertices as usize * 2);
            assert_eq!(
                indices_of(&primitive.mesh).len(),
                item.num_segments as usize * 6
            );
            // The second cross section sits 20 m down local -Z.
            let stride = item.num_vertices as usize;
            for v in 0..stride {
                assert!((positions[v].z - 0.0).abs() < 1e-5);
                assert!((positions[stride + v].z + 20.0).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_lod_ranges_are_contiguous() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let shape = build_track_shape(
            &profile,
            &DtrackData::straight(10.0),
            Quat::IDENTITY,
            &PlainStyle,
        )
        .unwrap();
        let mut expected_start = 0;
        for (range, lod) in shape.lod_ranges.iter().zip(&profile.lods) {
            assert_eq!(range.start, expected_start);
            assert_eq!(range.stop - range.start, lod.items.len());
            assert_eq!(range.cutoff_radius, lod.cutoff_radius);
            expected_start = range.stop;
        }
        assert_eq!(expected_start, shape.primitives.len());
    }

    #[test]
    fn test_buffer_sizing_on_curve() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.5236, 500.0);
        let n = compute_section_count(&profile, &data);
        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        for (primitive, lod) in shape.primitives.iter().zip(&profile.lods) {
            let item = &lod.items[0];
            assert_eq!(
                positions_of(&primitive.mesh).len(),
                (item.num_vertices * (n + 1)) as usize
            );
            assert_eq!(
                indices_of(&primitive.mesh).len(),
                (item.num_segments * n * 6) as usize
            );
        }
    }

    #[test]
    fn test_texture_wrap_continuity() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.5236, 500.0);
        let n = compute_section_count(&profile, &data);
        let path = SectionPath::new(&data, n);
        let step_run = path.step_run;

        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let railsides = &shape.primitives[0];
        let uvs = uvs_of(&railsides.mesh);
        let item = &profile.lods[0].items[0];
        let stride = item.num_vertices as usize;
        let delta = item.polylines[0].delta_tex_coord;

        for section in 1..=n as usize {
            for v in 0..stride {
                let expected = uvs[(section - 1) * stride + v] + delta * step_run;
                let actual = uvs[section * stride + v];
                assert!(
                    actual.abs_diff_eq(expected, 1e-4),
                    "uv wrap broken at section {section} vertex {v}: {actual:?} vs {expected:?}"
                );
            }
        }
    }

    #[test]
    fn test_straight_wrap_includes_grade() {
        // On a grade the per-section run is the slant distance, not the
        // horizontal length.
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::straight(30.0).with_delta_y(4.0);
        let path = SectionPath::new(&data, 1);
        let expected = (30.0_f32 * 30.0 + 4.0 * 4.0).sqrt();
        assert!((path.step_run - expected).abs() < 1e-4);

        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let positions = positions_of(&shape.primitives[0].mesh);
        let stride = profile.lods[0].items[0].num_vertices as usize;
        // Elevation carried to the far cross section.
        let rise = positions[stride].y - positions[0].y;
        assert!((rise - 4.0).abs() < 1e-4, "rise was {rise}");
    }

    #[test]
    fn test_winding_is_consistently_clockwise() {
        // Railtop polylines run left-to-right at constant height; with the
        // engine's clockwise stitch their face normals all point down when
        // computed with the right-handed (counterclockwise) rule.
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let shape = build_track_shape(
            &profile,
            &DtrackData::curved(0.5236, 500.0),
            Quat::IDENTITY,
            &PlainStyle,
        )
        .unwrap();
        let railtops = &shape.primitives[1];
        let positions = positions_of(&railtops.mesh);
        let indices = indices_of(&railtops.mesh);
        for tri in indices.chunks(3) {
            let a = positions[tri[0] as usize];
            let b = positions[tri[1] as usize];
            let c = positions[tri[2] as usize];
            let face = (b - a).cross(c - a);
            assert!(
                face.y < 0.0,
                "mixed winding: face normal {face:?} for triangle {tri:?}"
            );
        }
    }

    #[test]
    fn test_curve_endpoints_match_decomposition() {
        // The last generated cross section must land where the path walk
        // says the section ends.
        let data = DtrackData::curved(0.5236, 500.0);
        let placements =
            simulation::track_sections::decompose(&[data], Transform::IDENTITY);
        let expected_end = placements[0].end.translation;

        let n = compute_section_count(&TrackProfile::default_profile(TRACK_GAUGE), &data);
        let path = SectionPath::new(&data, n);
        let actual_end = path.origin_at(n);
        assert!(
            actual_end.abs_diff_eq(expected_end, 1e-3),
            "section end {actual_end:?} vs decomposed end {expected_end:?}"
        );
    }

    #[test]
    fn test_inverted_root_never_renders_upside_down() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::straight(20.0);
        let upright =
            build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let inverted = build_track_shape(
            &profile,
            &data,
            Quat::from_rotation_z(std::f32::consts::PI),
            &PlainStyle,
        )
        .unwrap();
        let a = positions_of(&upright.primitives[1].mesh);
        let b = positions_of(&inverted.primitives[1].mesh);
        for (va, vb) in a.iter().zip(&b) {
            assert!(
                va.abs_diff_eq(*vb, 1e-4),
                "flip guard should restore the profile: {va:?} vs {vb:?}"
            );
        }
    }

    #[test]
    fn test_vacuous_section_is_rejected() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        assert!(build_track_shape(
            &profile,
            &DtrackData::straight(0.0),
            Quat::IDENTITY,
            &PlainStyle
        )
        .is_err());
    }

    #[test]
    fn test_object_radius_on_curve() {
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.5236, 500.0);
        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let expected = 500.0 * (0.5_f32 * 0.5236).sin();
        assert!((shape.object_radius - expected).abs() < 1e-3);
    }

    // =======================================================================
    // Superelevation
    // =======================================================================

    #[test]
    fn test_roll_plan_cases() {
        let data = DtrackData::curved(-0.4, 500.0);
        let cases = [
            (CantProfile { start: 0.0, max: 0.0, end: 0.0 }, RampCase::None),
            (CantProfile { start: 0.0, max: 0.05, end: 0.0 }, RampCase::Island),
            (CantProfile { start: 0.0, max: 0.05, end: 0.05 }, RampCase::Start),
            (CantProfile { start: 0.05, max: 0.05, end: 0.0 }, RampCase::Finish),
            (CantProfile { start: 0.05, max: 0.05, end: 0.05 }, RampCase::Middle),
        ];
        for (cant, expected) in cases {
            assert_eq!(RollPlan::new(&cant, &data).case(), expected, "{cant:?}");
        }
    }

    #[test]
    fn test_roll_boundaries_start_case() {
        let data = DtrackData::curved(-0.4, 500.0); // left bend: positive roll
        let cant = CantProfile { start: 0.0, max: 0.05, end: 0.05 };
        let plan = RollPlan::new(&cant, &data);
        let n = 26;
        assert_eq!(plan.roll_at(0, n), 0.0, "entry starts level");
        assert!((plan.roll_at(n, n) - 0.05).abs() < 1e-6, "exit at max");
        assert!((plan.roll_at(n / 2, n) - 0.05).abs() < 1e-6, "max from midpoint");
        // Monotonic over the ramp half.
        for offset in 1..=n / 2 {
            assert!(plan.roll_at(offset, n) >= plan.roll_at(offset - 1, n));
        }
    }

    #[test]
    fn test_roll_boundaries_finish_and_island() {
        let data = DtrackData::curved(-0.4, 500.0);
        let n = 26;
        let finish = RollPlan::new(
            &CantProfile { start: 0.05, max: 0.05, end: 0.0 },
            &data,
        );
        assert!((finish.roll_at(0, n) - 0.05).abs() < 1e-6);
        assert_eq!(finish.roll_at(n, n), 0.0);

        let island = RollPlan::new(
            &CantProfile { start: 0.0, max: 0.05, end: 0.0 },
            &data,
        );
        assert_eq!(island.roll_at(0, n), 0.0);
        assert!((island.roll_at(n / 2, n) - 0.05).abs() < 1e-6);
        assert_eq!(island.roll_at(n, n), 0.0);
    }

    #[test]
    fn test_roll_sign_follows_bend_direction() {
        let cant = CantProfile { start: 0.05, max: 0.05, end: 0.05 };
        let right = RollPlan::new(&cant, &DtrackData::curved(0.4, 500.0));
        let left = RollPlan::new(&cant, &DtrackData::curved(-0.4, 500.0));
        assert!(right.roll_at(5, 10) < 0.0, "right bend dips the +x side");
        assert!(left.roll_at(5, 10) > 0.0, "left bend dips the -x side");
    }

    #[test]
    fn test_middle_case_pre_rotates_every_section() {
        // Scenario: Middle cant of 0.05 rad on a right bend. Every cross
        // section, including the base, is rotated by -0.05 relative to the
        // unelevated build.
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.4, 500.0);
        let cant = CantProfile { start: 0.05, max: 0.05, end: 0.05 };
        let style = SuperelevationStyle::new(&cant, &data, profile.elevation_style);

        let plain = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let banked = build_track_shape(&profile, &data, Quat::IDENTITY, &style).unwrap();

        let n = compute_section_count(&profile, &data);
        let path = SectionPath::new(&data, n);
        let roll = -0.05_f32;
        let plain_pos = positions_of(&plain.primitives[0].mesh);
        let banked_pos = positions_of(&banked.primitives[0].mesh);
        let stride = profile.lods[0].items[0].num_vertices as usize;

        for section in 0..=n as usize {
            let frame = SectionFrame::at(&path, Quat::IDENTITY, section as u32, 0.0);
            for v in 0..stride {
                let local = plain_pos[section * stride + v] - frame.origin;
                let (x, y) = (local.dot(frame.right), local.dot(frame.up));
                let (sin, cos) = roll.sin_cos();
                let expected =
                    frame.origin + (x * cos - y * sin) * frame.right + (x * sin + y * cos) * frame.up;
                assert!(
                    banked_pos[section * stride + v].abs_diff_eq(expected, 1e-4),
                    "section {section} vertex {v} not pre-rotated"
                );
            }
        }
    }

    #[test]
    fn test_position_control_none_stays_fixed() {
        let mut profile = TrackProfile::default_profile(TRACK_GAUGE);
        // Pin the ballast in place while the rails bank.
        for pl in &mut profile.lods[2].items[0].polylines {
            for v in &mut pl.vertices {
                v.position_control = crate::track_profile::PositionControl::None;
            }
        }
        let data = DtrackData::curved(0.4, 500.0);
        let cant = CantProfile { start: 0.05, max: 0.05, end: 0.05 };
        let style = SuperelevationStyle::new(&cant, &data, profile.elevation_style);

        let plain = build_track_shape(&profile, &data, Quat::IDENTITY, &PlainStyle).unwrap();
        let banked = build_track_shape(&profile, &data, Quat::IDENTITY, &style).unwrap();

        let plain_ballast = positions_of(&plain.primitives[2].mesh);
        let banked_ballast = positions_of(&banked.primitives[2].mesh);
        for (a, b) in plain_ballast.iter().zip(&banked_ballast) {
            assert!(a.abs_diff_eq(*b, 1e-5), "pinned vertex moved: {a:?} vs {b:?}");
        }

        let plain_rails = positions_of(&plain.primitives[0].mesh);
        let banked_rails = positions_of(&banked.primitives[0].mesh);
        assert!(
            plain_rails.iter().zip(&banked_rails).any(|(a, b)| !a.abs_diff_eq(*b, 1e-5)),
            "rails should still bank"
        );
    }

    #[test]
    fn test_straight_section_carries_middle_cant() {
        // A short straight between two banked curves holds the roll.
        let profile = TrackProfile::default_profile(TRACK_GAUGE);
        let data = DtrackData::straight(40.0);
        let cant = CantProfile { start: 0.05, max: 0.05, end: 0.05 };
        let style = SuperelevationStyle::new(&cant, &data, profile.elevation_style);
        assert!((style.plan().roll_at(0, 1) - 0.05).abs() < 1e-6);
        assert!((style.plan().roll_at(1, 1) - 0.05).abs() < 1e-6);
    }

    // =======================================================================
    // Overhead wire
    // =======================================================================

    #[test]
    fn test_wire_profile_polylines() {
        // Double wire without triphase: contact + messenger + one vertical.
        let profile = wire_profile(TRACK_GAUGE);
        let item = &profile.lods[0].items[0];
        let names: Vec<&str> = item.polylines.iter().map(|pl| pl.name.as_str()).collect();
        assert_eq!(names, vec!["TopWire", "TopWire1", "TopWireVertical"]);
        assert!(item.polylines[2].vertical);
        assert!(!item.polylines[0].vertical);

        let single = wire_profile_with(TRACK_GAUGE, false, false);
        let names: Vec<&str> = single.lods[0].items[0]
            .polylines
            .iter()
            .map(|pl| pl.name.as_str())
            .collect();
        assert_eq!(names, vec!["TopWire"]);
    }

    #[test]
    fn test_wire_section_count_is_distance_based() {
        let profile = wire_profile(TRACK_GAUGE);
        let style = WireStyle;
        use crate::track_mesh::ReplicationStyle;
        assert_eq!(
            style.section_count(&profile, &DtrackData::straight(35.0)),
            1
        );
        assert_eq!(
            style.section_count(&profile, &DtrackData::straight(200.0)),
            5
        );
        // 30 degrees at 500 m is a 262 m run: 7 spans.
        assert_eq!(
            style.section_count(&profile, &DtrackData::curved(0.5236, 500.0)),
            7
        );
        // Short curves still get the curved minimum.
        assert_eq!(
            style.section_count(&profile, &DtrackData::curved(0.02, 300.0)),
            2
        );
        // Sweeping bends get at least three.
        assert_eq!(
            style.section_count(&profile, &DtrackData::curved(2.0, 20.0)),
            3
        );
    }

    #[test]
    fn test_wire_build_appends_droppers() {
        let profile = wire_profile(TRACK_GAUGE);
        let data = DtrackData::curved(0.5236, 500.0);
        let style = WireStyle;
        use crate::track_mesh::ReplicationStyle;
        let n = style.section_count(&profile, &data);

        let shape = build_track_shape(&profile, &data, Quat::IDENTITY, &style).unwrap();
        assert_eq!(shape.primitives.len(), 1);
        let item = &profile.lods[0].items[0];

        let sweep_vertices = item.sweep_vertex_count() * (n + 1);
        let dropper_vertices = 2 * 2 * (n + 1);
        let positions = positions_of(&shape.primitives[0].mesh);
        assert_eq!(positions.len(), (sweep_vertices + dropper_vertices) as usize);

        let sweep_indices = item.sweep_segment_count() * n * 6;
        let dropper_indices = 6 * (n + 1);
        assert_eq!(
            indices_of(&shape.primitives[0].mesh).len(),
            (sweep_indices + dropper_indices) as usize
        );

        // Droppers span from the messenger down to the contact wire, one per
        // cross section, each carried around the curve by its section
        // transform.
        let path = SectionPath::new(&data, n);
        let droppers = &positions[sweep_vertices as usize..];
        for offset in 0..=n {
            let ring = &droppers[(offset as usize) * 4..(offset as usize) * 4 + 4];
            let origin = path.origin_at(offset);
            for top in &ring[0..2] {
                assert!((top.y - origin.y - (5.75 + 1.4)).abs() < 1e-3);
            }
            for bottom in &ring[2..4] {
                assert!((bottom.y - origin.y - 5.75).abs() < 1e-3);
            }
            // The dropper follows the curve: its lateral position matches
            // the section origin, not the piece root.
            let mid = 0.5 * (ring[0] + ring[1]);
            assert!(
                Vec2::new(mid.x, mid.z).abs_diff_eq(Vec2::new(origin.x, origin.z), 2e-2),
                "dropper {offset} strayed: {mid:?} vs {origin:?}"
            );
        }
    }

    #[test]
    fn test_triphase_spreads_wires_laterally() {
        let profile = wire_profile_with(TRACK_GAUGE, true, true);
        let item = &profile.lods[0].items[0];
        let names: Vec<&str> = item.polylines.iter().map(|pl| pl.name.as_str()).collect();
        assert_eq!(names, vec!["TopWire", "TopWire1"], "no dropper in triphase");
        let a = item.polylines[0].vertices[0].position;
        let b = item.polylines[1].vertices[0].position;
        assert_eq!(a.y, b.y, "both phases at contact height");
        assert!(a.x < 0.0 && b.x > 0.0, "phases spread laterally");
    }
}
