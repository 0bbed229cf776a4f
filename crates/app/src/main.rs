use bevy::prelude::*;
use bevy::window::PresentMode;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "RailVista".to_string(),
                resolution: (1280.0, 720.0).into(),
                present_mode: PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }))
        .add_plugins((simulation::SimulationPlugin, rendering::RenderingPlugin))
        .add_systems(Startup, setup_scene)
        .run();
}

/// Camera and lighting for the demo route. The mainline runs from the origin
/// down -Z; park the camera above and behind the first curve.
fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(60.0, 45.0, 40.0).looking_at(Vec3::new(0.0, 0.0, -150.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 9000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.6, 0.0)),
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 220.0,
    });
}
