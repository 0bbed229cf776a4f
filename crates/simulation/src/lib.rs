use bevy::prelude::*;

pub mod config;
pub mod superelevation;
pub mod track_sections;
pub mod world_init;


pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<track_sections::TrackSectionStore>()
            .init_resource::<superelevation::CurveRegistry>()
            .add_systems(Startup, world_init::init_route);
    }
}
