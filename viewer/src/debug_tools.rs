//! Debug/performance tooling for native dev builds.
//!
//! Adds the perf overlay and starts the bridge with wireframe debug draw attached, so dev
//! builds show collider outlines from the first frame (F1 still cycles the mode).

use bevy::diagnostic::{
    EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin, SystemInformationDiagnosticsPlugin,
};
use bevy::prelude::*;
use bevy::render::diagnostic::RenderDiagnosticsPlugin;
use iyes_perf_ui::prelude::*;
use physics_bridge::DebugDrawMode;

use crate::physics::PhysicsState;

pub(super) fn plugin(app: &mut App) {
    app.add_plugins((
        FrameTimeDiagnosticsPlugin::default(),
        EntityCountDiagnosticsPlugin::default(),
        SystemInformationDiagnosticsPlugin::default(),
        RenderDiagnosticsPlugin,
        PerfUiPlugin,
    ));

    app.add_systems(Startup, (spawn_perf_ui, attach_wireframes));
}

fn spawn_perf_ui(mut commands: Commands) {
    commands.spawn(PerfUiAllEntries::default());
}

fn attach_wireframes(mut physics: ResMut<PhysicsState>) {
    physics.bridge.attach_debug_draw(DebugDrawMode::Lines);
}
