use bevy::{
    camera::Exposure,
    input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll},
    prelude::*,
};
use leafwing_input_manager::prelude::ActionState;

use crate::input::InputAction;

pub(super) fn plugin(app: &mut App) {
    app.init_resource::<CameraControls>();
    app.add_systems(Startup, add_camera);
    app.add_systems(Update, orbit.after(crate::input::InputSystems));
}

const ORBIT_TARGET: Vec3 = Vec3::new(0.0, 2.0, 0.0);
const ORBIT_SENSITIVITY: f32 = 0.005;
const ZOOM_SENSITIVITY: f32 = 1.5;
const MIN_RADIUS: f32 = 4.0;
const MAX_RADIUS: f32 = 120.0;
const PITCH_LIMIT: f32 = 1.5;

/// Whether the camera reacts to the mouse. Cleared while a body is dragged.
#[derive(Resource, Debug)]
pub struct CameraControls {
    pub enabled: bool,
}

impl Default for CameraControls {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Component, Debug)]
struct OrbitCamera {
    radius: f32,
    yaw: f32,
    pitch: f32,
}

impl OrbitCamera {
    fn transform(&self) -> Transform {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, -self.pitch, 0.0);
        let eye = ORBIT_TARGET + rotation * Vec3::Z * self.radius;
        Transform::from_translation(eye).looking_at(ORBIT_TARGET, Vec3::Y)
    }
}

fn add_camera(mut commands: Commands) {
    let orbit = OrbitCamera {
        radius: 30.0,
        yaw: 0.6,
        pitch: 0.45,
    };
    commands.spawn((
        Exposure { ev100: 9.7 },
        bevy::core_pipeline::tonemapping::Tonemapping::AcesFitted,
        Camera3d::default(),
        orbit.transform(),
        orbit,
        DistanceFog {
            color: Color::srgba(0.35, 0.48, 0.66, 1.0),
            directional_light_color: Color::srgba(1.0, 0.95, 0.85, 0.5),
            directional_light_exponent: 30.0,
            falloff: FogFalloff::from_visibility_colors(
                1000.0, // Fog distance
                Color::srgb(0.35, 0.5, 0.66),
                Color::srgb(0.8, 0.8, 0.7),
            ),
        },
    ));
}

fn orbit(
    controls: Res<CameraControls>,
    actions: Res<ActionState<InputAction>>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    camera: Single<(&mut Transform, &mut OrbitCamera)>,
) {
    if !controls.enabled {
        return;
    }
    let (mut transform, mut orbit) = camera.into_inner();

    let mut changed = false;
    if actions.pressed(&InputAction::LeftClick) && motion.delta != Vec2::ZERO {
        orbit.yaw -= motion.delta.x * ORBIT_SENSITIVITY;
        orbit.pitch = (orbit.pitch + motion.delta.y * ORBIT_SENSITIVITY)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        changed = true;
    }
    if scroll.delta.y != 0.0 {
        orbit.radius = (orbit.radius - scroll.delta.y * ZOOM_SENSITIVITY)
            .clamp(MIN_RADIUS, MAX_RADIUS);
        changed = true;
    }

    if changed {
        *transform = orbit.transform();
    }
}
