use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use leafwing_input_manager::prelude::*;
use physics_bridge::rapier3d::prelude::{Point, Ray};
use physics_bridge::{DragPlane, PointerScene};

use crate::camera::CameraControls;
use crate::physics::{PhysicsState, to_point, to_vec3, to_vector};

#[derive(Reflect, Actionlike, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputAction {
    LeftClick,
    /// Cycle debug draw: off, wireframe, solid.
    ToggleDebugDraw,
    /// Teleport every bridged mesh back to where it spawned.
    Reset,
}

pub(super) fn plugin(app: &mut App) {
    app.add_plugins(InputManagerPlugin::<InputAction>::default());

    app.register_type::<InputAction>();

    let mut input_map = InputMap::<InputAction>::default();
    input_map.insert(InputAction::LeftClick, MouseButton::Left);
    input_map.insert(InputAction::ToggleDebugDraw, KeyCode::F1);
    input_map.insert(InputAction::Reset, KeyCode::KeyR);
    app.insert_resource(input_map);
    app.insert_resource(ActionState::<InputAction>::default());

    app.add_systems(Update, drag_bodies.in_set(InputSystems));
}

/// Pointer handling; camera controls run after it so a drag can claim the mouse first.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSystems;

/// Invisible plane the pointer is projected on while dragging.
#[derive(Component)]
struct DragPlaneSurface;

/// Bevy side of the drag controller for one frame.
struct ViewerScene<'a, 'w, 's> {
    camera: &'a Camera,
    camera_transform: &'a GlobalTransform,
    viewport: Vec2,
    commands: &'a mut Commands<'w, 's>,
    meshes: &'a mut Assets<Mesh>,
    controls: &'a mut CameraControls,
}

impl PointerScene for ViewerScene<'_, '_, '_> {
    type Plane = Entity;

    fn viewport_size(&self) -> [f32; 2] {
        [self.viewport.x, self.viewport.y]
    }

    fn camera_ray(&self, [x, y]: [f32; 2]) -> Ray {
        let ndc = Vec2::new(x, y);
        // Reverse-Z: the near plane is at depth 1.
        let near = self
            .camera
            .ndc_to_world(self.camera_transform, ndc.extend(1.0));
        let far = self
            .camera
            .ndc_to_world(self.camera_transform, ndc.extend(f32::EPSILON));

        match near.zip(far) {
            Some((near, far)) => {
                Ray::new(to_point(near), to_vector((far - near).normalize_or_zero()))
            }
            None => Ray::new(
                to_point(self.camera_transform.translation()),
                to_vector(self.camera_transform.forward().as_vec3()),
            ),
        }
    }

    fn camera_position(&self) -> Point<f32> {
        to_point(self.camera_transform.translation())
    }

    fn spawn_drag_plane(&mut self, plane: &DragPlane) -> Entity {
        let normal = to_vec3(&plane.normal);
        let mesh = self
            .meshes
            .add(Plane3d::new(normal, Vec2::splat(plane.size / 2.0)));
        self.commands
            .spawn((
                DragPlaneSurface,
                Mesh3d(mesh),
                Transform::from_translation(to_vec3(&plane.center.coords)),
                Visibility::Hidden,
            ))
            .id()
    }

    fn dispose_drag_plane(&mut self, handle: Entity) {
        // The mesh asset goes away with the last handle.
        self.commands.entity(handle).despawn();
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls.enabled = enabled;
    }
}

fn drag_bodies(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut physics: ResMut<PhysicsState>,
    mut controls: ResMut<CameraControls>,
    actions: Res<ActionState<InputAction>>,
    window: Single<&Window, With<PrimaryWindow>>,
    camera: Single<(&Camera, &GlobalTransform), With<Camera3d>>,
) {
    let (camera, camera_transform) = *camera;
    let mut scene = ViewerScene {
        camera,
        camera_transform,
        viewport: window.size(),
        commands: &mut commands,
        meshes: &mut meshes,
        controls: &mut controls,
    };
    let PhysicsState { bridge, drag, .. } = &mut *physics;

    if actions.just_released(&InputAction::LeftClick) {
        drag.pointer_up(&mut bridge.world, &mut scene);
        return;
    }

    let Some(cursor) = window.cursor_position() else {
        return;
    };

    if actions.just_pressed(&InputAction::LeftClick) {
        if drag.pointer_down(&mut bridge.world, &mut scene, cursor.x, cursor.y) {
            debug!("dragging {:?}", drag.dragged_body());
        }
    } else if drag.is_dragging() {
        drag.pointer_move(&mut bridge.world, &scene, cursor.x, cursor.y);
    }
}
