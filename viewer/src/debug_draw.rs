//! Shows the bridge's debug geometry: wireframe lines as gizmos, solid triangles as a single
//! vertex-colored mesh rebuilt every frame.

use bevy::asset::RenderAssetUsages;
use bevy::camera::visibility::NoFrustumCulling;
use bevy::prelude::*;
use bevy::render::render_resource::PrimitiveTopology;
use leafwing_input_manager::prelude::ActionState;
use physics_bridge::DebugDrawMode;

use crate::input::InputAction;
use crate::physics::PhysicsState;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, spawn_solid_mesh);
    app.add_systems(
        Update,
        (toggle_debug_draw, draw_lines, update_solid_mesh).chain(),
    );
}

#[derive(Component)]
struct DebugSolid;

fn empty_triangle_mesh() -> Mesh {
    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, Vec::<[f32; 3]>::new())
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, Vec::<[f32; 3]>::new())
    .with_inserted_attribute(Mesh::ATTRIBUTE_COLOR, Vec::<[f32; 4]>::new())
}

fn spawn_solid_mesh(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        DebugSolid,
        Mesh3d(meshes.add(empty_triangle_mesh())),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::WHITE,
            perceptual_roughness: 0.9,
            double_sided: true,
            cull_mode: None,
            ..default()
        })),
        Transform::IDENTITY,
        Visibility::Hidden,
        // Bounds change every frame.
        NoFrustumCulling,
    ));
}

fn toggle_debug_draw(actions: Res<ActionState<InputAction>>, mut physics: ResMut<PhysicsState>) {
    if !actions.just_pressed(&InputAction::ToggleDebugDraw) {
        return;
    }

    let bridge = &mut physics.bridge;
    match bridge.debug_mode() {
        None => bridge.attach_debug_draw(DebugDrawMode::Lines),
        Some(DebugDrawMode::Lines) => bridge.attach_debug_draw(DebugDrawMode::Solid),
        Some(DebugDrawMode::Solid) => bridge.detach_debug_draw(),
    }
}

fn draw_lines(mut gizmos: Gizmos, physics: Res<PhysicsState>) {
    let Some(geometry) = physics.bridge.debug_geometry() else {
        return;
    };

    for (ends, colors) in geometry
        .line_positions
        .chunks_exact(2)
        .zip(geometry.line_colors.chunks_exact(2))
    {
        gizmos.line(Vec3::from(ends[0]), Vec3::from(ends[1]), debug_color(colors[0]));
    }
}

/// Debug geometry colors are sRGB.
fn debug_color([r, g, b]: [f32; 3]) -> Color {
    Color::srgb(r, g, b)
}

fn update_solid_mesh(
    physics: Res<PhysicsState>,
    mut meshes: ResMut<Assets<Mesh>>,
    solid: Single<(&Mesh3d, &mut Visibility), With<DebugSolid>>,
) {
    let (mesh, mut visibility) = solid.into_inner();

    let geometry = physics
        .bridge
        .debug_geometry()
        .filter(|g| g.triangle_count() > 0);
    let Some(geometry) = geometry else {
        *visibility = Visibility::Hidden;
        return;
    };
    *visibility = Visibility::Visible;

    let Some(mesh) = meshes.get_mut(&mesh.0) else {
        return;
    };
    let colors: Vec<[f32; 4]> = geometry
        .triangle_colors
        .iter()
        .map(|c| {
            let LinearRgba {
                red, green, blue, ..
            } = debug_color(*c).to_linear();
            [red, green, blue, 1.0]
        })
        .collect();
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, geometry.triangle_positions.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, geometry.triangle_normals.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_colors_are_read_as_srgb() {
        let grey = debug_color([0.5, 0.5, 0.5]).to_linear();
        assert!((grey.red - 0.214).abs() < 1.0e-3, "{grey:?}");

        let white = debug_color([1.0, 1.0, 1.0]).to_linear();
        assert_eq!([white.red, white.green, white.blue], [1.0, 1.0, 1.0]);
    }
}
