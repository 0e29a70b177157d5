use std::collections::BTreeMap;

use bevy::prelude::*;
use leafwing_input_manager::prelude::ActionState;
use physics_bridge::rapier3d::prelude::{Point, Vector};
use physics_bridge::{
    Binding, GeometryDesc, INSTANCE_STRIDE, LimitMotor, MeshDesc, MeshId, MeshSource,
    ShapeDescriptor, SpringDamper, compose_matrix,
};

use crate::input::InputAction;
use crate::physics::{
    InstancedMesh, MeshInstance, PhysicsMesh, PhysicsState, to_rotation, to_vector,
};

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, (register_shapes, setup).chain());
    app.add_systems(Update, reset_meshes);
}

/// Where a bridged mesh (or each of its instances) started.
#[derive(Component)]
struct SpawnPoints(Vec<Vec3>);

const BALL_GRID: usize = 4;

fn register_shapes(mut physics: ResMut<PhysicsState>) {
    physics
        .bridge
        .shapes
        .register("cylinder", |params: &BTreeMap<String, f32>| {
            Some(ShapeDescriptor::CylinderY {
                radius: *params.get("radius")?,
                half_height: params.get("height")? / 2.0,
            })
        });
}

/// Spawn a render mesh and bridge it, returning the bodies created for it.
fn spawn_single(
    commands: &mut Commands,
    physics: &mut PhysicsState,
    bundle: impl Bundle,
    geometry: GeometryDesc,
    transform: Transform,
    mass: f32,
) -> Option<Binding> {
    let entity = commands.spawn((bundle, transform)).id();
    let id = physics.track(entity);
    let mesh = MeshDesc {
        id,
        geometry,
        source: MeshSource::Single {
            translation: to_vector(transform.translation),
            rotation: to_rotation(transform.rotation),
        },
    };

    let Some(created) = physics.bridge.add_mesh(&mesh, mass) else {
        physics.untrack(id);
        return None;
    };
    commands
        .entity(entity)
        .insert((PhysicsMesh(id), SpawnPoints(vec![transform.translation])));
    Some(created.binding)
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut physics: ResMut<PhysicsState>,
) {
    info!("World setup");
    let physics = &mut *physics;

    // ground
    spawn_single(
        &mut commands,
        physics,
        (
            Mesh3d(meshes.add(Cuboid::new(40.0, 1.0, 40.0))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::linear_rgb(0.2, 0.3, 0.25),
                perceptual_roughness: 1.0,
                metallic: 0.0,
                ..default()
            })),
        ),
        GeometryDesc::cuboid(40.0, 1.0, 40.0),
        Transform::from_xyz(0.0, -0.5, 0.0),
        0.0,
    );

    let box_material = materials.add(Color::srgb_u8(124, 144, 255));
    let cube = meshes.add(Cuboid::new(1.0, 1.0, 1.0));
    for (i, y) in [3.0, 5.0, 7.0].into_iter().enumerate() {
        spawn_single(
            &mut commands,
            physics,
            (Mesh3d(cube.clone()), MeshMaterial3d(box_material.clone())),
            GeometryDesc::cuboid(1.0, 1.0, 1.0),
            Transform::from_xyz(i as f32 * 0.3, y, 0.0)
                .with_rotation(Quat::from_rotation_y(i as f32 * 0.4)),
            1.0,
        );
    }

    let sphere_material = materials.add(Color::srgb_u8(255, 144, 124));
    spawn_single(
        &mut commands,
        physics,
        (
            Mesh3d(meshes.add(Sphere::new(1.0))),
            MeshMaterial3d(sphere_material.clone()),
        ),
        GeometryDesc::Sphere { radius: None },
        Transform::from_xyz(-4.0, 6.0, 1.0),
        2.0,
    );
    spawn_single(
        &mut commands,
        physics,
        (
            Mesh3d(meshes.add(
                Sphere::new(0.75)
                    .mesh()
                    .ico(2)
                    .unwrap_or_else(|_| Sphere::new(0.75).mesh().uv(32, 18)),
            )),
            MeshMaterial3d(sphere_material),
        ),
        GeometryDesc::Icosahedron { radius: Some(0.75) },
        Transform::from_xyz(4.0, 4.0, -2.0),
        1.0,
    );
    spawn_single(
        &mut commands,
        physics,
        (
            Mesh3d(meshes.add(Cylinder::new(0.5, 2.0))),
            MeshMaterial3d(materials.add(Color::srgb_u8(144, 255, 124))),
        ),
        GeometryDesc::Other {
            kind: "cylinder".into(),
            params: BTreeMap::from([("radius".into(), 0.5), ("height".into(), 2.0)]),
        },
        Transform::from_xyz(-2.0, 3.0, -4.0),
        1.5,
    );

    spawn_pendulum(&mut commands, &mut meshes, &mut materials, physics);
    spawn_ball_grid(&mut commands, &mut meshes, &mut materials, physics);

    // light
    commands.spawn((
        PointLight {
            shadows_enabled: true,
            intensity: 4_000_000.0,
            range: 60.0,
            ..default()
        },
        Transform::from_xyz(4.0, 14.0, 4.0),
    ));
}

/// A static post with a two-ball chain hanging from a hinge, and a box sprung below it on a
/// vertical slider.
fn spawn_pendulum(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    physics: &mut PhysicsState,
) {
    let material = materials.add(Color::srgb_u8(220, 220, 120));
    let cube = meshes.add(Cuboid::new(0.4, 0.4, 0.4));
    let Some(Binding::Single(post)) = spawn_single(
        commands,
        physics,
        (Mesh3d(cube.clone()), MeshMaterial3d(material.clone())),
        GeometryDesc::cuboid(0.4, 0.4, 0.4),
        Transform::from_xyz(8.0, 8.0, 0.0),
        0.0,
    ) else {
        return;
    };

    let ball = meshes.add(Sphere::new(0.5));
    let mut chain = Vec::new();
    for x in [10.0, 12.0] {
        if let Some(Binding::Single(handle)) = spawn_single(
            commands,
            physics,
            (Mesh3d(ball.clone()), MeshMaterial3d(material.clone())),
            GeometryDesc::sphere(0.5),
            Transform::from_xyz(x, 8.0, 0.0),
            1.0,
        ) {
            chain.push(handle);
        }
    }
    let Some(Binding::Single(slider)) = spawn_single(
        commands,
        physics,
        (Mesh3d(cube), MeshMaterial3d(material)),
        GeometryDesc::cuboid(0.4, 0.4, 0.4),
        Transform::from_xyz(8.0, 5.0, 0.0),
        1.0,
    ) else {
        return;
    };
    let [bob, tail] = chain[..] else {
        return;
    };

    let world = &mut physics.bridge.world;
    world.add_revolute_joint(
        post,
        bob,
        Point::new(8.0, 8.0, 0.0),
        Vector::z_axis(),
        None,
        None,
    );
    world.add_spherical_joint(bob, tail, Point::new(11.0, 8.0, 0.0));
    world.add_prismatic_joint(
        post,
        slider,
        Point::new(8.0, 5.0, 0.0),
        Vector::y_axis(),
        Some(SpringDamper::new(2.0, 0.3)),
        Some(LimitMotor::limits(-2.0, 2.0)),
    );
}

/// Grid of small balls sharing one mesh, bridged as a single instanced mesh.
fn spawn_ball_grid(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    physics: &mut PhysicsState,
) {
    let mesh = meshes.add(Sphere::new(0.3));
    let material = materials.add(Color::srgb_u8(200, 120, 255));

    let count = BALL_GRID * BALL_GRID;
    let mut matrices = vec![0.0; count * INSTANCE_STRIDE];
    let mut spawn_points = Vec::with_capacity(count);
    let mut instances = Vec::with_capacity(count);
    for i in 0..count {
        let at = Vec3::new(
            (i % BALL_GRID) as f32 * 0.8 - 6.0,
            10.0 + (i / BALL_GRID) as f32 * 0.1,
            (i / BALL_GRID) as f32 * 0.8 + 2.0,
        );
        compose_matrix(
            &to_vector(at),
            &to_rotation(Quat::IDENTITY),
            &mut matrices,
            i * INSTANCE_STRIDE,
        );
        spawn_points.push(at);
        instances.push(
            commands
                .spawn((
                    MeshInstance,
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(material.clone()),
                    Transform::from_translation(at),
                ))
                .id(),
        );
    }

    let entity = commands.spawn_empty().id();
    let id = physics.track(entity);
    let desc = MeshDesc::instanced(id, GeometryDesc::sphere(0.3), &matrices, count);
    if physics.bridge.add_mesh(&desc, 0.5).is_none() {
        physics.untrack(id);
        return;
    }

    commands.entity(entity).insert((
        PhysicsMesh(id),
        SpawnPoints(spawn_points),
        InstancedMesh {
            matrices,
            instances,
            dirty: false,
        },
    ));
}

fn reset_meshes(
    actions: Res<ActionState<InputAction>>,
    mut physics: ResMut<PhysicsState>,
    meshes: Query<(&PhysicsMesh, &SpawnPoints)>,
) {
    if !actions.just_pressed(&InputAction::Reset) {
        return;
    }

    for (PhysicsMesh(mesh), SpawnPoints(points)) in &meshes {
        if !physics.bridge.registry.contains(*mesh) {
            continue;
        }
        for (index, at) in points.iter().enumerate() {
            reset_one(&mut physics, *mesh, *at, index);
        }
    }
    info!("meshes reset to their spawn points");
}

fn reset_one(physics: &mut PhysicsState, mesh: MeshId, at: Vec3, index: usize) {
    if let Err(err) = physics.bridge.set_mesh_position(mesh, to_vector(at), index) {
        warn!("could not reset mesh {mesh}: {err}");
    }
}
