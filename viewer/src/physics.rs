//! Hosts the physics bridge inside the bevy app.
//!
//! The bridge ticks in `FixedUpdate` at the bridge's frame rate and writes poses back into
//! bevy `Transform`s (ordinary meshes) or [`InstancedMesh`] buffers. Instanced buffers are
//! fanned out to their instance entities in `PostUpdate`, only when marked dirty.

use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy::transform::TransformSystems;
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use physics_bridge::{
    BridgeConfig, FRAME_RATE, INSTANCE_STRIDE, MeshId, MouseDrag, PhysicsBridge, SceneSink,
};

pub(super) fn plugin(app: &mut App) {
    app.insert_resource(Time::<Fixed>::from_hz(FRAME_RATE as f64));
    app.insert_resource(PhysicsState::new(BridgeConfig::default()));
    app.add_systems(FixedUpdate, step_physics);
    app.add_systems(PostUpdate, apply_instances.before(TransformSystems::Propagate));
}

/// Bridge, drag controller and the mesh id -> entity map used when syncing.
#[derive(Resource)]
pub struct PhysicsState {
    pub bridge: PhysicsBridge,
    pub drag: MouseDrag<Entity>,
    entities: HashMap<MeshId, Entity>,
    next_id: u64,
}

impl PhysicsState {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            bridge: PhysicsBridge::new(config),
            drag: MouseDrag::default(),
            entities: HashMap::default(),
            next_id: 0,
        }
    }

    /// Reserve a mesh id for `entity`.
    pub fn track(&mut self, entity: Entity) -> MeshId {
        self.next_id += 1;
        let id = MeshId(self.next_id);
        self.entities.insert(id, entity);
        id
    }

    pub fn untrack(&mut self, mesh: MeshId) {
        self.entities.remove(&mesh);
        self.bridge.remove_mesh(mesh);
    }
}

/// A render mesh bridged to physics.
#[derive(Component, Clone, Copy, Debug)]
pub struct PhysicsMesh(pub MeshId);

/// Per-instance transforms of an instanced mesh, in the bridge's flat matrix layout.
#[derive(Component, Debug)]
pub struct InstancedMesh {
    pub matrices: Vec<f32>,
    /// One entity per instance, drawn with the shared mesh and material.
    pub instances: Vec<Entity>,
    pub dirty: bool,
}

/// Marks an entity drawn as one instance of an [`InstancedMesh`].
#[derive(Component)]
pub struct MeshInstance;

pub fn to_vec3(v: &Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub fn to_vector(v: Vec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

pub fn to_point(v: Vec3) -> Point3<f32> {
    Point3::new(v.x, v.y, v.z)
}

pub fn to_quat(q: &UnitQuaternion<f32>) -> Quat {
    Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

pub fn to_rotation(q: Quat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

struct BevySink<'a, 'w, 's> {
    entities: &'a HashMap<MeshId, Entity>,
    transforms: &'a mut Query<'w, 's, &'static mut Transform, With<PhysicsMesh>>,
    instanced: &'a mut Query<'w, 's, &'static mut InstancedMesh>,
}

impl SceneSink for BevySink<'_, '_, '_> {
    fn set_mesh_pose(
        &mut self,
        mesh: MeshId,
        translation: &Vector3<f32>,
        rotation: &UnitQuaternion<f32>,
    ) {
        let Some(entity) = self.entities.get(&mesh) else {
            return;
        };
        if let Ok(mut transform) = self.transforms.get_mut(*entity) {
            transform.translation = to_vec3(translation);
            transform.rotation = to_quat(rotation);
        }
    }

    fn instance_matrices_mut(&mut self, mesh: MeshId) -> Option<&mut [f32]> {
        let entity = self.entities.get(&mesh)?;
        let instanced = self.instanced.get_mut(*entity).ok()?.into_inner();
        Some(instanced.matrices.as_mut_slice())
    }

    fn mark_instances_dirty(&mut self, mesh: MeshId) {
        let Some(entity) = self.entities.get(&mesh) else {
            return;
        };
        if let Ok(mut instanced) = self.instanced.get_mut(*entity) {
            instanced.dirty = true;
        }
    }
}

fn step_physics(
    mut physics: ResMut<PhysicsState>,
    mut transforms: Query<&mut Transform, With<PhysicsMesh>>,
    mut instanced: Query<&mut InstancedMesh>,
) {
    let PhysicsState {
        bridge, entities, ..
    } = &mut *physics;

    bridge.tick(&mut BevySink {
        entities,
        transforms: &mut transforms,
        instanced: &mut instanced,
    });
}

fn apply_instances(
    mut instanced: Query<&mut InstancedMesh>,
    mut transforms: Query<&mut Transform, (With<MeshInstance>, Without<PhysicsMesh>)>,
) {
    for mut group in &mut instanced {
        if !group.dirty {
            continue;
        }
        group.dirty = false;

        for (i, entity) in group.instances.iter().enumerate() {
            let block = &group.matrices[i * INSTANCE_STRIDE..(i + 1) * INSTANCE_STRIDE];
            if let Ok(mut transform) = transforms.get_mut(*entity) {
                *transform = Transform::from_matrix(Mat4::from_cols_slice(block));
            }
        }
    }
}
