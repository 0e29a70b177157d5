//! Mesh to rigid-body binding.
//!
//! A render mesh becomes one rigid body, or one body per instance for instanced meshes.
//! Only dynamic bindings are remembered: static bodies never move, so nothing has to be
//! copied back to their meshes.
//!
//! # Registry
//! [`BodyRegistry`] owns the mesh -> body association, keyed by the host's stable
//! [`MeshId`]. Iteration follows insertion order so transform sync is deterministic.
//! Entries live until [`PhysicsBridge::remove_mesh`] is called for the mesh.

use std::collections::HashMap;
use std::fmt;

use rapier3d::prelude::*;
use snafu::{OptionExt, ensure};

use crate::bridge::PhysicsBridge;
use crate::constants::INSTANCE_STRIDE;
use crate::error::{BridgeError, InstanceOutOfRangeErr, UnknownMeshErr};
use crate::shape::{GeometryDesc, ShapeDescriptor};
use crate::transform::instance_translation;
use crate::world::PhysicsWorld;

/// Stable, host-assigned identifier of a render mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u64);

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a mesh's initial pose comes from.
#[derive(Clone, Copy, Debug)]
pub enum MeshSource<'a> {
    /// Ordinary mesh with its own transform.
    Single {
        translation: Vector<f32>,
        rotation: Rotation<f32>,
    },
    /// Instanced mesh; `matrices` holds `count` column-major 4x4 matrices.
    Instanced { matrices: &'a [f32], count: usize },
}

/// Everything the binder needs to know about a render mesh.
#[derive(Clone, Debug)]
pub struct MeshDesc<'a> {
    pub id: MeshId,
    pub geometry: GeometryDesc,
    pub source: MeshSource<'a>,
}

impl<'a> MeshDesc<'a> {
    pub fn single(id: MeshId, geometry: GeometryDesc, translation: Vector<f32>) -> Self {
        Self {
            id,
            geometry,
            source: MeshSource::Single {
                translation,
                rotation: Rotation::identity(),
            },
        }
    }

    pub fn instanced(
        id: MeshId,
        geometry: GeometryDesc,
        matrices: &'a [f32],
        count: usize,
    ) -> Self {
        Self {
            id,
            geometry,
            source: MeshSource::Instanced { matrices, count },
        }
    }
}

/// Bodies created for one mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Single(RigidBodyHandle),
    /// One body per instance, indexed like the instance buffer.
    Instanced(Vec<RigidBodyHandle>),
}

impl Binding {
    pub fn handles(&self) -> &[RigidBodyHandle] {
        match self {
            Self::Single(handle) => std::slice::from_ref(handle),
            Self::Instanced(handles) => handles,
        }
    }

    fn instance(&self, mesh: MeshId, index: usize) -> Result<RigidBodyHandle, BridgeError> {
        match self {
            Self::Single(handle) => Ok(*handle),
            Self::Instanced(handles) => {
                ensure!(
                    index < handles.len(),
                    InstanceOutOfRangeErr {
                        mesh,
                        index,
                        count: handles.len()
                    }
                );
                Ok(handles[index])
            }
        }
    }
}

/// Kind of body created for a mesh, derived from its mass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// `mass == 0`: immovable, never simulated.
    Static,
    /// `mass > 0`: simulated under forces and constraints.
    Dynamic,
}

impl BodyKind {
    pub fn from_mass(mass: f32) -> Self {
        if mass > 0.0 {
            Self::Dynamic
        } else {
            Self::Static
        }
    }

    fn builder(self) -> RigidBodyBuilder {
        match self {
            Self::Static => RigidBodyBuilder::fixed(),
            Self::Dynamic => RigidBodyBuilder::dynamic(),
        }
    }
}

/// Bodies created by [`PhysicsBridge::add_mesh`], for callers that need them right away
/// (joint construction, for instance).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyBinding {
    pub kind: BodyKind,
    pub binding: Binding,
}

/// Owning mesh -> dynamic body association.
#[derive(Debug, Default)]
pub struct BodyRegistry {
    order: Vec<MeshId>,
    bindings: HashMap<MeshId, Binding>,
}

impl BodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding. Re-binding a mesh replaces the previous entry in place and hands
    /// it back; its bodies are the caller's to release.
    pub fn insert(&mut self, mesh: MeshId, binding: Binding) -> Option<Binding> {
        let previous = self.bindings.insert(mesh, binding);
        if previous.is_none() {
            self.order.push(mesh);
        }
        previous
    }

    pub fn get(&self, mesh: MeshId) -> Option<&Binding> {
        self.bindings.get(&mesh)
    }

    pub fn remove(&mut self, mesh: MeshId) -> Option<Binding> {
        let removed = self.bindings.remove(&mesh)?;
        self.order.retain(|id| *id != mesh);
        Some(removed)
    }

    pub fn contains(&self, mesh: MeshId) -> bool {
        self.bindings.contains_key(&mesh)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &Binding)> {
        self.order.iter().map(|id| (*id, &self.bindings[id]))
    }

    /// Mesh owning `body`, if the body is bridged.
    pub fn mesh_of(&self, body: RigidBodyHandle) -> Option<(MeshId, usize)> {
        self.iter().find_map(|(mesh, binding)| {
            binding
                .handles()
                .iter()
                .position(|h| *h == body)
                .map(|index| (mesh, index))
        })
    }
}

fn create_body(
    world: &mut PhysicsWorld,
    shape: &ShapeDescriptor,
    kind: BodyKind,
    mass: f32,
    translation: Vector<f32>,
    rotation: Rotation<f32>,
) -> RigidBodyHandle {
    let body = kind
        .builder()
        .translation(translation)
        .rotation(rotation.scaled_axis())
        .build();
    world.add_body(body, shape.collider(mass))
}

impl PhysicsBridge {
    /// Create the rigid body (or bodies) for a render mesh.
    ///
    /// Returns `None` when the mesh's geometry has no collision shape. Every created body is
    /// added to the world immediately; only dynamic ones (`mass > 0`) are registered.
    ///
    /// Adding a mesh that is already bound replaces its binding: the previous bodies are
    /// removed from the world first, and the mesh moves to the end of the sync order.
    ///
    /// # Panics
    /// If an instanced mesh's buffer holds fewer than `count` matrices.
    pub fn add_mesh(&mut self, mesh: &MeshDesc<'_>, mass: f32) -> Option<BodyBinding> {
        let Some(shape) = self.shapes.shape_for(&mesh.geometry) else {
            log::debug!(
                "mesh {} has unsupported geometry `{}`",
                mesh.id,
                mesh.geometry.kind()
            );
            return None;
        };
        let kind = BodyKind::from_mass(mass);

        if self.remove_mesh(mesh.id).is_some() {
            log::debug!("mesh {} re-bound, previous bodies removed", mesh.id);
        }

        let binding = match mesh.source {
            MeshSource::Single {
                translation,
                rotation,
            } => Binding::Single(create_body(
                &mut self.world,
                &shape,
                kind,
                mass,
                translation,
                rotation,
            )),
            MeshSource::Instanced { matrices, count } => {
                assert!(
                    matrices.len() >= count * INSTANCE_STRIDE,
                    "instance buffer of mesh {} holds {} floats, {} instances need {}",
                    mesh.id,
                    matrices.len(),
                    count,
                    count * INSTANCE_STRIDE
                );
                let handles = (0..count)
                    .map(|i| {
                        create_body(
                            &mut self.world,
                            &shape,
                            kind,
                            mass,
                            instance_translation(matrices, i),
                            Rotation::identity(),
                        )
                    })
                    .collect();
                Binding::Instanced(handles)
            }
        };

        if kind == BodyKind::Dynamic {
            self.registry.insert(mesh.id, binding.clone());
        }

        Some(BodyBinding { kind, binding })
    }

    /// Teleport the body bound to `mesh` (or to instance `index` of an instanced mesh).
    ///
    /// `index` is ignored for ordinary meshes.
    pub fn set_mesh_position(
        &mut self,
        mesh: MeshId,
        position: Vector<f32>,
        index: usize,
    ) -> Result<(), BridgeError> {
        let body = self
            .registry
            .get(mesh)
            .context(UnknownMeshErr { mesh })?
            .instance(mesh, index)?;
        self.world.set_body_translation(body, position)
    }

    /// Forget a mesh and remove its bodies (with their colliders and joints) from the world.
    pub fn remove_mesh(&mut self, mesh: MeshId) -> Option<Binding> {
        let binding = self.registry.remove(mesh)?;
        for handle in binding.handles() {
            self.world.remove_body(*handle);
        }
        Some(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BridgeConfig;

    fn bridge() -> PhysicsBridge {
        PhysicsBridge::new(BridgeConfig::weightless())
    }

    fn instance_buffer(translations: &[[f32; 3]]) -> Vec<f32> {
        let mut buffer = Vec::new();
        for t in translations {
            let mut m = [0.0; 16];
            m[0] = 1.0;
            m[5] = 1.0;
            m[10] = 1.0;
            m[12..15].copy_from_slice(t);
            m[15] = 1.0;
            buffer.extend_from_slice(&m);
        }
        buffer
    }

    #[test]
    fn dynamic_box_gets_one_registered_body_with_matching_extents() {
        let mut bridge = bridge();
        let mesh = MeshDesc::single(
            MeshId(1),
            GeometryDesc::cuboid(2.0, 1.0, 4.0),
            vector![0.0, 3.0, 0.0],
        );

        let created = bridge.add_mesh(&mesh, 1.0).expect("box is supported");
        assert_eq!(created.kind, BodyKind::Dynamic);
        let Binding::Single(handle) = created.binding else {
            panic!("ordinary mesh must get a single body");
        };

        assert_eq!(bridge.registry.get(MeshId(1)), Some(&Binding::Single(handle)));

        let body = bridge.world.body(handle).unwrap();
        assert!(body.is_dynamic());
        assert_eq!(*body.translation(), vector![0.0, 3.0, 0.0]);

        let collider = &bridge.world.colliders[body.colliders()[0]];
        let cuboid = collider.shape().as_cuboid().unwrap();
        assert_eq!(cuboid.half_extents, vector![1.0, 0.5, 2.0]);
    }

    #[test]
    fn dynamic_sphere_defaults_to_unit_radius() {
        let mut bridge = bridge();
        let mesh = MeshDesc::single(
            MeshId(2),
            GeometryDesc::Sphere { radius: None },
            Vector::zeros(),
        );

        let created = bridge.add_mesh(&mesh, 2.0).unwrap();
        let handle = created.binding.handles()[0];
        let body = bridge.world.body(handle).unwrap();
        let ball = bridge.world.colliders[body.colliders()[0]]
            .shape()
            .as_ball()
            .unwrap();
        assert_eq!(ball.radius, 1.0);
    }

    #[test]
    fn massless_mesh_is_static_and_not_registered() {
        let mut bridge = bridge();
        let mesh = MeshDesc::single(
            MeshId(3),
            GeometryDesc::cuboid(10.0, 1.0, 10.0),
            Vector::zeros(),
        );

        let created = bridge.add_mesh(&mesh, 0.0).unwrap();
        assert_eq!(created.kind, BodyKind::Static);
        assert!(bridge.world.body(created.binding.handles()[0]).unwrap().is_fixed());
        assert!(!bridge.registry.contains(MeshId(3)));
        assert!(bridge.registry.is_empty());
    }

    #[test]
    fn unsupported_geometry_creates_nothing() {
        let mut bridge = bridge();
        let mesh = MeshDesc::single(
            MeshId(4),
            GeometryDesc::Other {
                kind: "torus".into(),
                params: Default::default(),
            },
            Vector::zeros(),
        );

        assert!(bridge.add_mesh(&mesh, 1.0).is_none());
        assert_eq!(bridge.world.bodies.len(), 0);
    }

    #[test]
    fn instanced_mesh_gets_one_body_per_instance() {
        let mut bridge = bridge();
        let translations = [[0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [-6.0, 7.0, -8.0]];
        let matrices = instance_buffer(&translations);
        let mesh = MeshDesc::instanced(MeshId(5), GeometryDesc::sphere(0.5), &matrices, 3);

        let created = bridge.add_mesh(&mesh, 1.0).unwrap();
        let handles = created.binding.handles();
        assert_eq!(handles.len(), 3);
        assert_eq!(bridge.world.bodies.len(), 3);

        for (handle, t) in handles.iter().zip(&translations) {
            let body = bridge.world.body(*handle).unwrap();
            assert_eq!(*body.translation(), Vector::from(*t));
        }
        assert_eq!(bridge.registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "instance buffer")]
    fn short_instance_buffer_is_a_precondition_violation() {
        let mut bridge = bridge();
        let matrices = instance_buffer(&[[0.0, 0.0, 0.0]]);
        let mesh = MeshDesc::instanced(MeshId(6), GeometryDesc::sphere(0.5), &matrices, 2);
        bridge.add_mesh(&mesh, 1.0);
    }

    #[test]
    fn set_mesh_position_moves_the_bound_instance() {
        let mut bridge = bridge();
        let matrices = instance_buffer(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let mesh = MeshDesc::instanced(MeshId(7), GeometryDesc::sphere(0.5), &matrices, 2);
        let handles = bridge.add_mesh(&mesh, 1.0).unwrap().binding;

        bridge
            .set_mesh_position(MeshId(7), vector![9.0, 9.0, 9.0], 1)
            .unwrap();
        let moved = bridge.world.body(handles.handles()[1]).unwrap();
        assert_eq!(*moved.translation(), vector![9.0, 9.0, 9.0]);

        assert_eq!(
            bridge.set_mesh_position(MeshId(7), Vector::zeros(), 2),
            Err(BridgeError::InstanceOutOfRange {
                mesh: MeshId(7),
                index: 2,
                count: 2
            })
        );
        assert_eq!(
            bridge.set_mesh_position(MeshId(99), Vector::zeros(), 0),
            Err(BridgeError::UnknownMesh { mesh: MeshId(99) })
        );
    }

    #[test]
    fn remove_mesh_releases_bodies() {
        let mut bridge = bridge();
        let a = MeshDesc::single(MeshId(8), GeometryDesc::sphere(1.0), Vector::zeros());
        let b = MeshDesc::single(MeshId(9), GeometryDesc::sphere(1.0), vector![5.0, 0.0, 0.0]);
        let body_a = bridge.add_mesh(&a, 1.0).unwrap().binding.handles()[0];
        bridge.add_mesh(&b, 1.0).unwrap();

        assert_eq!(bridge.registry.mesh_of(body_a), Some((MeshId(8), 0)));
        assert!(bridge.remove_mesh(MeshId(8)).is_some());
        assert!(bridge.world.body(body_a).is_none());
        let remaining: Vec<_> = bridge.registry.iter().map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![MeshId(9)]);
        assert!(bridge.remove_mesh(MeshId(8)).is_none());
    }

    #[test]
    fn rebinding_a_mesh_releases_its_previous_bodies() {
        let mut bridge = bridge();
        let first = MeshDesc::single(MeshId(1), GeometryDesc::sphere(1.0), Vector::zeros());
        let old = bridge.add_mesh(&first, 1.0).unwrap().binding.handles()[0];

        let second = MeshDesc::single(MeshId(1), GeometryDesc::sphere(1.0), vector![0.0, 5.0, 0.0]);
        let new = bridge.add_mesh(&second, 1.0).unwrap().binding.handles()[0];

        assert!(bridge.world.body(old).is_none());
        assert_eq!(bridge.world.bodies.len(), 1);
        assert_eq!(bridge.registry.len(), 1);
        assert_eq!(bridge.registry.get(MeshId(1)), Some(&Binding::Single(new)));

        bridge.remove_mesh(MeshId(1));
        assert_eq!(bridge.world.bodies.len(), 0);
    }

    #[test]
    fn rebinding_as_static_drops_the_dynamic_binding() {
        let mut bridge = bridge();
        let matrices = instance_buffer(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let instanced = MeshDesc::instanced(MeshId(2), GeometryDesc::sphere(0.5), &matrices, 2);
        bridge.add_mesh(&instanced, 1.0).unwrap();
        assert_eq!(bridge.world.bodies.len(), 2);

        let single = MeshDesc::single(MeshId(2), GeometryDesc::sphere(0.5), Vector::zeros());
        let created = bridge.add_mesh(&single, 0.0).unwrap();

        assert_eq!(created.kind, BodyKind::Static);
        assert!(!bridge.registry.contains(MeshId(2)));
        assert_eq!(bridge.world.bodies.len(), 1);
    }
}
