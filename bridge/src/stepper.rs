//! Fixed-rate stepping and transform sync.
//!
//! The host calls [`PhysicsBridge::tick`] from a 60 Hz timer. Each tick advances the world by
//! exactly one [`FIXED_TIMESTEP`](crate::constants::FIXED_TIMESTEP), whatever the real time
//! elapsed, then pushes the pose of every bridged body into the render scene through
//! [`SceneSink`].

use rapier3d::prelude::*;

use crate::binding::{Binding, MeshId};
use crate::bridge::PhysicsBridge;
use crate::constants::INSTANCE_STRIDE;
use crate::transform::compose_matrix;

/// Render-side receiver of simulated poses.
pub trait SceneSink {
    /// Overwrite the transform of an ordinary mesh.
    fn set_mesh_pose(&mut self, mesh: MeshId, translation: &Vector<f32>, rotation: &Rotation<f32>);

    /// Flat column-major matrix buffer of an instanced mesh, 16 floats per instance.
    fn instance_matrices_mut(&mut self, mesh: MeshId) -> Option<&mut [f32]>;

    /// Flag an instanced mesh's buffer for re-upload. Called once per mesh per tick.
    fn mark_instances_dirty(&mut self, mesh: MeshId);
}

impl PhysicsBridge {
    /// Advance one fixed step and sync every bridged mesh.
    ///
    /// The first tick only establishes the baseline: the world is not stepped, but meshes
    /// are still synced so instanced buffers pick up their bodies' poses right away.
    ///
    /// # Panics
    /// If a bridged instanced mesh has no instance buffer in `sink`, or a buffer too short
    /// for its instance count.
    pub fn tick(&mut self, sink: &mut impl SceneSink) {
        if !self.primed {
            self.primed = true;
            self.sync(sink);
            return;
        }

        if let Some(debug) = self.debug.as_mut() {
            debug.clear_buffers();
        }

        self.world.step();

        if let Some(debug) = self.debug.as_mut() {
            debug.generate(&self.world);
        }

        self.sync(sink);
    }

    /// Copy body poses into the scene, in registry order.
    fn sync(&self, sink: &mut impl SceneSink) {
        for (mesh, binding) in self.registry.iter() {
            match binding {
                Binding::Single(handle) => {
                    let Some(body) = self.world.body(*handle) else {
                        continue;
                    };
                    sink.set_mesh_pose(mesh, body.translation(), body.rotation());
                }
                Binding::Instanced(handles) => {
                    let matrices = sink
                        .instance_matrices_mut(mesh)
                        .unwrap_or_else(|| panic!("instanced mesh {mesh} has no instance buffer"));
                    assert!(
                        matrices.len() >= handles.len() * INSTANCE_STRIDE,
                        "instance buffer of mesh {} holds {} floats, {} instances need {}",
                        mesh,
                        matrices.len(),
                        handles.len(),
                        handles.len() * INSTANCE_STRIDE
                    );

                    for (i, handle) in handles.iter().enumerate() {
                        if let Some(body) = self.world.body(*handle) {
                            compose_matrix(
                                body.translation(),
                                body.rotation(),
                                matrices,
                                i * INSTANCE_STRIDE,
                            );
                        }
                    }
                    sink.mark_instances_dirty(mesh);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::binding::MeshDesc;
    use crate::debug_draw::DebugDrawMode;
    use crate::shape::GeometryDesc;
    use crate::transform::instance_translation;
    use crate::world::BridgeConfig;

    #[derive(Default)]
    struct FakeSink {
        poses: HashMap<MeshId, (Vector<f32>, Rotation<f32>)>,
        pose_writes: Vec<MeshId>,
        instances: HashMap<MeshId, Vec<f32>>,
        dirty: Vec<MeshId>,
    }

    impl SceneSink for FakeSink {
        fn set_mesh_pose(
            &mut self,
            mesh: MeshId,
            translation: &Vector<f32>,
            rotation: &Rotation<f32>,
        ) {
            self.poses.insert(mesh, (*translation, *rotation));
            self.pose_writes.push(mesh);
        }

        fn instance_matrices_mut(&mut self, mesh: MeshId) -> Option<&mut [f32]> {
            self.instances.get_mut(&mesh).map(Vec::as_mut_slice)
        }

        fn mark_instances_dirty(&mut self, mesh: MeshId) {
            self.dirty.push(mesh);
        }
    }

    fn instance_buffer(translations: &[[f32; 3]]) -> Vec<f32> {
        let mut buffer = Vec::new();
        for t in translations {
            let mut m = [0.0; 16];
            compose_matrix(&Vector::from(*t), &Rotation::identity(), &mut m, 0);
            buffer.extend_from_slice(&m);
        }
        buffer
    }

    fn ball(bridge: &mut PhysicsBridge, id: u64, at: Vector<f32>) {
        let mesh = MeshDesc::single(MeshId(id), GeometryDesc::sphere(0.5), at);
        bridge.add_mesh(&mesh, 1.0).unwrap();
    }

    #[test]
    fn first_tick_syncs_without_stepping() {
        let mut bridge = PhysicsBridge::default();
        ball(&mut bridge, 1, vector![0.0, 10.0, 0.0]);
        let mut sink = FakeSink::default();

        bridge.tick(&mut sink);

        assert!(bridge.is_primed());
        assert_eq!(bridge.world.steps(), 0);
        assert_eq!(sink.pose_writes, vec![MeshId(1)]);
        assert_eq!(sink.poses[&MeshId(1)].0, vector![0.0, 10.0, 0.0]);

        bridge.tick(&mut sink);
        assert_eq!(bridge.world.steps(), 1);
        assert_eq!(sink.pose_writes, vec![MeshId(1), MeshId(1)]);
        assert!(sink.poses[&MeshId(1)].0.y < 10.0);
    }

    #[test]
    fn first_tick_fills_instance_buffers_from_bodies() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        let initial = instance_buffer(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let mesh = MeshDesc::instanced(MeshId(4), GeometryDesc::sphere(0.5), &initial, 2);
        bridge.add_mesh(&mesh, 1.0).unwrap();

        let mut sink = FakeSink::default();
        sink.instances.insert(MeshId(4), vec![0.0; 32]);
        bridge.tick(&mut sink);

        assert_eq!(bridge.world.steps(), 0);
        assert_eq!(sink.dirty, vec![MeshId(4)]);
        assert_eq!(sink.instances[&MeshId(4)], initial);
    }

    #[test]
    fn weightless_ticks_leave_poses_unchanged() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        ball(&mut bridge, 1, vector![1.0, 2.0, 3.0]);
        let mut sink = FakeSink::default();

        for _ in 0..4 {
            bridge.tick(&mut sink);
        }

        assert_eq!(bridge.world.steps(), 3);
        let (translation, rotation) = sink.poses[&MeshId(1)];
        assert!((translation - vector![1.0, 2.0, 3.0]).norm() < 1.0e-6);
        assert!(rotation.angle() < 1.0e-6);
    }

    #[test]
    fn gravity_pulls_dynamic_meshes_down() {
        let mut bridge = PhysicsBridge::default();
        ball(&mut bridge, 1, vector![0.0, 10.0, 0.0]);
        let mut sink = FakeSink::default();

        for _ in 0..31 {
            bridge.tick(&mut sink);
        }

        // 30 steps is half a second: y ≈ 10 - 9.8 * 0.5² / 2
        let y = sink.poses[&MeshId(1)].0.y;
        assert!(y < 9.0 && y > 8.5, "unexpected height {y}");
    }

    #[test]
    fn meshes_sync_in_insertion_order() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        ball(&mut bridge, 7, vector![0.0, 0.0, 0.0]);
        ball(&mut bridge, 3, vector![5.0, 0.0, 0.0]);
        ball(&mut bridge, 5, vector![10.0, 0.0, 0.0]);
        let mut sink = FakeSink::default();

        bridge.tick(&mut sink);
        bridge.tick(&mut sink);

        let once = [MeshId(7), MeshId(3), MeshId(5)];
        assert_eq!(sink.pose_writes, [once, once].concat());
    }

    #[test]
    fn instanced_buffers_are_rewritten_and_marked_dirty_once() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        let translations = [[0.0, 0.0, 0.0], [3.0, 0.0, 0.0], [0.0, 0.0, 3.0]];
        let initial = instance_buffer(&translations);
        let mesh = MeshDesc::instanced(MeshId(2), GeometryDesc::sphere(0.5), &initial, 3);
        let handles = bridge.add_mesh(&mesh, 1.0).unwrap().binding;

        // Spin the middle instance so its matrix picks up a rotation.
        let spun = Rotation::from_axis_angle(&Vector::y_axis(), 0.5);
        bridge
            .world
            .set_body_rotation(handles.handles()[1], spun)
            .unwrap();

        let mut sink = FakeSink::default();
        let mut scrambled = initial.clone();
        scrambled[12..15].copy_from_slice(&[99.0, 99.0, 99.0]);
        sink.instances.insert(MeshId(2), scrambled);

        bridge.tick(&mut sink);
        bridge.tick(&mut sink);

        // Once per tick, not once per instance.
        assert_eq!(sink.dirty, vec![MeshId(2), MeshId(2)]);
        let matrices = &sink.instances[&MeshId(2)];
        for (i, t) in translations.iter().enumerate() {
            let at = instance_translation(matrices, i);
            assert!((at - Vector::from(*t)).norm() < 1.0e-5, "instance {i}: {at:?}");
            assert_eq!(matrices[i * 16 + 3], 0.0);
            assert_eq!(matrices[i * 16 + 15], 1.0);
        }

        let mut expected = [0.0; 16];
        compose_matrix(&vector![3.0, 0.0, 0.0], &spun, &mut expected, 0);
        for (a, e) in matrices[16..32].iter().zip(&expected) {
            assert!((a - e).abs() < 1.0e-5);
        }
    }

    #[test]
    #[should_panic(expected = "has no instance buffer")]
    fn missing_instance_buffer_is_a_precondition_violation() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        let initial = instance_buffer(&[[0.0, 0.0, 0.0]]);
        let mesh = MeshDesc::instanced(MeshId(2), GeometryDesc::sphere(0.5), &initial, 1);
        bridge.add_mesh(&mesh, 1.0).unwrap();

        let mut sink = FakeSink::default();
        bridge.tick(&mut sink);
    }

    #[test]
    fn static_meshes_are_never_synced() {
        let mut bridge = PhysicsBridge::default();
        let ground = MeshDesc::single(
            MeshId(1),
            GeometryDesc::cuboid(10.0, 1.0, 10.0),
            Vector::zeros(),
        );
        bridge.add_mesh(&ground, 0.0).unwrap();
        let mut sink = FakeSink::default();

        bridge.tick(&mut sink);
        bridge.tick(&mut sink);

        assert!(sink.pose_writes.is_empty());
        assert!(sink.dirty.is_empty());
    }

    #[test]
    fn debug_geometry_follows_each_step_once_attached() {
        let mut bridge = PhysicsBridge::new(BridgeConfig::weightless());
        ball(&mut bridge, 1, Vector::zeros());
        let mut sink = FakeSink::default();

        bridge.tick(&mut sink);
        bridge.tick(&mut sink);
        assert!(bridge.debug_geometry().is_none());

        bridge.attach_debug_draw(DebugDrawMode::Lines);
        assert!(bridge.debug_geometry().unwrap().is_empty());

        bridge.tick(&mut sink);
        let lines = bridge.debug_geometry().unwrap().line_count();
        assert!(lines > 0);

        // Cleared before every step, so counts do not accumulate.
        bridge.tick(&mut sink);
        assert_eq!(bridge.debug_geometry().unwrap().line_count(), lines);
    }
}
