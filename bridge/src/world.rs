//! Rapier world owned by the bridge.
//!
//! This bundles every Rapier set and pipeline needed to simulate and query a scene so the
//! rest of the crate can talk about "the world" instead of a dozen loose structures.
//!
//! Conventions
//! - Units are meters and seconds.
//! - The world is advanced by a fixed timestep (see [`BridgeConfig::timestep`]).
//! - Ray casts run against the broad-phase state of the last step, so bodies inserted since
//!   then are not visible to queries until the next step.

// Re-export Rapier so hosts can name handles and builders without depending on `rapier3d`.
pub use rapier3d;

use rapier3d::prelude::*;

use crate::constants::{FIXED_TIMESTEP, GRAVITY};
use crate::error::{BridgeError, UnknownBodyErr};
use snafu::OptionExt;

/// World-level settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BridgeConfig {
    /// Gravity acceleration (m/s²).
    pub gravity: Vector<f32>,
    /// Simulated seconds per step.
    pub timestep: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            gravity: Vector::from(GRAVITY),
            timestep: FIXED_TIMESTEP,
        }
    }
}

impl BridgeConfig {
    /// Default settings with gravity disabled.
    pub fn weightless() -> Self {
        Self {
            gravity: Vector::zeros(),
            ..Self::default()
        }
    }
}

/// Result of a closest-hit ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    /// World-space hit point.
    pub point: Point<f32>,
    /// Time of impact along the cast segment, in units of the ray direction length.
    pub toi: f32,
}

pub struct PhysicsWorld {
    pub gravity: Vector<f32>,
    pub integration_parameters: IntegrationParameters,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub islands: IslandManager,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    pub ccd_solver: CCDSolver,
    pub pipeline: PhysicsPipeline,
    steps: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: BridgeConfig) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: config.timestep,
            ..IntegrationParameters::default()
        };

        log::info!(
            "physics world created: gravity={:?} dt={}",
            config.gravity,
            config.timestep
        );

        Self {
            gravity: config.gravity,
            integration_parameters,
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            pipeline: PhysicsPipeline::new(),
            steps: 0,
        }
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance the simulation by one fixed timestep.
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        self.steps += 1;
    }

    /// Insert a body together with its collider.
    pub fn add_body(&mut self, body: RigidBody, collider: Collider) -> RigidBodyHandle {
        let handle = self.bodies.insert(body);
        self.colliders
            .insert_with_parent(collider, handle, &mut self.bodies);
        handle
    }

    /// Insert a body without colliders (e.g. a kinematic joint anchor).
    pub fn add_anchor_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    /// Remove a body, its colliders and every joint attached to it.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> Option<RigidBody> {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        )
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn is_dynamic(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.get(handle).is_some_and(|b| b.is_dynamic())
    }

    /// Teleport a body and wake it up.
    pub fn set_body_translation(
        &mut self,
        handle: RigidBodyHandle,
        translation: Vector<f32>,
    ) -> Result<(), BridgeError> {
        let body = self.bodies.get_mut(handle).context(UnknownBodyErr)?;
        body.set_translation(translation, true);
        Ok(())
    }

    pub fn set_body_rotation(
        &mut self,
        handle: RigidBodyHandle,
        rotation: Rotation<f32>,
    ) -> Result<(), BridgeError> {
        let body = self.bodies.get_mut(handle).context(UnknownBodyErr)?;
        body.set_rotation(rotation, true);
        Ok(())
    }

    /// Lift a body out of sleep so constraints acting on it are solved next step.
    pub fn wake(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.wake_up(true);
        }
    }

    pub fn insert_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint: impl Into<GenericJoint>,
    ) -> ImpulseJointHandle {
        self.impulse_joints.insert(body1, body2, joint, true)
    }

    pub fn remove_joint(&mut self, handle: ImpulseJointHandle) -> Option<ImpulseJoint> {
        self.impulse_joints.remove(handle, true)
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    /// Create a borrowed `QueryPipeline` view suitable for scene queries.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    /// Closest-hit ray cast along the segment `origin -> end`.
    ///
    /// Returns `None` when nothing is hit or the hit collider has no parent body.
    pub fn cast_ray_closest(&self, origin: Point<f32>, end: Point<f32>) -> Option<RayHit> {
        let dir = end - origin;
        if dir.norm_squared() <= f32::EPSILON {
            return None;
        }

        let ray = Ray::new(origin, dir);
        let (collider, toi) = self
            .query_pipeline(QueryFilter::default())
            .cast_ray(&ray, 1.0, true)?;
        let body = self.colliders.get(collider)?.parent()?;

        Some(RayHit {
            body,
            collider,
            point: ray.point_at(toi),
            toi,
        })
    }
}
