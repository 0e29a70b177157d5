//! Joint construction helpers.
//!
//! Joints are described with body-local anchors, which is Rapier's convention. The
//! `world_anchor` variants convert a world-space anchor (and axis) into each body's local
//! frame from the bodies' current poses, so they must be called after the bodies are placed.
//!
//! Softness is described with a [`SpringDamper`] (frequency + damping ratio) rather than
//! raw stiffness. It is applied through acceleration-based motors, which makes the response
//! independent of the bodies' masses.

use std::f32::consts::{PI, TAU};

use rapier3d::prelude::*;

use crate::world::PhysicsWorld;

/// Every axis but translation and rotation along the joint's X axis.
const LOCKED_CYLINDRICAL_AXES: JointAxesMask = JointAxesMask::LIN_Y
    .union(JointAxesMask::LIN_Z)
    .union(JointAxesMask::ANG_Y)
    .union(JointAxesMask::ANG_Z);

/// Soft-constraint parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringDamper {
    /// Natural frequency in Hz.
    pub frequency: f32,
    /// 1.0 is critically damped.
    pub damping_ratio: f32,
}

impl SpringDamper {
    pub fn new(frequency: f32, damping_ratio: f32) -> Self {
        Self {
            frequency,
            damping_ratio,
        }
    }

    /// Acceleration-based motor stiffness: ω².
    pub fn stiffness(&self) -> f32 {
        let omega = TAU * self.frequency;
        omega * omega
    }

    /// Acceleration-based motor damping: 2ζω.
    pub fn damping(&self) -> f32 {
        2.0 * self.damping_ratio * TAU * self.frequency
    }
}

/// Limits and motor for the free axis of a revolute or prismatic joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LimitMotor {
    pub lower: f32,
    pub upper: f32,
    /// Target velocity of the motor (rad/s or m/s).
    pub motor_speed: f32,
    /// Maximum motor force; `0.0` disables the motor.
    pub max_force: f32,
}

impl LimitMotor {
    /// Limits only, no motor.
    pub fn limits(lower: f32, upper: f32) -> Self {
        Self {
            lower,
            upper,
            motor_speed: 0.0,
            max_force: 0.0,
        }
    }
}

/// Body-local anchors for a world-space anchor point.
fn local_anchors(
    world: &PhysicsWorld,
    body1: RigidBodyHandle,
    body2: RigidBodyHandle,
    anchor: Point<f32>,
) -> Option<(Point<f32>, Point<f32>)> {
    let pose1 = world.body(body1)?.position();
    let pose2 = world.body(body2)?.position();
    Some((
        pose1.inverse_transform_point(&anchor),
        pose2.inverse_transform_point(&anchor),
    ))
}

fn local_axes(
    world: &PhysicsWorld,
    body1: RigidBodyHandle,
    body2: RigidBodyHandle,
    axis: UnitVector<f32>,
) -> Option<(UnitVector<f32>, UnitVector<f32>)> {
    let pose1 = world.body(body1)?.position();
    let pose2 = world.body(body2)?.position();
    Some((
        pose1.inverse_transform_unit_vector(&axis),
        pose2.inverse_transform_unit_vector(&axis),
    ))
}

/// World-space joint frame expressed in each body's local frame.
fn local_frames(
    world: &PhysicsWorld,
    body1: RigidBodyHandle,
    body2: RigidBodyHandle,
    frame: Isometry<f32>,
) -> Option<(Isometry<f32>, Isometry<f32>)> {
    let pose1 = world.body(body1)?.position();
    let pose2 = world.body(body2)?.position();
    Some((pose1.inv_mul(&frame), pose2.inv_mul(&frame)))
}

/// Frame at `anchor` whose X axis is `x` and whose Y axis is `y` made orthogonal to it.
fn joint_frame(
    anchor: Point<f32>,
    x: UnitVector<f32>,
    y: UnitVector<f32>,
) -> Option<Isometry<f32>> {
    let z = x.cross(&*y).try_normalize(f32::EPSILON)?;
    let y = z.cross(&*x);
    let rotation = Rotation::from_basis_unchecked(&[x.into_inner(), y, z]);
    Some(Isometry::from_parts(anchor.coords.into(), rotation))
}

/// Apply a spring and/or a limit with optional motor to one free axis.
fn free_axis(
    mut builder: GenericJointBuilder,
    axis: JointAxis,
    spring: Option<SpringDamper>,
    limit: Option<LimitMotor>,
) -> GenericJointBuilder {
    if let Some(limit) = limit {
        builder = builder.limits(axis, [limit.lower, limit.upper]);
        if limit.max_force > 0.0 {
            builder = builder
                .motor_velocity(axis, limit.motor_speed, 1.0)
                .motor_max_force(axis, limit.max_force);
        }
    }

    if let Some(spring) = spring {
        builder = builder
            .motor_model(axis, MotorModel::AccelerationBased)
            .motor_position(axis, 0.0, spring.stiffness(), spring.damping());
    }

    builder
}

/// Single-degree-of-freedom joint whose free axis is `free`.
fn axis_joint(
    locked: JointAxesMask,
    free: JointAxis,
    anchors: (Point<f32>, Point<f32>),
    axes: (UnitVector<f32>, UnitVector<f32>),
    spring: Option<SpringDamper>,
    limit: Option<LimitMotor>,
) -> GenericJoint {
    let builder = GenericJointBuilder::new(locked)
        .local_anchor1(anchors.0)
        .local_anchor2(anchors.1)
        .local_axis1(axes.0)
        .local_axis2(axes.1);

    free_axis(builder, free, spring, limit).build()
}

impl PhysicsWorld {
    /// Ball-and-socket joint at a world-space anchor.
    pub fn add_spherical_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
    ) -> Option<ImpulseJointHandle> {
        let (local1, local2) = local_anchors(self, body1, body2, anchor)?;
        Some(self.add_spherical_joint_local(body1, body2, local1, local2))
    }

    /// Ball-and-socket joint from body-local anchors.
    pub fn add_spherical_joint_local(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        local_anchor1: Point<f32>,
        local_anchor2: Point<f32>,
    ) -> ImpulseJointHandle {
        let joint = SphericalJointBuilder::new()
            .local_anchor1(local_anchor1)
            .local_anchor2(local_anchor2)
            .build();
        self.insert_joint(body1, body2, joint)
    }

    /// Hinge around a world-space `axis` through `anchor`.
    ///
    /// `spring` pulls the hinge back to its rest angle; `limit` bounds the angle (radians).
    pub fn add_revolute_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
        axis: UnitVector<f32>,
        spring: Option<SpringDamper>,
        limit: Option<LimitMotor>,
    ) -> Option<ImpulseJointHandle> {
        let anchors = local_anchors(self, body1, body2, anchor)?;
        let axes = local_axes(self, body1, body2, axis)?;
        let joint = axis_joint(
            JointAxesMask::LOCKED_REVOLUTE_AXES,
            JointAxis::AngX,
            anchors,
            axes,
            spring,
            limit,
        );
        Some(self.insert_joint(body1, body2, joint))
    }

    /// Hinge from body-local anchors and axes.
    #[allow(clippy::too_many_arguments)]
    pub fn add_revolute_joint_local(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        local_anchor1: Point<f32>,
        local_anchor2: Point<f32>,
        local_axis1: UnitVector<f32>,
        local_axis2: UnitVector<f32>,
        spring: Option<SpringDamper>,
        limit: Option<LimitMotor>,
    ) -> ImpulseJointHandle {
        let joint = axis_joint(
            JointAxesMask::LOCKED_REVOLUTE_AXES,
            JointAxis::AngX,
            (local_anchor1, local_anchor2),
            (local_axis1, local_axis2),
            spring,
            limit,
        );
        self.insert_joint(body1, body2, joint)
    }

    /// Slider along a world-space `axis` through `anchor`.
    ///
    /// `spring` pulls the slider back to its rest offset; `limit` bounds the offset (meters).
    pub fn add_prismatic_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
        axis: UnitVector<f32>,
        spring: Option<SpringDamper>,
        limit: Option<LimitMotor>,
    ) -> Option<ImpulseJointHandle> {
        let anchors = local_anchors(self, body1, body2, anchor)?;
        let axes = local_axes(self, body1, body2, axis)?;
        let joint = axis_joint(
            JointAxesMask::LOCKED_PRISMATIC_AXES,
            JointAxis::LinX,
            anchors,
            axes,
            spring,
            limit,
        );
        Some(self.insert_joint(body1, body2, joint))
    }

    /// Slider that can also spin around its world-space `axis` through `anchor`.
    ///
    /// Rotation about the axis takes `rot_spring`/`rot_limit` (radians), translation along it
    /// `lin_spring`/`lin_limit` (meters).
    #[allow(clippy::too_many_arguments)]
    pub fn add_cylindrical_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
        axis: UnitVector<f32>,
        rot_spring: Option<SpringDamper>,
        rot_limit: Option<LimitMotor>,
        lin_spring: Option<SpringDamper>,
        lin_limit: Option<LimitMotor>,
    ) -> Option<ImpulseJointHandle> {
        let (anchor1, anchor2) = local_anchors(self, body1, body2, anchor)?;
        let (axis1, axis2) = local_axes(self, body1, body2, axis)?;
        let builder = GenericJointBuilder::new(LOCKED_CYLINDRICAL_AXES)
            .local_anchor1(anchor1)
            .local_anchor2(anchor2)
            .local_axis1(axis1)
            .local_axis2(axis2);
        let builder = free_axis(builder, JointAxis::AngX, rot_spring, rot_limit);
        let builder = free_axis(builder, JointAxis::LinX, lin_spring, lin_limit);
        Some(self.insert_joint(body1, body2, builder.build()))
    }

    /// Two hinges in series: body1 turns around `axis1`, body2 around `axis2`, and twisting
    /// around their common normal is blocked.
    ///
    /// The first free axis (`spring1`/`limit1`) is `axis1`, the second one `axis2` made
    /// orthogonal to it. Returns `None` when the axes are parallel.
    #[allow(clippy::too_many_arguments)]
    pub fn add_universal_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
        axis1: UnitVector<f32>,
        axis2: UnitVector<f32>,
        spring1: Option<SpringDamper>,
        limit1: Option<LimitMotor>,
        spring2: Option<SpringDamper>,
        limit2: Option<LimitMotor>,
    ) -> Option<ImpulseJointHandle> {
        let normal = UnitVector::try_new(axis1.cross(&*axis2), f32::EPSILON)?;
        let frame = joint_frame(anchor, normal, axis1)?;
        let (frame1, frame2) = local_frames(self, body1, body2, frame)?;
        let locked = JointAxesMask::LIN_AXES | JointAxesMask::ANG_X;

        let builder = GenericJointBuilder::new(locked)
            .local_frame1(frame1)
            .local_frame2(frame2);
        let builder = free_axis(builder, JointAxis::AngY, spring1, limit1);
        let builder = free_axis(builder, JointAxis::AngZ, spring2, limit2);
        Some(self.insert_joint(body1, body2, builder.build()))
    }

    /// Ball-and-socket joint with a bounded cone, for limbs.
    ///
    /// Twisting happens around `twist_axis`; swinging is bounded by `max_swing1` around
    /// `swing_axis` and `max_swing2` around the third axis (radians, a half-turn or more means
    /// unbounded). `swing_spring` pulls both swing axes back to rest. Returns `None` when the
    /// axes are parallel.
    #[allow(clippy::too_many_arguments)]
    pub fn add_ragdoll_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor: Point<f32>,
        twist_axis: UnitVector<f32>,
        swing_axis: UnitVector<f32>,
        swing_spring: Option<SpringDamper>,
        max_swing1: f32,
        max_swing2: f32,
        twist_spring: Option<SpringDamper>,
        twist_limit: Option<LimitMotor>,
    ) -> Option<ImpulseJointHandle> {
        let frame = joint_frame(anchor, twist_axis, swing_axis)?;
        let (frame1, frame2) = local_frames(self, body1, body2, frame)?;

        let mut builder = GenericJointBuilder::new(JointAxesMask::LOCKED_SPHERICAL_AXES)
            .local_frame1(frame1)
            .local_frame2(frame2);
        builder = free_axis(builder, JointAxis::AngX, twist_spring, twist_limit);
        for (axis, max_swing) in [(JointAxis::AngY, max_swing1), (JointAxis::AngZ, max_swing2)] {
            let limit = (max_swing < PI).then(|| LimitMotor::limits(-max_swing, max_swing));
            builder = free_axis(builder, axis, swing_spring, limit);
        }
        Some(self.insert_joint(body1, body2, builder.build()))
    }

    /// Soft point-to-point joint: the anchors are pulled together by a spring-damper on every
    /// linear axis while rotation stays free.
    pub fn add_spring_point_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        local_anchor1: Point<f32>,
        local_anchor2: Point<f32>,
        spring: SpringDamper,
        contacts_enabled: bool,
    ) -> ImpulseJointHandle {
        let mut builder = GenericJointBuilder::new(JointAxesMask::empty())
            .local_anchor1(local_anchor1)
            .local_anchor2(local_anchor2)
            .contacts_enabled(contacts_enabled);

        for axis in [JointAxis::LinX, JointAxis::LinY, JointAxis::LinZ] {
            builder = builder
                .motor_model(axis, MotorModel::AccelerationBased)
                .motor_position(axis, 0.0, spring.stiffness(), spring.damping());
        }

        self.insert_joint(body1, body2, builder.build())
    }
}
