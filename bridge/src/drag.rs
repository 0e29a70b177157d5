//! Pointer-driven dragging of dynamic bodies.
//!
//! # Model
//! [`MouseDrag`] is a two-state machine, Idle and Dragging:
//! - pointer-down casts a physics ray from the camera. Hitting a dynamic body attaches it to a
//!   kinematic anchor body with a soft point-to-point joint, and an invisible plane is placed
//!   through the hit point, facing the camera.
//! - pointer-move projects the pointer onto that plane and moves the anchor there, so the
//!   spring pulls the body after the cursor.
//! - pointer-up removes the joint and the plane.
//!
//! Everything render-side (camera rays, the plane's scene resources, orbit controls) goes
//! through the [`PointerScene`] trait implemented by the host.

use rapier3d::prelude::*;

use crate::constants::{
    DRAG_PLANE_SIZE, DRAG_RAY_LENGTH, DRAG_SPRING_DAMPING_RATIO, DRAG_SPRING_FREQUENCY,
};
use crate::joints::SpringDamper;
use crate::transform::pixel_to_ndc;
use crate::world::PhysicsWorld;

/// Render-side services needed while dragging.
pub trait PointerScene {
    /// Scene resource backing a drag plane.
    type Plane;

    /// Viewport size in pixels (`[width, height]`).
    fn viewport_size(&self) -> [f32; 2];

    /// World-space ray through normalized device coordinates `ndc`.
    fn camera_ray(&self, ndc: [f32; 2]) -> Ray;

    /// World-space camera position.
    fn camera_position(&self) -> Point<f32>;

    /// Create the (invisible) scene object for a drag plane.
    fn spawn_drag_plane(&mut self, plane: &DragPlane) -> Self::Plane;

    /// Intersect `ray` with the drag plane. Defaults to the analytic plane.
    fn intersect_drag_plane(
        &self,
        _handle: &Self::Plane,
        plane: &DragPlane,
        ray: &Ray,
    ) -> Option<Point<f32>> {
        plane.intersect(ray)
    }

    /// Release the scene resources of a drag plane.
    fn dispose_drag_plane(&mut self, handle: Self::Plane);

    /// Enable or disable camera controls (orbit, pan...) that would fight the drag.
    fn set_controls_enabled(&mut self, enabled: bool);
}

/// Square plane used to turn 2D pointer motion into 3D positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragPlane {
    pub center: Point<f32>,
    pub normal: UnitVector<f32>,
    pub size: f32,
}

impl DragPlane {
    /// Plane through `center` whose normal points at `eye`.
    pub fn facing(center: Point<f32>, eye: Point<f32>, size: f32) -> Self {
        let normal = UnitVector::try_new(eye - center, f32::EPSILON).unwrap_or(Vector::z_axis());
        Self {
            center,
            normal,
            size,
        }
    }

    /// In-plane axes; the first one is horizontal whenever the normal is not vertical.
    fn tangents(&self) -> (Vector<f32>, Vector<f32>) {
        let u = Vector::y()
            .cross(&*self.normal)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector::x);
        let v = self.normal.cross(&u);
        (u, v)
    }

    /// Ray/plane intersection, bounded to the plane's square extent.
    pub fn intersect(&self, ray: &Ray) -> Option<Point<f32>> {
        let denom = ray.dir.dot(&*self.normal);
        if denom.abs() <= f32::EPSILON {
            return None;
        }
        let t = (self.center - ray.origin).dot(&*self.normal) / denom;
        if t < 0.0 {
            return None;
        }

        let hit = ray.point_at(t);
        let offset = hit - self.center;
        let (u, v) = self.tangents();
        let half = self.size / 2.0;
        (offset.dot(&u).abs() <= half && offset.dot(&v).abs() <= half).then_some(hit)
    }
}

/// An in-progress drag.
#[derive(Debug)]
pub struct ActiveDrag<P> {
    pub body: RigidBodyHandle,
    pub joint: ImpulseJointHandle,
    /// Hit point in the dragged body's local frame.
    pub local_anchor: Point<f32>,
    pub plane: DragPlane,
    handle: P,
}

#[derive(Debug)]
pub struct MouseDrag<P> {
    spring: SpringDamper,
    ray_length: f32,
    plane_size: f32,
    /// Kinematic body the joint pulls towards; created on the first drag.
    anchor: Option<RigidBodyHandle>,
    active: Option<ActiveDrag<P>>,
}

impl<P> Default for MouseDrag<P> {
    fn default() -> Self {
        Self::new(SpringDamper::new(
            DRAG_SPRING_FREQUENCY,
            DRAG_SPRING_DAMPING_RATIO,
        ))
    }
}

impl<P> MouseDrag<P> {
    pub fn new(spring: SpringDamper) -> Self {
        Self {
            spring,
            ray_length: DRAG_RAY_LENGTH,
            plane_size: DRAG_PLANE_SIZE,
            anchor: None,
            active: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveDrag<P>> {
        self.active.as_ref()
    }

    pub fn dragged_body(&self) -> Option<RigidBodyHandle> {
        self.active.as_ref().map(|drag| drag.body)
    }

    /// The kinematic body the dragged body is attached to.
    pub fn anchor_body(&self) -> Option<RigidBodyHandle> {
        self.anchor
    }

    fn pointer_ray<S>(scene: &S, x: f32, y: f32) -> Ray
    where
        S: PointerScene<Plane = P>,
    {
        let [width, height] = scene.viewport_size();
        scene.camera_ray(pixel_to_ndc(x, y, width, height))
    }

    fn place_anchor(&mut self, world: &mut PhysicsWorld, at: Point<f32>) -> RigidBodyHandle {
        if let Some(handle) = self.anchor {
            if let Some(body) = world.body_mut(handle) {
                body.set_translation(at.coords, true);
                return handle;
            }
        }

        let handle = world.add_anchor_body(
            RigidBodyBuilder::kinematic_position_based()
                .translation(at.coords)
                .build(),
        );
        self.anchor = Some(handle);
        handle
    }

    /// Start dragging the dynamic body under the pointer.
    ///
    /// Returns `false`, leaving everything untouched, when already dragging, when the ray
    /// hits nothing, or when the hit body is not dynamic.
    pub fn pointer_down<S>(
        &mut self,
        world: &mut PhysicsWorld,
        scene: &mut S,
        x: f32,
        y: f32,
    ) -> bool
    where
        S: PointerScene<Plane = P>,
    {
        if self.active.is_some() {
            return false;
        }

        let ray = Self::pointer_ray(scene, x, y);
        let Some(dir) = ray.dir.try_normalize(f32::EPSILON) else {
            return false;
        };
        let end = ray.origin + dir * self.ray_length;

        let Some(hit) = world.cast_ray_closest(ray.origin, end) else {
            return false;
        };
        let Some(body) = world.body(hit.body).filter(|b| b.is_dynamic()) else {
            log::debug!("pointer hit a non-dynamic body, not dragging");
            return false;
        };

        let local_anchor = body.position().inverse_transform_point(&hit.point);
        let anchor = self.place_anchor(world, hit.point);
        let joint = world.add_spring_point_joint(
            hit.body,
            anchor,
            local_anchor,
            Point::origin(),
            self.spring,
            false,
        );

        scene.set_controls_enabled(false);
        let plane = DragPlane::facing(hit.point, scene.camera_position(), self.plane_size);
        let handle = scene.spawn_drag_plane(&plane);

        log::debug!("drag started on {:?} at {:?}", hit.body, hit.point);
        self.active = Some(ActiveDrag {
            body: hit.body,
            joint,
            local_anchor,
            plane,
            handle,
        });
        true
    }

    /// Move the anchor to the pointer's projection on the drag plane.
    ///
    /// No-op while idle or when the pointer ray misses the plane. Returns whether the
    /// anchor moved.
    pub fn pointer_move<S>(&mut self, world: &mut PhysicsWorld, scene: &S, x: f32, y: f32) -> bool
    where
        S: PointerScene<Plane = P>,
    {
        let (Some(drag), Some(anchor)) = (self.active.as_ref(), self.anchor) else {
            return false;
        };

        let ray = Self::pointer_ray(scene, x, y);
        let Some(point) = scene.intersect_drag_plane(&drag.handle, &drag.plane, &ray) else {
            return false;
        };

        if world.set_body_translation(anchor, point.coords).is_err() {
            return false;
        }
        world.wake(drag.body);
        world.wake(anchor);
        true
    }

    /// Stop dragging: remove the joint, release the plane and give the camera back.
    ///
    /// Returns `false` when there was no drag in progress.
    pub fn pointer_up<S>(&mut self, world: &mut PhysicsWorld, scene: &mut S) -> bool
    where
        S: PointerScene<Plane = P>,
    {
        let Some(drag) = self.active.take() else {
            return false;
        };

        // The joint is already gone if its body was removed mid-drag.
        world.remove_joint(drag.joint);
        scene.dispose_drag_plane(drag.handle);
        scene.set_controls_enabled(true);

        log::debug!("drag released on {:?}", drag.body);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BridgeConfig;

    /// Orthographic camera looking down -Z from z = 20, covering [-10, 10]² over a
    /// 200x200 viewport.
    #[derive(Default)]
    struct FakeScene {
        controls_disabled: bool,
        next_plane: u32,
        live_planes: Vec<u32>,
        disposed: Vec<u32>,
    }

    impl PointerScene for FakeScene {
        type Plane = u32;

        fn viewport_size(&self) -> [f32; 2] {
            [200.0, 200.0]
        }

        fn camera_ray(&self, [x, y]: [f32; 2]) -> Ray {
            Ray::new(point![x * 10.0, y * 10.0, 20.0], -Vector::z())
        }

        fn camera_position(&self) -> Point<f32> {
            point![0.0, 0.0, 20.0]
        }

        fn spawn_drag_plane(&mut self, _plane: &DragPlane) -> u32 {
            self.next_plane += 1;
            self.live_planes.push(self.next_plane);
            self.next_plane
        }

        fn dispose_drag_plane(&mut self, handle: u32) {
            self.live_planes.retain(|p| *p != handle);
            self.disposed.push(handle);
        }

        fn set_controls_enabled(&mut self, enabled: bool) {
            self.controls_disabled = !enabled;
        }
    }

    fn world_with_ball(body: RigidBodyBuilder) -> (PhysicsWorld, RigidBodyHandle) {
        let mut world = PhysicsWorld::new(BridgeConfig::weightless());
        let handle = world.add_body(body.build(), ColliderBuilder::ball(1.0).build());
        // Queries only see bodies after a step has updated the broad-phase.
        world.step();
        (world, handle)
    }

    #[test]
    fn pointer_down_over_empty_space_does_nothing() {
        let (mut world, _) = world_with_ball(RigidBodyBuilder::dynamic());
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        assert!(!drag.pointer_down(&mut world, &mut scene, 5.0, 5.0));
        assert!(!drag.is_dragging());
        assert_eq!(world.joint_count(), 0);
        assert!(scene.live_planes.is_empty());
        assert!(!scene.controls_disabled);
        assert!(drag.anchor_body().is_none());
    }

    #[test]
    fn pointer_down_over_static_body_does_nothing() {
        let (mut world, _) = world_with_ball(RigidBodyBuilder::fixed());
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        assert!(!drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert!(!drag.is_dragging());
        assert_eq!(world.joint_count(), 0);
        assert!(scene.live_planes.is_empty());
        assert!(!scene.controls_disabled);
    }

    #[test]
    fn pointer_down_over_dynamic_body_starts_a_drag() {
        let (mut world, ball) = world_with_ball(RigidBodyBuilder::dynamic());
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        assert!(drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert_eq!(drag.dragged_body(), Some(ball));
        assert_eq!(world.joint_count(), 1);
        assert_eq!(scene.live_planes.len(), 1);
        assert!(scene.controls_disabled);

        let active = drag.active().unwrap();
        assert!((active.local_anchor - point![0.0, 0.0, 1.0]).norm() < 1.0e-3);
        assert!((active.plane.center - point![0.0, 0.0, 1.0]).norm() < 1.0e-3);
        assert!((active.plane.normal.into_inner() - Vector::z()).norm() < 1.0e-5);

        let anchor = world.body(drag.anchor_body().unwrap()).unwrap();
        assert!(anchor.is_kinematic());
        assert!((anchor.translation() - vector![0.0, 0.0, 1.0]).norm() < 1.0e-3);

        let joint = &world.impulse_joints.get(active.joint).unwrap().data;
        assert!(!joint.contacts_enabled);

        // A second press while dragging is ignored.
        assert!(!drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert_eq!(world.joint_count(), 1);
        assert_eq!(scene.live_planes.len(), 1);
    }

    #[test]
    fn local_anchor_accounts_for_body_rotation() {
        let (mut world, _) = world_with_ball(
            RigidBodyBuilder::dynamic()
                .translation(vector![2.0, 0.0, 0.0])
                .rotation(vector![0.0, std::f32::consts::FRAC_PI_2, 0.0]),
        );
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        // ndc (0.2, 0) -> x = 2
        assert!(drag.pointer_down(&mut world, &mut scene, 120.0, 100.0));

        // World +Z on a body turned a quarter around +Y is local -X.
        let local = drag.active().unwrap().local_anchor;
        assert!((local - point![-1.0, 0.0, 0.0]).norm() < 1.0e-3, "{local:?}");
    }

    #[test]
    fn pointer_move_drives_the_anchor_and_the_body_follows() {
        let (mut world, ball) = world_with_ball(RigidBodyBuilder::dynamic());
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        assert!(drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert!(drag.pointer_move(&mut world, &scene, 150.0, 100.0));

        let anchor = drag.anchor_body().unwrap();
        let at = *world.body(anchor).unwrap().translation();
        assert!((at - vector![5.0, 0.0, 1.0]).norm() < 1.0e-3, "{at:?}");

        for _ in 0..180 {
            world.step();
        }
        let x = world.body(ball).unwrap().translation().x;
        assert!(x > 3.0, "dragged body should follow the pointer, got x={x}");
    }

    #[test]
    fn pointer_move_while_idle_is_ignored() {
        let (mut world, _) = world_with_ball(RigidBodyBuilder::dynamic());
        let scene = FakeScene::default();
        let mut drag = MouseDrag::<u32>::default();

        assert!(!drag.pointer_move(&mut world, &scene, 150.0, 100.0));
        assert_eq!(world.bodies.len(), 1);
    }

    #[test]
    fn pointer_up_tears_the_drag_down() {
        let (mut world, _) = world_with_ball(RigidBodyBuilder::dynamic());
        let mut scene = FakeScene::default();
        let mut drag = MouseDrag::default();

        assert!(drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert!(drag.pointer_move(&mut world, &scene, 150.0, 100.0));
        assert!(drag.pointer_up(&mut world, &mut scene));

        assert!(!drag.is_dragging());
        assert_eq!(world.joint_count(), 0);
        assert!(scene.live_planes.is_empty());
        assert_eq!(scene.disposed, vec![1]);
        assert!(!scene.controls_disabled);

        // Idle release changes nothing.
        assert!(!drag.pointer_up(&mut world, &mut scene));
        assert_eq!(scene.disposed.len(), 1);

        // The anchor body is reused by the next drag.
        let anchor = drag.anchor_body();
        world.step();
        assert!(drag.pointer_down(&mut world, &mut scene, 100.0, 100.0));
        assert_eq!(drag.anchor_body(), anchor);
        assert_eq!(scene.live_planes, vec![2]);

        // Reused, but moved back from where the last drag left it to the new hit point.
        let at = *world.body(anchor.unwrap()).unwrap().translation();
        assert!((at - vector![0.0, 0.0, 1.0]).norm() < 1.0e-3, "{at:?}");
    }

    #[test]
    fn drag_plane_intersection_is_bounded() {
        let plane = DragPlane::facing(Point::origin(), point![0.0, 0.0, 10.0], 4.0);

        let inside = Ray::new(point![1.0, 1.0, 5.0], -Vector::z());
        assert_eq!(plane.intersect(&inside), Some(point![1.0, 1.0, 0.0]));

        let outside = Ray::new(point![3.0, 0.0, 5.0], -Vector::z());
        assert_eq!(plane.intersect(&outside), None);

        let parallel = Ray::new(point![0.0, 0.0, 5.0], Vector::x());
        assert_eq!(plane.intersect(&parallel), None);

        let behind = Ray::new(point![0.0, 0.0, 5.0], Vector::z());
        assert_eq!(plane.intersect(&behind), None);
    }
}
