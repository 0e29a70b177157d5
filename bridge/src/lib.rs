pub mod binding;
pub mod bridge;
pub mod constants;
pub mod debug_draw;
pub mod drag;
pub mod error;
pub mod joints;
pub mod shape;
pub mod stepper;
pub mod transform;
pub mod world;

pub use binding::{Binding, BodyBinding, BodyKind, BodyRegistry, MeshDesc, MeshId, MeshSource};
pub use bridge::PhysicsBridge;
pub use constants::{
    DRAG_PLANE_SIZE, DRAG_RAY_LENGTH, DRAG_SPRING_DAMPING_RATIO, DRAG_SPRING_FREQUENCY,
    FIXED_TIMESTEP, FRAME_RATE, GRAVITY, INSTANCE_STRIDE, TICK_INTERVAL,
};
pub use debug_draw::{DebugDraw, DebugDrawBuffers, DebugDrawMode};
pub use drag::{ActiveDrag, DragPlane, MouseDrag, PointerScene};
pub use error::BridgeError;
pub use joints::{LimitMotor, SpringDamper};
pub use shape::{GeometryDesc, ShapeDescriptor, ShapeMapper, ShapeRegistry};
pub use stepper::SceneSink;
pub use transform::{compose_matrix, instance_translation, pixel_to_ndc};
pub use world::{BridgeConfig, PhysicsWorld, RayHit, rapier3d};
