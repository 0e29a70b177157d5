use std::time::Duration;

/// Rate, in Hz, at which the stepper is expected to be driven.
pub const FRAME_RATE: f32 = 60.0;

/// Simulated time advanced by a single stepper tick (seconds).
///
/// The world always advances by exactly this amount, regardless of how late the
/// host timer fired.
pub const FIXED_TIMESTEP: f32 = 1.0 / FRAME_RATE;

/// Host-side timer period matching [`FIXED_TIMESTEP`].
pub const TICK_INTERVAL: Duration = Duration::from_nanos(16_666_667);

/// Default world gravity in m/s², pointing down -Y.
pub const GRAVITY: [f32; 3] = [0.0, -9.8, 0.0];

/// Length of the physics ray cast fired on pointer-down (meters).
pub const DRAG_RAY_LENGTH: f32 = 500.0;

/// Side length of the invisible plane used to project pointer motion while dragging.
pub const DRAG_PLANE_SIZE: f32 = 1000.0;

/// Natural frequency (Hz) of the soft constraint pulling a dragged body.
pub const DRAG_SPRING_FREQUENCY: f32 = 1.0;

/// Damping ratio of the soft constraint pulling a dragged body.
pub const DRAG_SPRING_DAMPING_RATIO: f32 = 1.0;

/// Half-extent used for a box axis whose size is not specified.
pub const DEFAULT_BOX_HALF_EXTENT: f32 = 0.5;

/// Radius used for a sphere whose radius is not specified.
pub const DEFAULT_SPHERE_RADIUS: f32 = 1.0;

/// Floats per instance in an instance transform buffer (one 4x4 matrix).
pub const INSTANCE_STRIDE: usize = 16;

/// Offset of the translation inside one instance block.
pub const INSTANCE_TRANSLATION_OFFSET: usize = 12;
