//! Debug geometry of the physics world.
//!
//! Rapier's `DebugRenderPipeline` emits wireframe lines through [`DebugRenderBackend`];
//! [`DebugDrawBuffers`] collects them as flat position/color arrays ready to be uploaded by
//! the host. With [`DebugDrawMode::Solid`] cuboid and ball colliders are additionally
//! tessellated into shaded triangles.
//!
//! Buffers are rebuilt every step: cleared before the world advances, filled after, then
//! published as the latest [`DebugDrawBuffers`] snapshot.

use rapier3d::prelude::*;

use crate::world::PhysicsWorld;

/// Subdivisions used when tessellating balls for solid debug draw.
const BALL_SUBDIVISIONS: u32 = 12;

const STATIC_COLOR: [f32; 3] = [0.5, 0.5, 0.5];
const DYNAMIC_COLOR: [f32; 3] = [1.0, 0.55, 0.1];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebugDrawMode {
    /// Wireframe lines only.
    #[default]
    Lines,
    /// Wireframe lines plus solid triangles for cuboids and balls.
    Solid,
}

/// Per-frame debug geometry.
///
/// Each line contributes two positions and two colors; each triangle three positions,
/// three normals and three colors. Colors are sRGB, as produced from rapier's HSL colors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DebugDrawBuffers {
    pub line_positions: Vec<[f32; 3]>,
    pub line_colors: Vec<[f32; 3]>,
    pub triangle_positions: Vec<[f32; 3]>,
    pub triangle_normals: Vec<[f32; 3]>,
    pub triangle_colors: Vec<[f32; 3]>,
}

impl DebugDrawBuffers {
    pub fn line(&mut self, a: Point<f32>, b: Point<f32>, color: [f32; 3]) {
        self.line_positions.push(a.into());
        self.line_positions.push(b.into());
        self.line_colors.extend([color, color]);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn triangle(
        &mut self,
        v1: Point<f32>,
        v2: Point<f32>,
        v3: Point<f32>,
        n1: Vector<f32>,
        n2: Vector<f32>,
        n3: Vector<f32>,
        color: [f32; 3],
    ) {
        for (v, n) in [(v1, n1), (v2, n2), (v3, n3)] {
            self.triangle_positions.push(v.into());
            self.triangle_normals.push(n.into());
        }
        self.triangle_colors.extend([color, color, color]);
    }

    pub fn clear(&mut self) {
        self.line_positions.clear();
        self.line_colors.clear();
        self.triangle_positions.clear();
        self.triangle_normals.clear();
        self.triangle_colors.clear();
    }

    pub fn line_count(&self) -> usize {
        self.line_positions.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.line_positions.is_empty() && self.triangle_positions.is_empty()
    }
}

impl DebugRenderBackend for DebugDrawBuffers {
    fn draw_line(
        &mut self,
        _: DebugRenderObject,
        a: Point<Real>,
        b: Point<Real>,
        color: [f32; 4],
    ) {
        self.line(a, b, hsl_to_rgb(color));
    }
}

/// Rapier debug colors are HSLA with hue in degrees.
fn hsl_to_rgb([h, s, l, _]: [f32; 4]) -> [f32; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    [r + m, g + m, b + m]
}

/// Debug renderer attached to a bridge.
pub struct DebugDraw {
    mode: DebugDrawMode,
    pipeline: DebugRenderPipeline,
    buffers: DebugDrawBuffers,
    latest: DebugDrawBuffers,
}

impl DebugDraw {
    pub fn new(mode: DebugDrawMode) -> Self {
        Self {
            mode,
            pipeline: DebugRenderPipeline::default(),
            buffers: DebugDrawBuffers::default(),
            latest: DebugDrawBuffers::default(),
        }
    }

    pub fn mode(&self) -> DebugDrawMode {
        self.mode
    }

    /// Drop whatever was collected for the previous step.
    pub fn clear_buffers(&mut self) {
        self.buffers.clear();
    }

    /// Draw the current world state and publish it as the latest geometry.
    pub fn generate(&mut self, world: &PhysicsWorld) {
        self.pipeline.render(
            &mut self.buffers,
            &world.bodies,
            &world.colliders,
            &world.impulse_joints,
            &world.multibody_joints,
            &world.narrow_phase,
        );

        if self.mode == DebugDrawMode::Solid {
            for (_, collider) in world.colliders.iter() {
                let dynamic = collider
                    .parent()
                    .is_some_and(|parent| world.is_dynamic(parent));
                let color = if dynamic { DYNAMIC_COLOR } else { STATIC_COLOR };
                tessellate(&mut self.buffers, collider, color);
            }
        }

        std::mem::swap(&mut self.buffers, &mut self.latest);
    }

    /// Geometry produced by the last [`DebugDraw::generate`].
    pub fn geometry(&self) -> &DebugDrawBuffers {
        &self.latest
    }
}

fn tessellate(buffers: &mut DebugDrawBuffers, collider: &Collider, color: [f32; 3]) {
    let shape = collider.shape();
    let (vertices, indices) = if let Some(cuboid) = shape.as_cuboid() {
        cuboid.to_trimesh()
    } else if let Some(ball) = shape.as_ball() {
        ball.to_trimesh(BALL_SUBDIVISIONS, BALL_SUBDIVISIONS / 2)
    } else {
        return;
    };

    let pose = collider.position();
    for [a, b, c] in indices {
        let v1 = pose * vertices[a as usize];
        let v2 = pose * vertices[b as usize];
        let v3 = pose * vertices[c as usize];
        let n = (v2 - v1)
            .cross(&(v3 - v1))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector::y);
        buffers.triangle(v1, v2, v3, n, n, n, color);
    }
}
