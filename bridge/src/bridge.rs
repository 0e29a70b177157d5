//! The bridge context: one physics world plus everything needed to keep a render scene in
//! sync with it.

use crate::binding::{Binding, BodyRegistry, MeshId};
use crate::debug_draw::{DebugDraw, DebugDrawBuffers, DebugDrawMode};
use crate::shape::ShapeRegistry;
use crate::world::{BridgeConfig, PhysicsWorld};

pub struct PhysicsBridge {
    pub world: PhysicsWorld,
    /// Geometry kind -> collision shape mappers.
    pub shapes: ShapeRegistry,
    /// Dynamic bodies whose poses are copied back to meshes every tick.
    pub registry: BodyRegistry,
    pub(crate) debug: Option<DebugDraw>,
    /// Set by the first tick; stepping starts with the second one.
    pub(crate) primed: bool,
}

impl Default for PhysicsBridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl PhysicsBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            world: PhysicsWorld::new(config),
            shapes: ShapeRegistry::new(),
            registry: BodyRegistry::new(),
            debug: None,
            primed: false,
        }
    }

    /// Start producing debug geometry on every step.
    ///
    /// Attaching again replaces the previous renderer (and its mode).
    pub fn attach_debug_draw(&mut self, mode: DebugDrawMode) {
        log::info!("debug draw attached ({mode:?})");
        self.debug = Some(DebugDraw::new(mode));
    }

    pub fn detach_debug_draw(&mut self) {
        if self.debug.take().is_some() {
            log::info!("debug draw detached");
        }
    }

    pub fn is_debug_attached(&self) -> bool {
        self.debug.is_some()
    }

    pub fn debug_mode(&self) -> Option<DebugDrawMode> {
        self.debug.as_ref().map(DebugDraw::mode)
    }

    /// Debug geometry of the last step, if debug draw is attached.
    ///
    /// Empty until the first step after attaching.
    pub fn debug_geometry(&self) -> Option<&DebugDrawBuffers> {
        self.debug.as_ref().map(DebugDraw::geometry)
    }

    /// Whether the first tick already happened.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Remove every bridged mesh with its bodies and return to the pre-first-tick state.
    ///
    /// Static bodies are not tracked and stay in the world.
    pub fn dispose(&mut self) -> Vec<(MeshId, Binding)> {
        let meshes: Vec<MeshId> = self.registry.iter().map(|(mesh, _)| mesh).collect();
        let removed: Vec<_> = meshes
            .into_iter()
            .filter_map(|mesh| self.remove_mesh(mesh).map(|binding| (mesh, binding)))
            .collect();

        self.primed = false;
        self.detach_debug_draw();
        log::debug!("bridge disposed, {} meshes released", removed.len());
        removed
    }
}
