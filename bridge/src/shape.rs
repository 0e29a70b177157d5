//! Mapping from render geometry to physics collision shapes.
//!
//! Render-side geometry is described by [`GeometryDesc`]. Built-in kinds (box, sphere,
//! icosahedron) are resolved directly; any other kind goes through the mappers registered
//! on a [`ShapeRegistry`]. Kinds nobody knows about resolve to `None` and are skipped.

use std::collections::BTreeMap;
use std::fmt;

use rapier3d::prelude::*;

use crate::constants::{DEFAULT_BOX_HALF_EXTENT, DEFAULT_SPHERE_RADIUS};

/// Render geometry as seen by the bridge.
///
/// Dimensions are the full sizes used by the render side (box width, not half-width).
/// Missing dimensions fall back to the renderer's defaults.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryDesc {
    Box {
        width: Option<f32>,
        height: Option<f32>,
        depth: Option<f32>,
    },
    Sphere {
        radius: Option<f32>,
    },
    /// Treated as a sphere of the same radius.
    Icosahedron {
        radius: Option<f32>,
    },
    /// Host-specific geometry, resolved through [`ShapeRegistry::register`].
    Other {
        kind: String,
        params: BTreeMap<String, f32>,
    },
}

impl GeometryDesc {
    /// Box with all dimensions given.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::Box {
            width: Some(width),
            height: Some(height),
            depth: Some(depth),
        }
    }

    /// Sphere with the given radius.
    pub fn sphere(radius: f32) -> Self {
        Self::Sphere {
            radius: Some(radius),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Box { .. } => "box",
            Self::Sphere { .. } => "sphere",
            Self::Icosahedron { .. } => "icosahedron",
            Self::Other { kind, .. } => kind,
        }
    }
}

/// Collision shape attached to a bridged rigid body.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeDescriptor {
    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vector<f32> },

    /// Sphere/ball (meters).
    Ball { radius: f32 },

    /// Y-aligned capsule (meters).
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },

    /// Y-aligned cone (meters).
    ConeY { radius: f32, half_height: f32 },
}

impl ShapeDescriptor {
    /// Build a collider for this shape.
    ///
    /// `mass` is only applied when positive; static bodies keep the default density.
    pub fn collider(&self, mass: f32) -> Collider {
        let builder = match *self {
            Self::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            Self::Ball { radius } => ColliderBuilder::ball(radius),
            Self::CapsuleY {
                radius,
                half_height,
            } => ColliderBuilder::capsule_y(half_height, radius),
            Self::CylinderY {
                radius,
                half_height,
            } => ColliderBuilder::cylinder(half_height, radius),
            Self::ConeY {
                radius,
                half_height,
            } => ColliderBuilder::cone(half_height, radius),
        };

        if mass > 0.0 {
            builder.mass(mass).build()
        } else {
            builder.build()
        }
    }
}

/// Resolves a host-specific geometry kind into a shape.
pub type ShapeMapper = Box<dyn Fn(&BTreeMap<String, f32>) -> Option<ShapeDescriptor> + Send + Sync>;

/// Geometry-to-shape resolver with a registration hook for extra geometry kinds.
#[derive(Default)]
pub struct ShapeRegistry {
    mappers: BTreeMap<String, ShapeMapper>,
}

impl fmt::Debug for ShapeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeRegistry")
            .field("kinds", &self.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the mapper for `GeometryDesc::Other { kind, .. }`.
    pub fn register<F>(&mut self, kind: impl Into<String>, mapper: F)
    where
        F: Fn(&BTreeMap<String, f32>) -> Option<ShapeDescriptor> + Send + Sync + 'static,
    {
        self.mappers.insert(kind.into(), Box::new(mapper));
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.mappers.contains_key(kind)
    }

    /// Resolve a geometry into a shape, or `None` if the kind is not supported.
    pub fn shape_for(&self, geometry: &GeometryDesc) -> Option<ShapeDescriptor> {
        match geometry {
            GeometryDesc::Box {
                width,
                height,
                depth,
            } => {
                let half = |size: &Option<f32>| size.map_or(DEFAULT_BOX_HALF_EXTENT, |s| s / 2.0);
                Some(ShapeDescriptor::Cuboid {
                    half_extents: vector![half(width), half(height), half(depth)],
                })
            }
            GeometryDesc::Sphere { radius } | GeometryDesc::Icosahedron { radius } => {
                Some(ShapeDescriptor::Ball {
                    radius: radius.unwrap_or(DEFAULT_SPHERE_RADIUS),
                })
            }
            GeometryDesc::Other { kind, params } => {
                let shape = self.mappers.get(kind).and_then(|mapper| mapper(params));
                if shape.is_none() {
                    log::debug!("no collision shape for geometry kind `{kind}`, skipping");
                }
                shape
            }
        }
    }
}
