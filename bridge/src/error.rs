use snafu::Snafu;

use crate::binding::MeshId;

/// Recoverable errors reported back to bridge callers.
///
/// Unsupported geometry, ray misses and hits on static bodies are not errors; they are
/// reported as `None`/`false` by the operations concerned.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("mesh {mesh} has no dynamic body bound to it"))]
    UnknownMesh { mesh: MeshId },
    #[snafu(display("mesh {mesh} has {count} instances, index {index} is out of range"))]
    InstanceOutOfRange {
        mesh: MeshId,
        index: usize,
        count: usize,
    },
    #[snafu(display("rigid body no longer exists in the world"))]
    UnknownBody,
}
