//! Pose helpers shared by the stepper and the binding code.
//!
//! Instance transform buffers hold one column-major 4x4 matrix per instance:
//!
//! ```text
//! [ 0  4  8 12 ]     [ r00 r01 r02 px ]
//! [ 1  5  9 13 ]  =  [ r10 r11 r12 py ]
//! [ 2  6 10 14 ]     [ r20 r21 r22 pz ]
//! [ 3  7 11 15 ]     [  0   0   0   1 ]
//! ```

use rapier3d::prelude::*;

use crate::constants::{INSTANCE_STRIDE, INSTANCE_TRANSLATION_OFFSET};

/// Write the matrix for `position` and unit quaternion `rotation` into
/// `out[offset..offset + 16]`.
///
/// Panics if `out` is too short.
pub fn compose_matrix(
    position: &Vector<f32>,
    rotation: &Rotation<f32>,
    out: &mut [f32],
    offset: usize,
) {
    let (x, y, z, w) = (rotation.i, rotation.j, rotation.k, rotation.w);
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);

    let m = &mut out[offset..offset + INSTANCE_STRIDE];

    m[0] = 1.0 - (yy + zz);
    m[1] = xy + wz;
    m[2] = xz - wy;
    m[3] = 0.0;

    m[4] = xy - wz;
    m[5] = 1.0 - (xx + zz);
    m[6] = yz + wx;
    m[7] = 0.0;

    m[8] = xz + wy;
    m[9] = yz - wx;
    m[10] = 1.0 - (xx + yy);
    m[11] = 0.0;

    m[12] = position.x;
    m[13] = position.y;
    m[14] = position.z;
    m[15] = 1.0;
}

/// Read the translation of instance `index` out of a flat instance buffer.
#[inline]
pub fn instance_translation(matrices: &[f32], index: usize) -> Vector<f32> {
    let at = index * INSTANCE_STRIDE + INSTANCE_TRANSLATION_OFFSET;
    vector![matrices[at], matrices[at + 1], matrices[at + 2]]
}

/// Normalized device coordinates for a pixel position inside a `width` x `height` viewport.
///
/// X grows right and Y grows up, both in `[-1, 1]`.
#[inline]
pub fn pixel_to_ndc(x: f32, y: f32, width: f32, height: f32) -> [f32; 2] {
    [(x / width) * 2.0 - 1.0, -(y / height) * 2.0 + 1.0]
}
