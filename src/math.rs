//! Rotation and bounding-box helpers shared by the controls, the meshes and the lights.

use crate::resource::GpuGeometry;
use glamx::{Quat, Vec3};

/// The world right axis.
pub const WORLD_RIGHT: Vec3 = Vec3::X;
/// The world up axis.
pub const WORLD_UP: Vec3 = Vec3::Y;
/// The world forward axis used to build roll rotations.
pub const WORLD_FORWARD: Vec3 = Vec3::Z;

/// Size of the box a freshly loaded model is fitted into.
pub const MAX_MODEL_SIZE: Vec3 = Vec3::splat(2.0);
/// Lower bound of the auto-fit scale.
pub const MIN_SCALE: f32 = 0.001;

/// Rotation of `pitch` radians around the world right axis.
pub fn pitch_quat(pitch: f32) -> Quat {
    Quat::from_axis_angle(WORLD_RIGHT, pitch)
}

/// Pitch then yaw.
///
/// With `local` set, the yaw axis is the pitched up vector instead of the world up axis.
pub fn pitch_yaw_quat(pitch: f32, yaw: f32, local: bool) -> Quat {
    let pitch_q = pitch_quat(pitch);
    let axis = if local {
        (pitch_q * WORLD_UP).normalize()
    } else {
        WORLD_UP
    };
    Quat::from_axis_angle(axis, yaw) * pitch_q
}

/// Pitch, yaw, then roll, each applied about the axes produced by the previous rotations
/// when `local` is set.
///
/// The three angles do not commute: swapping any two of them yields a different rotation.
pub fn pitch_yaw_roll_quat(pitch: f32, yaw: f32, roll: f32, local: bool) -> Quat {
    let pitch_yaw = pitch_yaw_quat(pitch, yaw, local);
    let axis = if local {
        (pitch_yaw * WORLD_FORWARD).normalize()
    } else {
        WORLD_FORWARD
    };
    Quat::from_axis_angle(axis, roll) * pitch_yaw
}

/// Rotates the normalized `v` by the given pitch and yaw.
pub fn rotate_vector(v: Vec3, pitch: f32, yaw: f32, local: bool) -> Vec3 {
    pitch_yaw_quat(pitch, yaw, local) * v.normalize()
}

/// Axis-aligned bounds of every position of every piece.
///
/// Returns `None` if no piece has positions.
pub fn compute_aabb(model: &[GpuGeometry]) -> Option<(Vec3, Vec3)> {
    let mut bounds: Option<(Vec3, Vec3)> = None;

    for piece in model {
        let Some(vertices) = piece.buffer().vertices() else {
            continue;
        };

        for v in vertices {
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(*v), max.max(*v)),
                None => (*v, *v),
            });
        }
    }

    bounds
}

/// Center of the model bounding box, or the origin for an empty model.
pub fn compute_center(model: &[GpuGeometry]) -> Vec3 {
    compute_aabb(model)
        .map(|(min, max)| (min + max) / 2.0)
        .unwrap_or(Vec3::ZERO)
}

/// Uniform scale that fits the model bounding box into `max_size`.
///
/// Never returns less than [`MIN_SCALE`]. A degenerate `max_size` or an empty model yields `1.0`.
pub fn compute_scale(model: &[GpuGeometry], max_size: Vec3) -> f32 {
    if max_size.min_element() <= 0.0 {
        debug_assert!(false, "the fitting box must have a positive size");
        return 1.0;
    }

    let Some((min, max)) = compute_aabb(model) else {
        return 1.0;
    };

    let ratios = (max - min) / max_size;
    let max_ratio = ratios.max_element();

    if max_ratio <= 0.0 {
        return 1.0;
    }

    (1.0 / max_ratio).max(MIN_SCALE)
}
