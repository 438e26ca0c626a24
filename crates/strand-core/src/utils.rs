use glam::Vec3;

/// Squared length under which a vector is treated as zero.
pub const NORMALIZE_EPSILON: f32 = 1e-12;

/// Fixed up-vector used when a direction cannot be computed.
pub const FALLBACK_AXIS: Vec3 = Vec3::Y;

pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let l2 = v.length_squared();
    if l2 < NORMALIZE_EPSILON || !l2.is_finite() {
        fallback
    } else {
        v / l2.sqrt()
    }
}

pub fn ease_out_cubic(t: f32) -> f32 {
    1. - (1. - t).powi(3)
}

/// Rodrigues' rotation of `v` around the unit vector `axis`.
pub fn rotate_about_axis(v: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    v * cos + axis.cross(v) * sin + axis * axis.dot(v) * (1. - cos)
}
