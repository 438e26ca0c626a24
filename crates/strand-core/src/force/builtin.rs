//! Built-in force kinds and the fixed directional drag.
//!
//! All functions here work on raw vectors; decoding records and moving
//! between batch-local and world space is done by the layout.

use glam::{DVec3, Vec3};
use noise::{NoiseFn, Perlin};

use super::{FieldType, ForceKind, ForceSchema};
use crate::utils::{safe_normalize, FALLBACK_AXIS};

/// Perpendicular drag coefficient, before scaling by the batch resistance.
pub const DRAG_PERPENDICULAR: f32 = 1.0;
/// Drag along the strand tangent.
pub const DRAG_PARALLEL: f32 = 0.6;

/// Fixed spatial scale of the curl noise lookup.
pub const CURL_BASE_SCALE: f32 = 0.3;
/// Offset between the two gradient samples of the curl noise.
pub const CURL_SECOND_SAMPLE_OFFSET: Vec3 = Vec3::new(31.341, -17.873, 47.113);
const GRADIENT_STEP: f64 = 1e-3;

/// Canonical schema of a built-in kind. Custom kinds have none.
pub fn schema(kind: ForceKind) -> ForceSchema {
    match kind {
        ForceKind::Gravity => ForceSchema::new().with_field("acceleration", FieldType::Vec3),
        ForceKind::CurlNoise => ForceSchema::new()
            .with_field("strength", FieldType::Scalar)
            .with_field("speed", FieldType::Scalar)
            .with_field("scale", FieldType::Scalar),
        ForceKind::Point => ForceSchema::new()
            .with_field("position", FieldType::Vec3)
            .with_field("strength", FieldType::Scalar)
            .with_field("falloff_distance", FieldType::Scalar)
            .with_field("falloff_power", FieldType::Scalar),
        ForceKind::Vortex => ForceSchema::new()
            .with_field("position", FieldType::Vec3)
            .with_field("axis", FieldType::Vec3)
            .with_field("strength", FieldType::Scalar)
            .with_field("falloff_distance", FieldType::Scalar)
            .with_field("falloff_power", FieldType::Scalar),
        ForceKind::Custom(_) => ForceSchema::new(),
    }
}

fn falloff(dist: f32, falloff_distance: f32, falloff_power: f32) -> f32 {
    let t = (1. - dist / falloff_distance).clamp(0., 1.);
    t.powf(falloff_power)
}

/// Attraction towards `position` (repulsion for negative strength).
pub fn point_force(
    p: Vec3,
    position: Vec3,
    strength: f32,
    falloff_distance: f32,
    falloff_power: f32,
) -> Vec3 {
    let dir = position - p;
    let dist = dir.length();
    if dist <= 0. {
        return Vec3::ZERO;
    }
    dir / dist * falloff(dist, falloff_distance, falloff_power) * strength
}

/// Swirl around the line through `position` along `axis`.
pub fn vortex_force(
    p: Vec3,
    position: Vec3,
    axis: Vec3,
    strength: f32,
    falloff_distance: f32,
    falloff_power: f32,
) -> Vec3 {
    let axis = safe_normalize(axis, FALLBACK_AXIS);
    let relative = p - position;
    let radial = relative - axis * relative.dot(axis);
    let dist = radial.length();
    if dist <= 0. {
        return Vec3::ZERO;
    }
    let swirl = safe_normalize(axis.cross(radial), Vec3::ZERO);
    swirl * strength * falloff(dist, falloff_distance, falloff_power)
}

/// Central-difference gradient of 3D Perlin noise.
pub fn noise_gradient(noise: &Perlin, p: Vec3) -> Vec3 {
    let p = p.as_dvec3();
    let sample = |d: DVec3| noise.get((p + d).to_array());
    let h = GRADIENT_STEP;
    let g = DVec3::new(
        sample(DVec3::X * h) - sample(DVec3::NEG_X * h),
        sample(DVec3::Y * h) - sample(DVec3::NEG_Y * h),
        sample(DVec3::Z * h) - sample(DVec3::NEG_Z * h),
    ) / (2. * h);
    g.as_vec3()
}

pub fn curl_noise(
    noise: &Perlin,
    p: Vec3,
    time: f32,
    strength: f32,
    speed: f32,
    scale: f32,
) -> Vec3 {
    let q = p * CURL_BASE_SCALE * scale + Vec3::splat(time * speed);
    let g1 = noise_gradient(noise, q);
    let g2 = noise_gradient(noise, q + CURL_SECOND_SAMPLE_OFFSET);
    safe_normalize(g1.cross(g2), Vec3::ZERO) * strength
}

/// Damping split along and across the local strand tangent.
pub fn directional_drag(velocity: Vec3, tangent: Vec3, resistance: f32) -> Vec3 {
    let parallel = tangent * velocity.dot(tangent);
    let perpendicular = velocity - parallel;
    -(parallel * DRAG_PARALLEL + perpendicular * DRAG_PERPENDICULAR) * resistance
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn point_falloff() {
        let f = point_force(Vec3::ZERO, Vec3::new(0., 0., 2.), 3., 4., 1.);
        // t = 1 - 2/4
        assert!((f - Vec3::new(0., 0., 1.5)).length() < 1e-6);

        let far = point_force(Vec3::ZERO, Vec3::new(0., 0., 5.), 3., 4., 1.);
        assert_eq!(far, Vec3::ZERO);

        let same = point_force(Vec3::ONE, Vec3::ONE, 3., 4., 1.);
        assert_eq!(same, Vec3::ZERO);
    }

    #[test]
    fn vortex_swirls_around_axis() {
        let f = vortex_force(Vec3::new(1., 5., 0.), Vec3::ZERO, Vec3::Y, 2., 2., 2.);
        // radial = +X, swirl = Y x X = -Z, magnitude = 2 * 0.5^2
        assert!((f - Vec3::new(0., 0., -0.5)).length() < 1e-6);

        let on_axis = vortex_force(Vec3::new(0., 3., 0.), Vec3::ZERO, Vec3::Y, 2., 2., 2.);
        assert_eq!(on_axis, Vec3::ZERO);
    }

    #[test]
    fn drag_is_anisotropic() {
        let along = directional_drag(Vec3::X, Vec3::X, 2.);
        let across = directional_drag(Vec3::Y, Vec3::X, 2.);
        assert!((along - Vec3::new(-1.2, 0., 0.)).length() < 1e-6);
        assert!((across - Vec3::new(0., -2., 0.)).length() < 1e-6);
    }

    #[test]
    fn curl_noise_is_bounded() {
        let noise = Perlin::new(7);
        for i in 0..20 {
            let p = Vec3::new(i as f32 * 0.37, 1.3, -0.4 * i as f32);
            let f = curl_noise(&noise, p, 0.5, 2., 1., 1.);
            assert!(f.is_finite());
            assert!(f.length() <= 2. + 1e-4);
        }
    }
}
