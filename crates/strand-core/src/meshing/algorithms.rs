use std::f32::consts::TAU;

use glam::{Vec2, Vec3};

use crate::error::StrandError;
use crate::utils::{rotate_about_axis, safe_normalize, FALLBACK_AXIS};

/// `|dot(root normal, first tangent)|` above which the frame is re-seeded.
pub const PARALLEL_THRESHOLD: f32 = 0.99;
/// Consecutive tangents closer than this keep the previous frame.
pub const TRANSPORT_EPSILON: f32 = 1e-6;

pub const ROOT_COLOR: [f32; 4] = [0.35, 0.2, 0.12, 1.0];
pub const TIP_COLOR: [f32; 4] = [0.85, 0.75, 0.45, 1.0];

/// Forward differences, backward difference for the last point.
pub fn estimate_tangents(points: &[Vec3], out: &mut Vec<Vec3>) {
    out.clear();
    let n = points.len();
    if n < 2 {
        out.extend(points.iter().map(|_| FALLBACK_AXIS));
        return;
    }
    for i in 0..n {
        let d = if i + 1 < n {
            points[i + 1] - points[i]
        } else {
            points[i] - points[i - 1]
        };
        out.push(safe_normalize(d, FALLBACK_AXIS));
    }
}

/// Cubic Hermite point and derivative at `u`.
pub fn hermite(p0: Vec3, p1: Vec3, m0: Vec3, m1: Vec3, u: f32) -> (Vec3, Vec3) {
    let u2 = u * u;
    let u3 = u2 * u;
    let point = p0 * (2. * u3 - 3. * u2 + 1.)
        + m0 * (u3 - 2. * u2 + u)
        + p1 * (-2. * u3 + 3. * u2)
        + m1 * (u3 - u2);
    let derivative = p0 * (6. * u2 - 6. * u)
        + m0 * (3. * u2 - 4. * u + 1.)
        + p1 * (-6. * u2 + 6. * u)
        + m1 * (3. * u2 - 2. * u);
    (point, derivative)
}

/// `samples` points per segment at `u = s / samples`. The last control point
/// is not emitted.
pub fn resample(
    points: &[Vec3],
    tangents: &[Vec3],
    tangent_scale: f32,
    samples: usize,
    out_points: &mut Vec<Vec3>,
    out_tangents: &mut Vec<Vec3>,
) {
    out_points.clear();
    out_tangents.clear();
    for k in 0..points.len().saturating_sub(1) {
        let (p0, p1) = (points[k], points[k + 1]);
        let (m0, m1) = (tangents[k] * tangent_scale, tangents[k + 1] * tangent_scale);
        let chord = safe_normalize(p1 - p0, tangents[k]);
        for s in 0..samples {
            let u = s as f32 / samples as f32;
            let (p, d) = hermite(p0, p1, m0, m1, u);
            out_points.push(p);
            out_tangents.push(safe_normalize(d, chord));
        }
    }
}

/// Normal and binormal along a curve by parallel transport.
pub fn transport_frames(tangents: &[Vec3], root_normal: Vec3, out: &mut Vec<(Vec3, Vec3)>) {
    out.clear();
    let Some(&t0) = tangents.first() else {
        return;
    };

    let mut seed = root_normal;
    if seed.dot(t0).abs() > PARALLEL_THRESHOLD {
        seed = if Vec3::X.dot(t0).abs() > PARALLEL_THRESHOLD {
            Vec3::Z
        } else {
            Vec3::X
        };
    }
    let mut normal = safe_normalize(seed - t0 * seed.dot(t0), Vec3::X);
    let mut binormal = safe_normalize(t0.cross(normal), Vec3::Z);
    out.push((normal, binormal));

    for w in tangents.windows(2) {
        let (prev, t) = (w[0], w[1]);
        let axis = prev.cross(t);
        let len = axis.length();
        if len >= TRANSPORT_EPSILON {
            let angle = prev.dot(t).clamp(-1., 1.).acos();
            let axis = axis / len;
            normal = rotate_about_axis(normal, axis, angle);
            binormal = rotate_about_axis(binormal, axis, angle);
        }
        out.push((normal, binormal));
    }
}

/// Regular polygon lookup table of a tube cross-section.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossSection {
    lut: Vec<Vec2>,
}

impl CrossSection {
    pub fn new(points: usize) -> Result<Self, StrandError> {
        if points < 3 {
            return Err(StrandError::InvalidCrossSection { count: points });
        }
        let lut = (0..points)
            .map(|j| {
                let a = TAU * j as f32 / points as f32;
                Vec2::new(a.cos(), a.sin())
            })
            .collect();
        Ok(Self { lut })
    }

    pub fn len(&self) -> usize {
        self.lut.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lut.is_empty()
    }

    pub fn points(&self) -> &[Vec2] {
        &self.lut
    }
}

/// Arc position of curve point `i` out of `count`, 0 at the root and 1 at the tip.
pub fn arc_position(i: usize, count: usize) -> f32 {
    if count <= 1 {
        0.
    } else {
        i as f32 / (count - 1) as f32
    }
}

pub fn taper(i: usize, count: usize, scale_falloff: f32) -> f32 {
    ((1. - arc_position(i, count)) * scale_falloff) / 5.
}

pub fn strand_color(i: usize, count: usize) -> [f32; 4] {
    let t = arc_position(i, count);
    std::array::from_fn(|c| ROOT_COLOR[c] + (TIP_COLOR[c] - ROOT_COLOR[c]) * t)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tangents_of_a_polyline() {
        let points = [Vec3::ZERO, Vec3::X, Vec3::new(1., 2., 0.)];
        let mut out = Vec::new();
        estimate_tangents(&points, &mut out);
        assert_eq!(out, vec![Vec3::X, Vec3::Y, Vec3::Y]);

        estimate_tangents(&[Vec3::ONE], &mut out);
        assert_eq!(out, vec![FALLBACK_AXIS]);

        estimate_tangents(&[Vec3::ONE, Vec3::ONE], &mut out);
        assert_eq!(out, vec![FALLBACK_AXIS, FALLBACK_AXIS]);
    }

    #[test]
    fn hermite_endpoints() {
        let (p0, p1) = (Vec3::ZERO, Vec3::new(0., 1., 0.));
        let (a, da) = hermite(p0, p1, Vec3::X, Vec3::Z, 0.);
        let (b, db) = hermite(p0, p1, Vec3::X, Vec3::Z, 1.);
        assert_eq!(a, p0);
        assert_eq!(da, Vec3::X);
        assert!((b - p1).length() < 1e-6);
        assert!((db - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn resample_is_open() {
        let points = [Vec3::ZERO, Vec3::Y, Vec3::Y * 2.];
        let mut tangents = Vec::new();
        estimate_tangents(&points, &mut tangents);
        let (mut p, mut t) = (Vec::new(), Vec::new());
        resample(&points, &tangents, 1., 4, &mut p, &mut t);
        assert_eq!(p.len(), 8);
        assert_eq!(p[0], Vec3::ZERO);
        assert!((p[4] - Vec3::Y).length() < 1e-6);
        assert!(p.iter().all(|q| q.y < 2.));
        assert!(t.iter().all(|d| (*d - Vec3::Y).length() < 1e-5));
    }

    #[test]
    fn frames_stay_orthonormal() {
        let tangents: Vec<Vec3> = (0..32)
            .map(|i| {
                let a = i as f32 * 0.1;
                Vec3::new(a.cos(), 0.5, a.sin()).normalize()
            })
            .collect();
        let mut frames = Vec::new();
        transport_frames(&tangents, Vec3::Y, &mut frames);
        assert_eq!(frames.len(), tangents.len());
        for ((n, b), t) in frames.iter().zip(&tangents) {
            assert!((n.length() - 1.).abs() < 1e-4);
            assert!((b.length() - 1.).abs() < 1e-4);
            assert!(n.dot(*t).abs() < 1e-3);
            assert!(b.dot(*t).abs() < 1e-3);
            assert!(n.dot(*b).abs() < 1e-3);
        }
    }

    #[test]
    fn reseeds_parallel_root_normal() {
        let mut frames = Vec::new();
        transport_frames(&[Vec3::Y, Vec3::Y], Vec3::Y, &mut frames);
        assert_eq!(frames[0].0, Vec3::X);
        assert_eq!(frames[0].1, Vec3::Y.cross(Vec3::X));
        // straight curve, frame is carried unchanged
        assert_eq!(frames[1], frames[0]);

        transport_frames(&[Vec3::X], Vec3::X, &mut frames);
        assert_eq!(frames[0].0, Vec3::Z);
    }

    #[test]
    fn taper_and_color_ends() {
        assert!((taper(0, 5, 0.5) - 0.1).abs() < 1e-7);
        assert_eq!(taper(4, 5, 0.5), 0.);
        assert!((taper(0, 1, 0.5) - 0.1).abs() < 1e-7);
        assert_eq!(strand_color(0, 5), ROOT_COLOR);
        let tip = strand_color(4, 5);
        for c in 0..4 {
            assert!((tip[c] - TIP_COLOR[c]).abs() < 1e-6);
        }
    }

    #[test]
    fn cross_section_lut() {
        assert!(CrossSection::new(2).is_err());
        let square = CrossSection::new(4).unwrap();
        assert_eq!(square.len(), 4);
        assert!((square.points()[1] - Vec2::Y).length() < 1e-6);
    }
}
