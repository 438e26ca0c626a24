//! Verlet integration of strand chains.
//!
//! Velocity is never stored: it is the difference between the current and the
//! previous position. Control point 0 is the root and is only ever written by
//! the root feed.

use glam::{Affine3A, Vec3};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::config::{BatchConfig, CollisionSphere, MAX_CONTROL_POINTS};
use crate::force::builtin::directional_drag;
use crate::force::{EvalContext, ForceLayout, ForceSample};
use crate::strand::StrandBatch;
use crate::utils::{ease_out_cubic, safe_normalize, FALLBACK_AXIS};

/// Segments shorter than this are left alone by the distance constraint.
const MIN_SEGMENT: f32 = 1e-8;
/// Penetration depth multiplier of the collision friction.
const FRICTION_SCALE: f32 = 10.;

/// Forces of one frame, shared read-only by every strand.
#[derive(Copy, Clone)]
pub struct StepForces<'a> {
    pub layout: Option<&'a ForceLayout>,
    pub buffer: &'a [f32],
    pub ctx: &'a EvalContext,
}

impl StepForces<'_> {
    fn accumulate(&self, sample: &ForceSample) -> Vec3 {
        match self.layout {
            Some(layout) => layout.accumulate(self.buffer, sample, self.ctx),
            None => Vec3::ZERO,
        }
    }
}

/// Everything one step needs besides the strand itself.
#[derive(Copy, Clone)]
pub struct StepParams<'a> {
    pub dt: f32,
    pub forces: StepForces<'a>,
    /// inverse of the incremental batch transform since the last frame
    pub reprojection: Option<Affine3A>,
}

/// Moves every non-root point, current and previous, by `transform`.
pub fn reproject(points: &mut [Vec3], previous: &mut [Vec3], transform: &Affine3A) {
    for p in points.iter_mut().skip(1).chain(previous.iter_mut().skip(1)) {
        *p = transform.transform_point3(*p);
    }
}

/// Tangent used by the drag term: central difference inside the chain,
/// backward difference at the tip.
fn drag_tangent(points: &[Vec3], i: usize) -> Vec3 {
    let d = if i + 1 < points.len() {
        points[i + 1] - points[i - 1]
    } else {
        points[i] - points[i - 1]
    };
    safe_normalize(d, FALLBACK_AXIS)
}

/// `p + (p - prev) + a * dt²` for every non-root point.
pub fn verlet(
    config: &BatchConfig,
    points: &mut [Vec3],
    previous: &mut [Vec3],
    dt: f32,
    forces: &StepForces,
) {
    debug_assert!(points.len() <= MAX_CONTROL_POINTS);
    let snapshot: SmallVec<[Vec3; MAX_CONTROL_POINTS]> = SmallVec::from_slice(points);
    let dt2 = dt * dt;

    for i in 1..points.len() {
        let p = snapshot[i];
        let velocity = (p - previous[i]) / dt;
        let tangent = drag_tangent(&snapshot, i);
        let sample = ForceSample {
            position: p,
            velocity,
            tangent,
        };
        let drag = directional_drag(velocity, tangent, config.resistance);
        let acceleration = forces.accumulate(&sample) + drag;

        points[i] = p + (p - previous[i]) + acceleration * dt2;
        previous[i] = p;
    }
}

/// Pulls point `i` back to `rest` from point `i - 1`, half the error at a
/// time. The point below only takes the other half when it is not index 0.
pub fn solve_distance(points: &mut [Vec3], i: usize, rest: f32) {
    let d = points[i] - points[i - 1];
    let len = d.length();
    if len < MIN_SEGMENT {
        return;
    }
    let half = d * ((len - rest) / len * 0.5);
    points[i] -= half;
    if i != 1 {
        points[i - 1] += half;
    }
}

/// Projects a point inside the sphere onto its surface. The previous position
/// is dragged towards the corrected one by a friction growing with depth.
pub fn resolve_sphere_collision(point: &mut Vec3, previous: &mut Vec3, sphere: &CollisionSphere) {
    let offset = *point - sphere.center;
    let dist = offset.length();
    let penetration = sphere.radius - dist;
    if penetration <= 0. {
        return;
    }
    let corrected = sphere.center + safe_normalize(offset, FALLBACK_AXIS) * sphere.radius;
    let friction = (penetration * FRICTION_SCALE).clamp(0., 1.);
    *previous = corrected - (corrected - *previous) * (1. - friction);
    *point = corrected;
}

/// One relaxation iteration: distance constraints, then collisions.
pub fn relax_pass(
    points: &mut [Vec3],
    previous: &mut [Vec3],
    rest: f32,
    collision: Option<&CollisionSphere>,
) {
    for i in 1..points.len() {
        solve_distance(points, i, rest);
    }
    if let Some(sphere) = collision {
        for i in 1..points.len() {
            resolve_sphere_collision(&mut points[i], &mut previous[i], sphere);
        }
    }
}

pub fn relax(config: &BatchConfig, points: &mut [Vec3], previous: &mut [Vec3]) {
    for _ in 0..config.iterations {
        relax_pass(points, previous, config.segment_length, config.collision.as_ref());
    }
}

/// Pulls every non-root point towards the straight rest pose along the root
/// normal. Applied to both positions so no velocity is injected.
pub fn blend_stiffness(
    config: &BatchConfig,
    points: &mut [Vec3],
    previous: &mut [Vec3],
    root_normal: Vec3,
) {
    if config.stiffness == 0. {
        return;
    }
    let n = points.len() as f32;
    let root = points[0];
    for i in 1..points.len() {
        let rest = root + root_normal * (config.segment_length * i as f32);
        let f = config.stiffness * ease_out_cubic(1. - i as f32 / n);
        let delta = (rest - points[i]) * f;
        points[i] += delta;
        previous[i] += delta;
    }
}

/// Full step of one strand. Does nothing when `dt <= 0`.
pub fn step_strand(
    config: &BatchConfig,
    points: &mut [Vec3],
    previous: &mut [Vec3],
    root_normal: Vec3,
    params: &StepParams,
) {
    if !(params.dt > 0.) {
        return;
    }
    if let Some(transform) = &params.reprojection {
        reproject(points, previous, transform);
    }
    verlet(config, points, previous, params.dt, &params.forces);
    relax(config, points, previous);
    blend_stiffness(config, points, previous, root_normal);
}

/// Steps every strand of the batch in parallel.
pub fn step_batch(batch: &mut StrandBatch, params: &StepParams) {
    let (config, positions, previous, root_normals) = batch.state_mut();
    let n = config.control_points;
    positions
        .par_chunks_mut(n)
        .zip(previous.par_chunks_mut(n))
        .zip(root_normals.par_iter())
        .for_each(|((points, previous), &normal)| {
            step_strand(config, points, previous, normal, params);
        });
}
