//! Tube mesh synthesis from simulated strands.
//!
//! Each strand is resampled with a Hermite spline, framed by parallel
//! transport and extruded along a regular polygon. Strands write disjoint
//! ranges of the batch geometry and are processed in parallel.

pub mod algorithms;
pub mod mesh_builder;

use glam::Vec3;
use rayon::prelude::*;

use crate::config::BatchConfig;
use algorithms::{estimate_tangents, resample, strand_color, taper, transport_frames, CrossSection};
pub use mesh_builder::{GeometryData, StrandGeometry};

/// Per-worker buffers, reused across strands.
#[derive(Default)]
pub struct SynthesisScratch {
    tangents: Vec<Vec3>,
    curve: Vec<Vec3>,
    curve_tangents: Vec<Vec3>,
    frames: Vec<(Vec3, Vec3)>,
}

/// Writes the vertices, colors and indices of one strand into `out`.
pub fn synthesize_strand(
    config: &BatchConfig,
    cross_section: &CrossSection,
    points: &[Vec3],
    root_normal: Vec3,
    scratch: &mut SynthesisScratch,
    out: StrandGeometry<'_>,
) {
    let SynthesisScratch {
        tangents,
        curve,
        curve_tangents,
        frames,
    } = scratch;
    estimate_tangents(points, tangents);
    resample(
        points,
        tangents,
        config.tangent_scale,
        config.curve_samples,
        curve,
        curve_tangents,
    );
    transport_frames(curve_tangents, root_normal, frames);

    let count = curve.len();
    let ring = cross_section.len();
    debug_assert_eq!(out.points.len(), count * ring);

    for (i, (&center, &(normal, binormal))) in curve.iter().zip(frames.iter()).enumerate() {
        let scale = taper(i, count, config.scale_falloff);
        let color = strand_color(i, count);
        for (j, offset) in cross_section.points().iter().enumerate() {
            let (x, y) = (offset.x * scale, offset.y * scale);
            out.points[i * ring + j] = binormal * x + normal * y + center;
            out.colors[i * ring + j] = color;
        }
    }

    let base = out.base_vertex;
    let mut k = 0;
    let mut push = |tri: [usize; 3]| {
        for v in tri {
            out.triangles[k] = base + v as u32;
            k += 1;
        }
    };
    for s in 1..count {
        for j in 0..ring {
            let a = (s - 1) * ring + j;
            let b = (s - 1) * ring + (j + 1) % ring;
            let c = s * ring + j;
            let d = s * ring + (j + 1) % ring;
            push([a, c, b]);
            push([b, c, d]);
        }
    }
    // pad the remaining ring of quads with degenerate triangles on the tip
    let tip = count.saturating_sub(1) * ring;
    for j in 0..ring {
        push([tip + j; 3]);
        push([tip + j; 3]);
    }
}

/// Rewrites the whole batch geometry from the current control points.
pub fn synthesize(
    config: &BatchConfig,
    cross_section: &CrossSection,
    positions: &[Vec3],
    root_normals: &[Vec3],
    geometry: &mut GeometryData,
) {
    let n = config.control_points;
    debug_assert_eq!(positions.len(), root_normals.len() * n);
    geometry
        .par_strands_mut(config)
        .zip(positions.par_chunks(n))
        .zip(root_normals.par_iter())
        .for_each_init(SynthesisScratch::default, |scratch, ((out, points), &normal)| {
            synthesize_strand(config, cross_section, points, normal, scratch, out);
        });
}
