use glam::Vec3;

use super::{SurfaceSamples, TriangleSurface};
use crate::config::GridConfig;

/// Barycentric weights of a regular grid with `resolution` steps per edge.
pub fn grid_barycentrics(resolution: usize) -> impl Iterator<Item = Vec3> {
    let res = resolution.max(1);
    let step = 1. / res as f32;
    (0..=res).flat_map(move |i| {
        (0..=res - i).map(move |j| {
            let u = i as f32 * step;
            let v = j as f32 * step;
            Vec3::new((1. - u - v).max(0.), u, v)
        })
    })
}

/// Deterministic dense coverage of every active triangle. Points on shared
/// edges are emitted once per triangle.
pub fn grid_samples(surface: &TriangleSurface, config: &GridConfig) -> SurfaceSamples {
    let mut samples = Vec::new();
    for triangle in surface.active_triangles() {
        for bary in grid_barycentrics(config.resolution) {
            samples.push(surface.interpolate(triangle, bary, config.normals));
        }
    }
    samples.into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::NormalMode;

    #[test]
    fn grid_counts() {
        assert_eq!(grid_barycentrics(1).count(), 3);
        assert_eq!(grid_barycentrics(4).count(), 15);
        assert_eq!(grid_barycentrics(0).count(), 3);

        let samples = grid_samples(
            &TriangleSurface::quad(1.),
            &GridConfig {
                resolution: 3,
                normals: NormalMode::Flat,
            },
        );
        assert_eq!(samples.len(), 2 * 10);
        assert!(samples.iter().all(|s| (s.normal - Vec3::Y).length() < 1e-6));
    }

    #[test]
    fn shared_edges_agree_in_smooth_mode() {
        // two triangles folded along the Z axis, vertex normals averaged on the fold
        let fold = Vec3::new(0., 1., 0.);
        let left = Vec3::new(-1., 1., 0.).normalize();
        let right = Vec3::new(1., 1., 0.).normalize();
        let positions = vec![
            Vec3::ZERO,
            Vec3::Z,
            Vec3::new(-1., -1., 0.),
            Vec3::new(1., -1., 0.),
        ];
        let normals = vec![fold, fold, left, right];
        let surface = TriangleSurface::new(positions, normals, &[0, 1, 2, 0, 3, 1]).unwrap();
        let samples = grid_samples(
            &surface,
            &GridConfig {
                resolution: 2,
                normals: NormalMode::Smooth,
            },
        );

        let on_fold = |s: &&crate::sampling::SurfaceSample| {
            s.position.x.abs() < 1e-6 && s.position.y.abs() < 1e-6
        };
        let a: Vec<_> = samples.iter().filter(|s| s.triangle == 0).filter(on_fold).collect();
        let b: Vec<_> = samples.iter().filter(|s| s.triangle == 1).filter(on_fold).collect();
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        for p in &a {
            let q = b
                .iter()
                .find(|q| q.position.distance(p.position) < 1e-6)
                .unwrap();
            assert!((p.normal - q.normal).length() < 1e-6);
        }
    }
}
