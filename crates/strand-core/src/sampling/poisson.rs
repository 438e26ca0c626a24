use glam::Vec3;
use rand::{prelude::Distribution, Rng};

use super::{SurfaceSample, SurfaceSamples, TriangleSurface};
use crate::config::{NormalMode, SamplerConfig};

/// Picks an active triangle with probability proportional to its area.
#[derive(Clone, Debug)]
pub struct AreaDistribution {
    triangles: Vec<usize>,
    cumulative: Vec<f32>,
}

impl AreaDistribution {
    /// `None` when the active part of the surface has no area.
    pub fn new(surface: &TriangleSurface) -> Option<Self> {
        let mut triangles = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0.;
        for t in surface.active_triangles() {
            let area = surface.area(t);
            if area > 0. && area.is_finite() {
                total += area;
                triangles.push(t);
                cumulative.push(total);
            }
        }
        (total > 0.).then_some(Self {
            triangles,
            cumulative,
        })
    }

    pub fn total_area(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.)
    }
}

impl Distribution<usize> for AreaDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let x = rng.gen_range(0f32..self.total_area());
        let i = self.cumulative.partition_point(|&c| c <= x);
        self.triangles[i.min(self.triangles.len() - 1)]
    }
}

/// Uniform barycentric weights over a triangle.
#[derive(Copy, Clone, Debug, Default)]
pub struct UniformTriangle;

impl Distribution<Vec3> for UniformTriangle {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let mut u: f32 = rng.gen_range(0f32..1f32);
        let mut v: f32 = rng.gen_range(0f32..1f32);
        if u + v > 1. {
            u = 1. - u;
            v = 1. - v;
        }
        Vec3::new(1. - u - v, u, v)
    }
}

/// Dart throwing with a minimum spacing. Stops after `max_points` samples or
/// `max_tries` consecutive rejections, whichever comes first.
pub fn poisson_disk<R: Rng + ?Sized>(
    surface: &TriangleSurface,
    config: &SamplerConfig,
    rng: &mut R,
) -> SurfaceSamples {
    let mut samples: Vec<SurfaceSample> = Vec::with_capacity(config.max_points.min(4096));
    if config.max_points == 0 {
        return samples.into();
    }
    let Some(areas) = AreaDistribution::new(surface) else {
        log::debug!("poisson sampling: surface subset has no area");
        return samples.into();
    };

    let r2 = config.min_distance * config.min_distance;
    let mut misses = 0;
    while samples.len() < config.max_points && misses < config.max_tries {
        let triangle = areas.sample(rng);
        let bary = UniformTriangle.sample(rng);
        let position = surface.point_at(triangle, bary);

        if samples.iter().any(|s| s.position.distance_squared(position) < r2) {
            misses += 1;
            continue;
        }
        misses = 0;
        samples.push(surface.interpolate(triangle, bary, NormalMode::Smooth));
    }

    if samples.len() < config.max_points {
        log::debug!(
            "poisson sampling saturated after {} of {} points",
            samples.len(),
            config.max_points
        );
    }
    samples.into()
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn config(min_distance: f32, max_points: usize) -> SamplerConfig {
        SamplerConfig {
            min_distance,
            max_points,
            max_tries: 200,
        }
    }

    #[test]
    fn zero_points_is_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let samples = poisson_disk(&TriangleSurface::quad(1.), &config(0.1, 0), &mut rng);
        assert!(samples.is_empty());
    }

    #[test]
    fn seeded_runs_repeat() {
        let quad = TriangleSurface::quad(1.);
        let a = poisson_disk(&quad, &config(0.1, 20), &mut StdRng::seed_from_u64(42));
        let b = poisson_disk(&quad, &config(0.1, 20), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn saturation_returns_fewer_points() {
        let mut rng = StdRng::seed_from_u64(3);
        // a unit quad cannot hold more than a handful of points 0.6 apart
        let samples = poisson_disk(&TriangleSurface::quad(1.), &config(0.6, 100), &mut rng);
        assert!(!samples.is_empty());
        assert!(samples.len() < 10);
    }

    #[test]
    fn samples_stay_in_subset() {
        let quad = TriangleSurface::quad(1.)
            .with_subset(vec![false, true, false, false])
            .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let samples = poisson_disk(&quad, &config(0.02, 50), &mut rng);
        assert_eq!(samples.len(), 50);
        for s in samples.iter() {
            assert_eq!(s.triangle, 0);
            assert!((s.normal - Vec3::Y).length() < 1e-6);
            // triangle 0 is the half with x >= z
            assert!(s.position.x >= s.position.z - 1e-6);
        }
    }

    #[test]
    fn degenerate_surface_yields_nothing() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.];
        let flat = TriangleSurface::new(positions, vec![Vec3::Y; 3], &[0, 1, 2]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(poisson_disk(&flat, &config(0.1, 10), &mut rng).is_empty());
    }

    #[test]
    fn area_weighting() {
        // a 1x1 triangle next to 3x3 one: nine times the area
        let positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Z,
            Vec3::new(10., 0., 0.),
            Vec3::new(13., 0., 0.),
            Vec3::new(10., 0., 3.),
        ];
        let surface =
            TriangleSurface::new(positions, vec![Vec3::Y; 6], &[0, 2, 1, 3, 5, 4]).unwrap();
        let areas = AreaDistribution::new(&surface).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let big = (0..10_000).filter(|_| areas.sample(&mut rng) == 1).count();
        assert!((8_600..9_400).contains(&big), "{big}");
    }

    proptest! {
        #[test]
        fn accepted_samples_keep_spacing(
            seed in any::<u64>(),
            r in 0.05f32..0.4,
            max in 0usize..60,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let samples = poisson_disk(&TriangleSurface::quad(2.), &config(r, max), &mut rng);
            prop_assert!(samples.len() <= max);
            for (i, p) in samples.iter().enumerate() {
                for q in &samples.samples[..i] {
                    prop_assert!(p.position.distance(q.position) >= r - 1e-5);
                }
            }
        }

        #[test]
        fn barycentrics_are_inside(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..32 {
                let b = UniformTriangle.sample(&mut rng);
                prop_assert!(b.min_element() >= -1e-6);
                prop_assert!((b.element_sum() - 1.).abs() < 1e-5);
            }
        }
    }
}
