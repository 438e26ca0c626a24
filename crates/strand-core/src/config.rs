use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::StrandError;
use crate::force::spec::ForceSpec;
use crate::force::{ForceRegistry, ForceSet};

/// Control points per strand that fit the fixed per-strand scratch arrays.
pub const MAX_CONTROL_POINTS: usize = 64;
/// Resampled curve points per strand.
pub const MAX_CURVE_POINTS: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollisionSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl CollisionSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Everything fixed for the lifetime of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub control_points: usize,
    /// rest length of every segment
    pub segment_length: f32,
    pub tangent_scale: f32,
    pub scale_falloff: f32,
    pub curve_samples: usize,
    pub cross_section_points: usize,
    pub stiffness: f32,
    pub resistance: f32,
    pub collision: Option<CollisionSphere>,
    /// constraint relaxation iterations per frame
    pub iterations: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            control_points: 16,
            segment_length: 0.05,
            tangent_scale: 1.,
            scale_falloff: 0.1,
            curve_samples: 8,
            cross_section_points: 6,
            stiffness: 0.1,
            resistance: 1.,
            collision: None,
            iterations: 20,
        }
    }
}

impl BatchConfig {
    pub fn with_control_points(mut self, control_points: usize) -> Self {
        self.control_points = control_points;
        self
    }

    pub fn with_segment_length(mut self, segment_length: f32) -> Self {
        self.segment_length = segment_length;
        self
    }

    pub fn with_tangent_scale(mut self, tangent_scale: f32) -> Self {
        self.tangent_scale = tangent_scale;
        self
    }

    pub fn with_scale_falloff(mut self, scale_falloff: f32) -> Self {
        self.scale_falloff = scale_falloff;
        self
    }

    pub fn with_curve_samples(mut self, curve_samples: usize) -> Self {
        self.curve_samples = curve_samples;
        self
    }

    pub fn with_cross_section_points(mut self, cross_section_points: usize) -> Self {
        self.cross_section_points = cross_section_points;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_resistance(mut self, resistance: f32) -> Self {
        self.resistance = resistance;
        self
    }

    pub fn with_collision(mut self, collision: Option<CollisionSphere>) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Resampled curve points per strand.
    pub fn curve_points_per_strand(&self) -> usize {
        self.control_points.saturating_sub(1) * self.curve_samples
    }

    pub fn vertices_per_strand(&self) -> usize {
        self.curve_points_per_strand() * self.cross_section_points
    }

    pub fn indices_per_strand(&self) -> usize {
        self.vertices_per_strand() * 6
    }

    pub fn validate(&self) -> Result<(), StrandError> {
        if self.control_points < 2 {
            return Err(StrandError::TooFewControlPoints {
                count: self.control_points,
            });
        }
        if self.control_points > MAX_CONTROL_POINTS {
            return Err(StrandError::TooManyControlPoints {
                count: self.control_points,
                max: MAX_CONTROL_POINTS,
            });
        }
        if self.curve_samples == 0 {
            return Err(StrandError::InvalidParameter {
                name: "curve_samples",
                value: 0.,
            });
        }
        if self.curve_points_per_strand() > MAX_CURVE_POINTS {
            return Err(StrandError::TooManyCurvePoints {
                count: self.curve_points_per_strand(),
                max: MAX_CURVE_POINTS,
            });
        }
        if self.cross_section_points < 3 {
            return Err(StrandError::InvalidCrossSection {
                count: self.cross_section_points,
            });
        }
        if !(self.segment_length > 0.) || !self.segment_length.is_finite() {
            return Err(StrandError::InvalidParameter {
                name: "segment_length",
                value: self.segment_length,
            });
        }
        for (name, value) in [
            ("tangent_scale", self.tangent_scale),
            ("scale_falloff", self.scale_falloff),
            ("stiffness", self.stiffness),
            ("resistance", self.resistance),
        ] {
            if !value.is_finite() {
                return Err(StrandError::InvalidParameter { name, value });
            }
        }
        if let Some(sphere) = &self.collision {
            if !(sphere.radius > 0.) || !sphere.center.is_finite() {
                return Err(StrandError::InvalidParameter {
                    name: "collision.radius",
                    value: sphere.radius,
                });
            }
        }
        Ok(())
    }
}

/// Per-frame inputs, passed explicitly on every frame call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameParams {
    pub dt: f32,
    /// seconds since the simulation started
    pub time: f32,
    /// skip integration, still write roots and geometry
    pub freeze: bool,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            dt: 1. / 60.,
            time: 0.,
            freeze: false,
        }
    }
}

impl FrameParams {
    pub fn new(dt: f32, time: f32) -> Self {
        Self {
            dt,
            time,
            freeze: false,
        }
    }

    pub fn frozen(self) -> Self {
        Self {
            freeze: true,
            ..self
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub min_distance: f32,
    pub max_points: usize,
    /// consecutive rejections before the surface counts as saturated
    pub max_tries: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.05,
            max_points: 256,
            max_tries: 1000,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalMode {
    /// face normal of the source triangle
    Flat,
    /// barycentric blend of the vertex normals
    #[default]
    Smooth,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// subdivisions per triangle edge
    pub resolution: usize,
    pub normals: NormalMode,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: 4,
            normals: NormalMode::Smooth,
        }
    }
}

/// Scene file: one batch, its sampler and the active forces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandSceneConfig {
    pub batch: BatchConfig,
    pub sampler: SamplerConfig,
    pub forces: Vec<ForceSpec>,
}

impl StrandSceneConfig {
    pub fn from_toml(src: &str) -> Result<Self, StrandError> {
        let config: StrandSceneConfig = toml::from_str(src)?;
        config.batch.validate()?;
        Ok(config)
    }

    pub fn force_set(&self, registry: &ForceRegistry) -> Result<ForceSet, StrandError> {
        let instances = self
            .forces
            .iter()
            .map(|spec| spec.instantiate(registry))
            .collect::<Result<Vec<_>, _>>()?;
        ForceSet::from_instances(instances)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn analytic_sizes() {
        let config = BatchConfig::default()
            .with_control_points(5)
            .with_curve_samples(3)
            .with_cross_section_points(4);
        assert_eq!(config.curve_points_per_strand(), 12);
        assert_eq!(config.vertices_per_strand(), 48);
        assert_eq!(config.indices_per_strand(), 288);
    }

    #[test]
    fn capacity_is_checked() {
        assert!(BatchConfig::default().validate().is_ok());
        assert!(matches!(
            BatchConfig::default().with_control_points(1).validate(),
            Err(StrandError::TooFewControlPoints { count: 1 })
        ));
        assert!(matches!(
            BatchConfig::default()
                .with_control_points(MAX_CONTROL_POINTS + 1)
                .validate(),
            Err(StrandError::TooManyControlPoints { .. })
        ));
        assert!(matches!(
            BatchConfig::default()
                .with_control_points(64)
                .with_curve_samples(32)
                .validate(),
            Err(StrandError::TooManyCurvePoints { count: 2016, .. })
        ));
        assert!(matches!(
            BatchConfig::default().with_cross_section_points(2).validate(),
            Err(StrandError::InvalidCrossSection { count: 2 })
        ));
        assert!(BatchConfig::default()
            .with_segment_length(0.)
            .validate()
            .is_err());
        assert!(BatchConfig::default()
            .with_collision(Some(CollisionSphere::new(Vec3::ZERO, -1.)))
            .validate()
            .is_err());
    }

    #[test]
    fn scene_from_toml() {
        let src = r#"
            [batch]
            control_points = 8
            stiffness = 0.0
            collision = { center = [0.0, 1.0, 0.0], radius = 0.5 }

            [sampler]
            max_points = 10

            [[forces]]
            kind = "gravity"

            [[forces]]
            kind = "curl_noise"
            strength = 0.4
        "#;
        let scene = StrandSceneConfig::from_toml(src).unwrap();
        assert_eq!(scene.batch.control_points, 8);
        assert_eq!(scene.batch.iterations, 20);
        assert_eq!(
            scene.batch.collision,
            Some(CollisionSphere::new(Vec3::Y, 0.5))
        );
        assert_eq!(scene.sampler.max_points, 10);
        assert_eq!(scene.sampler.max_tries, 1000);

        let set = scene.force_set(&ForceRegistry::with_builtins()).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalid_scene_is_rejected() {
        assert!(matches!(
            StrandSceneConfig::from_toml("[batch]\ncontrol_points = 100"),
            Err(StrandError::TooManyControlPoints { .. })
        ));
        assert!(matches!(
            StrandSceneConfig::from_toml("batch = 3"),
            Err(StrandError::Config(_))
        ));
    }
}
