//! Serializable descriptions of built-in forces, as found in scene files.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{FieldSource, ForceInstance, ForceKind, ForceRegistry};
use crate::error::StrandError;

fn default_gravity() -> Vec3 {
    Vec3::new(0., -9.81, 0.)
}

fn default_one() -> f32 {
    1.
}

fn default_falloff_distance() -> f32 {
    1.
}

fn default_axis() -> Vec3 {
    Vec3::Y
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceSpec {
    Gravity {
        #[serde(default = "default_gravity")]
        acceleration: Vec3,
    },
    CurlNoise {
        strength: f32,
        #[serde(default = "default_one")]
        speed: f32,
        #[serde(default = "default_one")]
        scale: f32,
    },
    Point {
        position: Vec3,
        strength: f32,
        #[serde(default = "default_falloff_distance")]
        falloff_distance: f32,
        #[serde(default = "default_one")]
        falloff_power: f32,
    },
    Vortex {
        position: Vec3,
        #[serde(default = "default_axis")]
        axis: Vec3,
        strength: f32,
        #[serde(default = "default_falloff_distance")]
        falloff_distance: f32,
        #[serde(default = "default_one")]
        falloff_power: f32,
    },
}

impl ForceSpec {
    pub fn kind(&self) -> ForceKind {
        match self {
            ForceSpec::Gravity { .. } => ForceKind::Gravity,
            ForceSpec::CurlNoise { .. } => ForceKind::CurlNoise,
            ForceSpec::Point { .. } => ForceKind::Point,
            ForceSpec::Vortex { .. } => ForceKind::Vortex,
        }
    }

    pub fn instantiate(&self, registry: &ForceRegistry) -> Result<ForceInstance, StrandError> {
        let values: Vec<(&str, FieldSource)> = match *self {
            ForceSpec::Gravity { acceleration } => vec![("acceleration", acceleration.into())],
            ForceSpec::CurlNoise {
                strength,
                speed,
                scale,
            } => vec![
                ("strength", strength.into()),
                ("speed", speed.into()),
                ("scale", scale.into()),
            ],
            ForceSpec::Point {
                position,
                strength,
                falloff_distance,
                falloff_power,
            } => vec![
                ("position", position.into()),
                ("strength", strength.into()),
                ("falloff_distance", falloff_distance.into()),
                ("falloff_power", falloff_power.into()),
            ],
            ForceSpec::Vortex {
                position,
                axis,
                strength,
                falloff_distance,
                falloff_power,
            } => vec![
                ("position", position.into()),
                ("axis", axis.into()),
                ("strength", strength.into()),
                ("falloff_distance", falloff_distance.into()),
                ("falloff_power", falloff_power.into()),
            ],
        };
        registry.instantiate(self.kind(), values)
    }
}
