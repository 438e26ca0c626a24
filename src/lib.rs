use bevy::color::Color;
use bevy::math::Isometry3d;
use bevy::prelude::{GlobalTransform, Resource};
use bevy_gizmos::gizmos::Gizmos;

pub mod bevy_mesh;
pub mod plugin;
pub mod surface;

pub use bevy_mesh::{to_mesh, write_geometry};
pub use plugin::{
    StrandBatchComponent, StrandClock, StrandForces, StrandFrameSettings, StrandRoots, StrandSet,
    StrandsDebugPlugin, StrandsPlugin,
};
pub use strand_core;
pub use surface::surface_from_mesh;

use strand_core::{CollisionSphere, GeometryData, StrandBatch};

#[derive(Copy, Clone, Default, Debug, Resource)]
pub struct DebugFlags {
    pub strands: bool,
    /// root normals
    pub roots: bool,
    pub collision: bool,
    pub triangles: bool,
}

pub trait VisualDebug {
    /// `transform` places the batch-local data in the world.
    fn debug(&self, gizmos: &mut Gizmos, transform: &GlobalTransform, debug_flags: DebugFlags);
}

impl VisualDebug for () {
    fn debug(&self, _: &mut Gizmos, _: &GlobalTransform, _: DebugFlags) {}
}

impl<T> VisualDebug for Option<&T>
where
    T: VisualDebug,
{
    fn debug(&self, gizmos: &mut Gizmos, transform: &GlobalTransform, debug_flags: DebugFlags) {
        if let Some(x) = self {
            x.debug(gizmos, transform, debug_flags);
        }
    }
}

impl VisualDebug for CollisionSphere {
    fn debug(&self, gizmos: &mut Gizmos, transform: &GlobalTransform, debug_flags: DebugFlags) {
        if !debug_flags.collision {
            return;
        }
        let center = transform.transform_point(self.center);
        let radius = self.radius * transform.compute_transform().scale.max_element();
        gizmos.sphere(Isometry3d::from_translation(center), radius, Color::srgb(0.9, 0.2, 0.2));
    }
}

impl VisualDebug for StrandBatch {
    fn debug(&self, gizmos: &mut Gizmos, transform: &GlobalTransform, debug_flags: DebugFlags) {
        if debug_flags.strands {
            for strand in self.strands() {
                gizmos.linestrip(
                    strand.iter().map(|&p| transform.transform_point(p)),
                    Color::srgb(0.85, 0.75, 0.45),
                );
            }
        }
        if debug_flags.roots {
            let length = self.config().segment_length;
            for (strand, &normal) in self.strands().zip(self.root_normals()) {
                let root = transform.transform_point(strand[0]);
                let tip = transform.transform_point(strand[0] + normal * length);
                gizmos.arrow(root, tip, Color::srgb(0.2, 0.4, 0.9));
            }
        }
        self.config().collision.as_ref().debug(gizmos, transform, debug_flags);
        self.geometry().debug(gizmos, transform, debug_flags);
    }
}

impl VisualDebug for GeometryData {
    fn debug(&self, gizmos: &mut Gizmos, transform: &GlobalTransform, debug_flags: DebugFlags) {
        if !debug_flags.triangles {
            return;
        }
        for t in 0..self.triangles.len() / 3 {
            let [a, b, c] = self.triangle(t).map(|p| transform.transform_point(p));
            // padding triangles collapse onto one point
            if a == b && b == c {
                continue;
            }
            gizmos.linestrip([a, b, c, a], Color::srgb(0.3, 0.3, 0.3));
        }
    }
}
