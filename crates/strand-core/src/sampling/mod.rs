//! Root placement on a triangle surface.
//!
//! Both samplers share one contract: a triangle subset goes in, a stream of
//! [`SurfaceSample`] (position, normal, skin weights) comes out.

pub mod grid;
pub mod poisson;

use glam::Vec3;
use smallvec::SmallVec;

use crate::config::NormalMode;
use crate::error::StrandError;
use crate::utils::{safe_normalize, FALLBACK_AXIS};

pub use grid::grid_samples;
pub use poisson::{poisson_disk, AreaDistribution, UniformTriangle};

/// Four joint influences of one vertex.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SkinWeights {
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

impl Default for SkinWeights {
    fn default() -> Self {
        Self {
            joints: [0; 4],
            weights: [1., 0., 0., 0.],
        }
    }
}

impl SkinWeights {
    pub fn new(joints: [u16; 4], weights: [f32; 4]) -> Self {
        Self { joints, weights }
    }

    /// Barycentric blend of three vertex influences. Keeps the four heaviest
    /// joints and renormalizes them to sum to 1.
    pub fn blend(skins: [&SkinWeights; 3], bary: Vec3) -> Self {
        let mut acc: SmallVec<[(u16, f32); 12]> = SmallVec::new();
        for (skin, b) in skins.into_iter().zip(bary.to_array()) {
            for (&joint, &w) in skin.joints.iter().zip(&skin.weights) {
                let w = w * b;
                if w <= 0. {
                    continue;
                }
                match acc.iter_mut().find(|(j, _)| *j == joint) {
                    Some((_, total)) => *total += w,
                    None => acc.push((joint, w)),
                }
            }
        }
        acc.sort_by(|a, b| b.1.total_cmp(&a.1));
        acc.truncate(4);

        let sum: f32 = acc.iter().map(|(_, w)| w).sum();
        if !(sum > 0.) {
            return Self::default();
        }
        let mut result = Self {
            joints: [0; 4],
            weights: [0.; 4],
        };
        for (k, (joint, w)) in acc.into_iter().enumerate() {
            result.joints[k] = joint;
            result.weights[k] = w / sum;
        }
        result
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub skin: Option<SkinWeights>,
    /// index of the source triangle
    pub triangle: usize,
    /// weights of the three triangle corners
    pub barycentric: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceSamples {
    pub samples: Vec<SurfaceSample>,
}

impl SurfaceSamples {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SurfaceSample> {
        self.samples.iter()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.samples.iter().map(|s| s.position)
    }
}

impl From<Vec<SurfaceSample>> for SurfaceSamples {
    fn from(samples: Vec<SurfaceSample>) -> Self {
        Self { samples }
    }
}

/// Indexed triangle mesh with per-vertex normals, optional skin weights and
/// an optional subset marker.
#[derive(Clone, Debug)]
pub struct TriangleSurface {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    skin: Option<Vec<SkinWeights>>,
    subset: Option<Vec<bool>>,
}

impl TriangleSurface {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        indices: &[u32],
    ) -> Result<Self, StrandError> {
        if normals.len() != positions.len() {
            return Err(StrandError::SurfaceMismatch {
                attribute: "normal",
                expected: positions.len(),
                found: normals.len(),
            });
        }
        if indices.len() % 3 != 0 || indices.iter().any(|&i| i as usize >= positions.len()) {
            return Err(StrandError::InvalidTriangles);
        }
        let triangles = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        Ok(Self {
            positions,
            normals,
            triangles,
            skin: None,
            subset: None,
        })
    }

    pub fn with_skin(mut self, skin: Vec<SkinWeights>) -> Result<Self, StrandError> {
        if skin.len() != self.positions.len() {
            return Err(StrandError::SurfaceMismatch {
                attribute: "skin",
                expected: self.positions.len(),
                found: skin.len(),
            });
        }
        self.skin = Some(skin);
        Ok(self)
    }

    /// Restricts sampling to triangles with at least one marked vertex.
    pub fn with_subset(mut self, marked: Vec<bool>) -> Result<Self, StrandError> {
        if marked.len() != self.positions.len() {
            return Err(StrandError::SurfaceMismatch {
                attribute: "subset",
                expected: self.positions.len(),
                found: marked.len(),
            });
        }
        self.subset = Some(marked);
        Ok(self)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_active(&self, triangle: usize) -> bool {
        match &self.subset {
            None => true,
            Some(marked) => self.triangles[triangle].iter().any(|&v| marked[v as usize]),
        }
    }

    /// Triangles touching the subset, in index order.
    pub fn active_triangles(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.triangles.len()).filter(|&t| self.is_active(t))
    }

    pub fn corners(&self, triangle: usize) -> [Vec3; 3] {
        self.triangles[triangle].map(|v| self.positions[v as usize])
    }

    pub fn area(&self, triangle: usize) -> f32 {
        let [a, b, c] = self.corners(triangle);
        0.5 * (b - a).cross(c - a).length()
    }

    pub fn face_normal(&self, triangle: usize) -> Vec3 {
        let [a, b, c] = self.corners(triangle);
        safe_normalize((b - a).cross(c - a), FALLBACK_AXIS)
    }

    pub fn point_at(&self, triangle: usize, bary: Vec3) -> Vec3 {
        let [a, b, c] = self.corners(triangle);
        a * bary.x + b * bary.y + c * bary.z
    }

    pub fn interpolate(&self, triangle: usize, bary: Vec3, normals: NormalMode) -> SurfaceSample {
        let [i, j, k] = self.triangles[triangle].map(|v| v as usize);
        let normal = match normals {
            NormalMode::Flat => self.face_normal(triangle),
            NormalMode::Smooth => {
                let n = self.normals[i] * bary.x
                    + self.normals[j] * bary.y
                    + self.normals[k] * bary.z;
                safe_normalize(n, self.face_normal(triangle))
            }
        };
        let skin = self
            .skin
            .as_ref()
            .map(|skin| SkinWeights::blend([&skin[i], &skin[j], &skin[k]], bary));
        SurfaceSample {
            position: self.point_at(triangle, bary),
            normal,
            skin,
            triangle,
            barycentric: bary,
        }
    }

    /// Unit quad in the XZ plane made of two triangles, facing +Y.
    pub fn quad(size: f32) -> Self {
        let h = size / 2.;
        let positions = vec![
            Vec3::new(-h, 0., -h),
            Vec3::new(h, 0., -h),
            Vec3::new(h, 0., h),
            Vec3::new(-h, 0., h),
        ];
        Self {
            normals: vec![Vec3::Y; 4],
            positions,
            triangles: vec![[0, 2, 1], [0, 3, 2]],
            skin: None,
            subset: None,
        }
    }
}
