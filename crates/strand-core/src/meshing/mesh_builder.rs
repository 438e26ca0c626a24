use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;

/// Vertex, color and index streams of a whole batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryData {
    pub points: Vec<Vec3>,
    pub colors: Vec<[f32; 4]>,
    pub triangles: Vec<u32>,
}

/// The part of [`GeometryData`] one strand writes.
pub struct StrandGeometry<'a> {
    /// index of the strand's first vertex in the batch
    pub base_vertex: u32,
    pub points: &'a mut [Vec3],
    pub colors: &'a mut [[f32; 4]],
    pub triangles: &'a mut [u32],
}

impl GeometryData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed buffers with the analytic size of `strands` strands.
    pub fn sized_for(config: &BatchConfig, strands: usize) -> Self {
        let vertices = config.vertices_per_strand() * strands;
        Self {
            points: vec![Vec3::ZERO; vertices],
            colors: vec![[0.; 4]; vertices],
            triangles: vec![0; config.indices_per_strand() * strands],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn index_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, i: usize) -> [Vec3; 3] {
        let t = &self.triangles[3 * i..3 * i + 3];
        [
            self.points[t[0] as usize],
            self.points[t[1] as usize],
            self.points[t[2] as usize],
        ]
    }

    /// Disjoint per-strand ranges, in strand order.
    pub fn par_strands_mut(
        &mut self,
        config: &BatchConfig,
    ) -> impl IndexedParallelIterator<Item = StrandGeometry<'_>> {
        let vertices = config.vertices_per_strand().max(1);
        let indices = config.indices_per_strand().max(1);
        self.points
            .par_chunks_mut(vertices)
            .zip(self.colors.par_chunks_mut(vertices))
            .zip(self.triangles.par_chunks_mut(indices))
            .enumerate()
            .map(move |(s, ((points, colors), triangles))| StrandGeometry {
                base_vertex: (s * vertices) as u32,
                points,
                colors,
                triangles,
            })
    }
}
