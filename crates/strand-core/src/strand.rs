use glam::Vec3;

use crate::config::BatchConfig;
use crate::error::StrandError;
use crate::meshing::algorithms::CrossSection;
use crate::meshing::{self, GeometryData};
use crate::sampling::{SurfaceSample, SurfaceSamples};
use crate::utils::{safe_normalize, FALLBACK_AXIS};

/// Per-frame input of one strand, written by the skinning collaborator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrandRoot {
    pub position: Vec3,
    pub normal: Vec3,
}

impl StrandRoot {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Dense state of every strand grown from one surface.
///
/// Control points are stored strand-major: strand `s` owns
/// `positions[s * n..(s + 1) * n]` where `n` is the batch control point count.
/// The geometry buffer is sized once and overwritten by every synthesis pass.
#[derive(Clone, Debug)]
pub struct StrandBatch {
    config: BatchConfig,
    positions: Vec<Vec3>,
    previous: Vec<Vec3>,
    root_normals: Vec<Vec3>,
    samples: Vec<SurfaceSample>,
    cross_section: CrossSection,
    geometry: GeometryData,
}

impl StrandBatch {
    /// One strand per sample, grown straight along the sample normal.
    pub fn from_samples(
        config: BatchConfig,
        samples: &SurfaceSamples,
    ) -> Result<Self, StrandError> {
        config.validate()?;
        let n = config.control_points;
        let mut positions = Vec::with_capacity(samples.len() * n);
        let mut root_normals = Vec::with_capacity(samples.len());
        for sample in samples.iter() {
            let normal = safe_normalize(sample.normal, FALLBACK_AXIS);
            positions.extend(
                (0..n).map(|i| sample.position + normal * config.segment_length * i as f32),
            );
            root_normals.push(normal);
        }
        Self::build(config, positions, root_normals, samples.samples.clone())
    }

    /// Batch from explicit chains, all of `config.control_points` points.
    pub fn from_chains(
        config: BatchConfig,
        chains: &[Vec<Vec3>],
        root_normals: &[Vec3],
    ) -> Result<Self, StrandError> {
        config.validate()?;
        if root_normals.len() != chains.len() {
            return Err(StrandError::SurfaceMismatch {
                attribute: "root_normal",
                expected: chains.len(),
                found: root_normals.len(),
            });
        }
        let n = config.control_points;
        if let Some((strand, chain)) = chains.iter().enumerate().find(|(_, c)| c.len() != n) {
            return Err(StrandError::ControlPointMismatch {
                strand,
                expected: n,
                found: chain.len(),
            });
        }
        let positions = chains.concat();
        let root_normals = root_normals
            .iter()
            .map(|&v| safe_normalize(v, FALLBACK_AXIS))
            .collect();
        Self::build(config, positions, root_normals, Vec::new())
    }

    fn build(
        config: BatchConfig,
        positions: Vec<Vec3>,
        root_normals: Vec<Vec3>,
        samples: Vec<SurfaceSample>,
    ) -> Result<Self, StrandError> {
        let cross_section = CrossSection::new(config.cross_section_points)?;
        let strands = root_normals.len();
        let geometry = GeometryData::sized_for(&config, strands);
        log::debug!(
            "strand batch: {} strands of {} points, {} vertices, {} indices",
            strands,
            config.control_points,
            geometry.vertex_count(),
            geometry.index_count()
        );
        Ok(Self {
            previous: positions.clone(),
            positions,
            root_normals,
            samples,
            cross_section,
            geometry,
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn strand_count(&self) -> usize {
        self.root_normals.len()
    }

    pub fn control_points(&self) -> usize {
        self.config.control_points
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn previous(&self) -> &[Vec3] {
        &self.previous
    }

    pub fn root_normals(&self) -> &[Vec3] {
        &self.root_normals
    }

    /// Surface samples the strands were seeded from, empty for explicit chains.
    pub fn samples(&self) -> &[SurfaceSample] {
        &self.samples
    }

    pub fn strand(&self, s: usize) -> &[Vec3] {
        let n = self.config.control_points;
        &self.positions[s * n..(s + 1) * n]
    }

    pub fn strands(&self) -> std::slice::ChunksExact<'_, Vec3> {
        self.positions.chunks_exact(self.config.control_points)
    }

    pub fn geometry(&self) -> &GeometryData {
        &self.geometry
    }

    /// Pins control point 0 of every strand to its fed root. Both the current
    /// and the previous position are written so the root carries no velocity.
    pub fn set_roots(&mut self, roots: &[StrandRoot]) {
        assert_eq!(
            roots.len(),
            self.strand_count(),
            "root feed must cover every strand"
        );
        let n = self.config.control_points;
        for (s, root) in roots.iter().enumerate() {
            self.positions[s * n] = root.position;
            self.previous[s * n] = root.position;
            self.root_normals[s] = safe_normalize(root.normal, FALLBACK_AXIS);
        }
    }

    /// Current roots, as a feed that leaves the batch unchanged.
    pub fn roots(&self) -> Vec<StrandRoot> {
        self.strands()
            .zip(&self.root_normals)
            .map(|(chain, &normal)| StrandRoot::new(chain[0], normal))
            .collect()
    }

    pub(crate) fn state_mut(&mut self) -> (&BatchConfig, &mut [Vec3], &mut [Vec3], &[Vec3]) {
        (
            &self.config,
            &mut self.positions,
            &mut self.previous,
            &self.root_normals,
        )
    }

    /// Rebuilds the output geometry from the current control points.
    pub fn synthesize(&mut self) -> &GeometryData {
        meshing::synthesize(
            &self.config,
            &self.cross_section,
            &self.positions,
            &self.root_normals,
            &mut self.geometry,
        );
        &self.geometry
    }
}
