//! Per-frame sequencing of one batch: roots, forces, integration, geometry.

use glam::Affine3A;

use crate::config::FrameParams;
use crate::force::{EvalContext, ForceContext, ForceLayout, ForceSet};
use crate::integrate::{step_batch, StepForces, StepParams};
use crate::meshing::GeometryData;
use crate::strand::{StrandBatch, StrandRoot};

/// What the skinning collaborator hands over every frame.
#[derive(Copy, Clone, Debug)]
pub struct RootFeed<'a> {
    pub local_to_world: Affine3A,
    /// one root per strand, in batch order
    pub roots: &'a [StrandRoot],
}

pub struct StrandSimulation {
    batch: StrandBatch,
    layout: Option<ForceLayout>,
    force_buffer: Vec<f32>,
    local_to_world: Affine3A,
    last_transform: Option<Affine3A>,
    frame: u64,
}

impl StrandSimulation {
    pub fn new(batch: StrandBatch) -> Self {
        Self {
            batch,
            layout: None,
            force_buffer: Vec::new(),
            local_to_world: Affine3A::IDENTITY,
            last_transform: None,
            frame: 0,
        }
    }

    pub fn batch(&self) -> &StrandBatch {
        &self.batch
    }

    pub fn layout(&self) -> Option<&ForceLayout> {
        self.layout.as_ref()
    }

    /// Flattened force records of the current frame.
    pub fn force_buffer(&self) -> &[f32] {
        &self.force_buffer
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Writes the fed roots and returns the reprojection for this frame: the
    /// inverse of the incremental transform since the previous feed.
    pub fn apply_roots(&mut self, feed: &RootFeed) -> Option<Affine3A> {
        self.batch.set_roots(feed.roots);
        let reprojection = self.last_transform.and_then(|old| {
            let delta = old.inverse() * feed.local_to_world;
            (!delta.abs_diff_eq(Affine3A::IDENTITY, 1e-7)).then(|| delta.inverse())
        });
        self.last_transform = Some(feed.local_to_world);
        self.local_to_world = feed.local_to_world;
        reprojection
    }

    /// Rebuilds the layout when the set changed and refills the buffer.
    pub fn refresh_forces(&mut self, forces: &ForceSet, params: &FrameParams) {
        let stale = self
            .layout
            .as_ref()
            .map_or(true, |layout| layout.generation() != forces.generation());
        if stale {
            self.layout = Some(ForceLayout::new(forces));
        }
        let ctx = self.force_context(params);
        if let Some(layout) = &self.layout {
            layout.flatten_into(forces, &ctx, &mut self.force_buffer);
        }
    }

    fn force_context(&self, params: &FrameParams) -> ForceContext {
        ForceContext {
            time: params.time,
            dt: params.dt,
            frame: self.frame,
            local_to_world: self.local_to_world,
        }
    }

    /// Integrates every strand, unless the frame is frozen.
    pub fn advance(&mut self, reprojection: Option<Affine3A>, params: &FrameParams) {
        if params.freeze {
            return;
        }
        let ctx = EvalContext::new(&self.force_context(params));
        let step = StepParams {
            dt: params.dt,
            forces: StepForces {
                layout: self.layout.as_ref(),
                buffer: &self.force_buffer,
                ctx: &ctx,
            },
            reprojection,
        };
        step_batch(&mut self.batch, &step);
    }

    /// Rebuilds the mesh streams; this closes the frame.
    pub fn synthesize(&mut self) -> &GeometryData {
        self.frame += 1;
        self.batch.synthesize()
    }

    /// One full frame. The returned geometry stays borrowed until the caller
    /// is done with it, so the next frame cannot overwrite it early.
    pub fn frame(
        &mut self,
        forces: &ForceSet,
        feed: &RootFeed,
        params: &FrameParams,
    ) -> &GeometryData {
        let reprojection = self.apply_roots(feed);
        self.refresh_forces(forces, params);
        self.advance(reprojection, params);
        self.synthesize()
    }
}
