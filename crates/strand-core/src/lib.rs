pub mod config;
pub mod error;
pub mod force;
pub mod integrate;
pub mod meshing;
pub mod orchestrator;
pub mod sampling;
pub mod strand;
pub mod utils;

pub use config::{
    BatchConfig, CollisionSphere, FrameParams, GridConfig, NormalMode, SamplerConfig,
    StrandSceneConfig,
};
pub use error::StrandError;
pub use force::spec::ForceSpec;
pub use force::{
    FieldSource, FieldType, FieldValue, ForceContext, ForceKind, ForceLayout, ForceRegistry,
    ForceSchema, ForceSet,
};
pub use meshing::GeometryData;
pub use orchestrator::{RootFeed, StrandSimulation};
pub use sampling::{SkinWeights, SurfaceSample, SurfaceSamples, TriangleSurface};
pub use strand::{StrandBatch, StrandRoot};

/// One stage of the setup pipeline: each phase is built from the previous one.
pub trait StrandPipelinePhase: Sized {
    type Previous;
    type Config;
    type Builder;
    fn generate_from(
        prev: Self::Previous,
        config: &Self::Config,
        builder: &mut Self::Builder,
    ) -> Result<Self, StrandError>;
}

impl StrandPipelinePhase for SurfaceSamples {
    type Previous = TriangleSurface;
    type Config = SamplerConfig;
    type Builder = rand::rngs::StdRng;
    fn generate_from(
        prev: Self::Previous,
        config: &Self::Config,
        rng: &mut Self::Builder,
    ) -> Result<Self, StrandError> {
        Ok(sampling::poisson_disk(&prev, config, rng))
    }
}

impl StrandPipelinePhase for StrandBatch {
    type Previous = SurfaceSamples;
    type Config = BatchConfig;
    type Builder = ();
    fn generate_from(
        prev: Self::Previous,
        config: &Self::Config,
        _: &mut Self::Builder,
    ) -> Result<Self, StrandError> {
        StrandBatch::from_samples(config.clone(), &prev)
    }
}

impl StrandPipelinePhase for StrandSimulation {
    type Previous = StrandBatch;
    type Config = ();
    type Builder = ();
    fn generate_from(
        prev: Self::Previous,
        _: &Self::Config,
        _: &mut Self::Builder,
    ) -> Result<Self, StrandError> {
        Ok(StrandSimulation::new(prev))
    }
}

pub trait Grow {
    fn grow<Next>(
        self,
        config: &Next::Config,
        builder: &mut Next::Builder,
    ) -> Result<Next, StrandError>
    where
        Next: StrandPipelinePhase<Previous = Self>;
}

impl<T> Grow for T {
    fn grow<Next>(
        self,
        config: &<Next as StrandPipelinePhase>::Config,
        builder: &mut <Next as StrandPipelinePhase>::Builder,
    ) -> Result<Next, StrandError>
    where
        Next: StrandPipelinePhase<Previous = T>,
    {
        Next::generate_from(self, config, builder)
    }
}
