//! Frame sequencing of every strand batch in the bevy world.
//!
//! Each frame runs, in order: the host skinning systems (in
//! [`StrandSet::RootFeed`]), root application and force refresh, integration,
//! then mesh writes. Mesh writes finish inside `Update`, before the render
//! world extracts.

use bevy::log::{debug, warn};
use bevy::math::Affine3A;
use bevy::prelude::*;
use bevy_gizmos::gizmos::Gizmos;
use bevy_gizmos::GizmoPlugin;
use strand_core::force::ForceSet;
use strand_core::{ForceRegistry, FrameParams, RootFeed, StrandRoot, StrandSimulation};

use crate::bevy_mesh::write_geometry;
use crate::{DebugFlags, VisualDebug};

#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrandSet {
    /// the host writes [`StrandRoots`] here
    RootFeed,
    RefreshForces,
    Simulate,
    WriteMeshes,
}

/// Registry and active forces shared by every batch.
#[derive(Resource, Default)]
pub struct StrandForces {
    pub registry: ForceRegistry,
    pub set: ForceSet,
}

#[derive(Resource, Copy, Clone, Debug)]
pub struct StrandFrameSettings {
    pub freeze: bool,
    pub time_scale: f32,
    /// step with a constant dt instead of the frame time
    pub fixed_dt: Option<f32>,
}

impl Default for StrandFrameSettings {
    fn default() -> Self {
        Self {
            freeze: false,
            time_scale: 1.,
            fixed_dt: None,
        }
    }
}

/// Simulation clock, advanced once per frame before the root feed.
#[derive(Resource, Copy, Clone, Debug, Default)]
pub struct StrandClock {
    pub time: f32,
    pub dt: f32,
}

impl StrandClock {
    pub fn params(&self, settings: &StrandFrameSettings) -> FrameParams {
        FrameParams {
            dt: self.dt,
            time: self.time,
            freeze: settings.freeze,
        }
    }
}

#[derive(Component)]
pub struct StrandBatchComponent {
    simulation: StrandSimulation,
    reprojection: Option<Affine3A>,
}

impl StrandBatchComponent {
    pub fn new(simulation: StrandSimulation) -> Self {
        Self {
            simulation,
            reprojection: None,
        }
    }

    pub fn simulation(&self) -> &StrandSimulation {
        &self.simulation
    }
}

/// Per-frame root feed of a batch entity. Without it the roots stay where the
/// batch was seeded.
#[derive(Component, Clone, Debug, Default)]
pub struct StrandRoots(pub Vec<StrandRoot>);

pub struct StrandsPlugin;

impl Plugin for StrandsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StrandForces>()
            .init_resource::<StrandFrameSettings>()
            .init_resource::<StrandClock>()
            .configure_sets(
                Update,
                (
                    StrandSet::RootFeed,
                    StrandSet::RefreshForces,
                    StrandSet::Simulate,
                    StrandSet::WriteMeshes,
                )
                    .chain(),
            )
            .add_systems(Update, tick_clock.before(StrandSet::RootFeed))
            .add_systems(
                Update,
                (apply_roots, refresh_forces)
                    .chain()
                    .in_set(StrandSet::RefreshForces),
            )
            .add_systems(Update, simulate.in_set(StrandSet::Simulate))
            .add_systems(Update, write_meshes.in_set(StrandSet::WriteMeshes));
    }
}

fn tick_clock(time: Res<Time>, settings: Res<StrandFrameSettings>, mut clock: ResMut<StrandClock>) {
    let dt = settings.fixed_dt.unwrap_or_else(|| time.delta_secs()) * settings.time_scale;
    if !settings.freeze {
        clock.time += dt;
    }
    clock.dt = dt;
}

type RootFeedQuery<'a> = (
    Entity,
    &'a mut StrandBatchComponent,
    &'a GlobalTransform,
    Option<&'a StrandRoots>,
);

fn apply_roots(mut batches: Query<RootFeedQuery>) {
    for (entity, mut batch, transform, roots) in batches.iter_mut() {
        let strands = batch.simulation.batch().strand_count();
        let roots = match roots {
            Some(roots) if roots.0.len() == strands => roots.0.clone(),
            Some(roots) => {
                warn!(
                    "strand batch {entity}: root feed has {} roots for {strands} strands, skipping",
                    roots.0.len()
                );
                continue;
            }
            None => batch.simulation.batch().roots(),
        };
        let feed = RootFeed {
            local_to_world: transform.affine(),
            roots: &roots,
        };
        batch.reprojection = batch.simulation.apply_roots(&feed);
    }
}

fn refresh_forces(
    forces: Res<StrandForces>,
    clock: Res<StrandClock>,
    settings: Res<StrandFrameSettings>,
    mut batches: Query<&mut StrandBatchComponent>,
) {
    let params = clock.params(&settings);
    for mut batch in batches.iter_mut() {
        let generation = batch.simulation.layout().map(|l| l.generation());
        batch.simulation.refresh_forces(&forces.set, &params);
        if generation != Some(forces.set.generation()) {
            debug!("strand forces re-laid out: {} instances", forces.set.len());
        }
    }
}

fn simulate(
    clock: Res<StrandClock>,
    settings: Res<StrandFrameSettings>,
    mut batches: Query<&mut StrandBatchComponent>,
) {
    let params = clock.params(&settings);
    for mut batch in batches.iter_mut() {
        let batch = &mut *batch;
        let reprojection = batch.reprojection.take();
        batch.simulation.advance(reprojection, &params);
    }
}

fn write_meshes(
    mut batches: Query<(&mut StrandBatchComponent, Option<&Mesh3d>)>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (mut batch, mesh) in batches.iter_mut() {
        let geometry = batch.simulation.synthesize();
        if let Some(mesh) = mesh.and_then(|handle| meshes.get_mut(&handle.0)) {
            write_geometry(mesh, geometry);
        }
    }
}

/// Gizmo overlay of every batch, toggled through [`DebugFlags`].
pub struct StrandsDebugPlugin;

impl Plugin for StrandsDebugPlugin {
    fn build(&self, app: &mut App) {
        if !app.is_plugin_added::<GizmoPlugin>() {
            app.add_plugins(GizmoPlugin);
        }
        app.init_resource::<DebugFlags>()
            .add_systems(Update, draw_debug.after(StrandSet::WriteMeshes));
    }
}

fn draw_debug(
    mut gizmos: Gizmos,
    flags: Res<DebugFlags>,
    batches: Query<(&StrandBatchComponent, &GlobalTransform)>,
) {
    for (batch, transform) in batches.iter() {
        batch.simulation.batch().debug(&mut gizmos, transform, *flags);
    }
}
