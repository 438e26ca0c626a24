use bevy::asset::{AssetLoader, AsyncReadExt, LoadContext};
use bevy::log::{info, LogPlugin};
use bevy::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use strand_mesh::strand_core::{
    Grow, StrandBatch, StrandError, StrandSceneConfig, StrandSimulation, SurfaceSamples,
};
use strand_mesh::{
    surface_from_mesh, to_mesh, StrandBatchComponent, StrandClock, StrandForces,
    StrandFrameSettings, StrandRoots, StrandSet, StrandsPlugin,
};

const FRAMES: usize = 240;
const SEED: u64 = 7;

#[derive(Asset, TypePath)]
struct StrandScene(StrandSceneConfig);

struct StrandSceneLoader;

impl AssetLoader for StrandSceneLoader {
    type Asset = StrandScene;

    type Settings = ();

    type Error = StrandError;

    fn load(
        &self,
        reader: &mut dyn bevy::asset::io::Reader,
        _: &Self::Settings,
        _: &mut LoadContext,
    ) -> impl bevy::utils::ConditionalSendFuture<Output = Result<Self::Asset, Self::Error>> {
        async {
            let mut content = String::new();
            reader
                .read_to_string(&mut content)
                .await
                .map_err(|e| StrandError::Config(e.to_string()))?;
            StrandSceneConfig::from_toml(&content).map(StrandScene)
        }
    }

    fn extensions(&self) -> &[&str] {
        &["toml"]
    }
}

#[derive(Resource)]
struct SceneHandle(Handle<StrandScene>);

/// Root entity of the demo, the emitter the strands grow on.
#[derive(Component)]
struct Emitter;

fn main() {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, TransformPlugin, AssetPlugin::default(), LogPlugin::default()))
        .init_asset::<Mesh>()
        .init_asset::<StrandScene>()
        .register_asset_loader(StrandSceneLoader)
        .add_plugins(StrandsPlugin)
        .insert_resource(StrandFrameSettings {
            fixed_dt: Some(1. / 60.),
            ..default()
        })
        .add_systems(Startup, load_scene)
        .add_systems(Update, spawn_strands.before(StrandSet::RootFeed))
        .add_systems(Update, sway_emitter.in_set(StrandSet::RootFeed));

    app.finish();
    app.cleanup();
    for _ in 0..FRAMES {
        app.update();
    }

    let world = app.world_mut();
    let mut batches = world.query::<&StrandBatchComponent>();
    let mut found = false;
    for batch in batches.iter(world) {
        found = true;
        let sim = batch.simulation();
        let tips: Vec<Vec3> = sim.batch().strands().map(|s| s[s.len() - 1]).collect();
        let lowest = tips.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        println!(
            "{} strands, {} frames, {} vertices, {} indices, lowest tip at y = {lowest:.3}",
            sim.batch().strand_count(),
            sim.frame_count(),
            sim.batch().geometry().vertex_count(),
            sim.batch().geometry().index_count(),
        );
    }
    if !found {
        println!("no strand batch was spawned, check assets/strands.toml");
    }
}

fn load_scene(mut commands: Commands, assets: Res<AssetServer>) {
    commands.insert_resource(SceneHandle(assets.load("strands.toml")));
}

fn spawn_strands(
    mut commands: Commands,
    handle: Option<Res<SceneHandle>>,
    scenes: Res<Assets<StrandScene>>,
    mut forces: ResMut<StrandForces>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let Some(handle) = handle else {
        return;
    };
    let Some(StrandScene(scene)) = scenes.get(&handle.0) else {
        return;
    };
    commands.remove_resource::<SceneHandle>();

    let built = scene.force_set(&forces.registry).and_then(|set| {
        let ground = Mesh::from(Plane3d::default().mesh().size(1., 1.));
        let mut rng = StdRng::seed_from_u64(SEED);
        let sim = surface_from_mesh(&ground, None)?
            .grow::<SurfaceSamples>(&scene.sampler, &mut rng)
            .and_then(|samples| samples.grow::<StrandBatch>(&scene.batch, &mut ()))
            .and_then(|batch| batch.grow::<StrandSimulation>(&(), &mut ()))?;
        Ok((set, sim))
    });
    let (set, sim) = match built {
        Ok(built) => built,
        Err(e) => {
            error!("could not build the strand scene: {e}");
            return;
        }
    };

    info!("spawning {} strands under {} forces", sim.batch().strand_count(), set.len());
    forces.set = set;
    let roots = sim.batch().roots();
    let mesh = meshes.add(to_mesh(sim.batch().geometry()));
    commands.spawn((
        Emitter,
        StrandBatchComponent::new(sim),
        StrandRoots(roots),
        Mesh3d(mesh),
        Transform::default(),
    ));
}

/// Drags the emitter around a circle so the strands trail behind it.
fn sway_emitter(clock: Res<StrandClock>, mut emitters: Query<&mut Transform, With<Emitter>>) {
    for mut transform in emitters.iter_mut() {
        let phase = clock.time * 2.;
        transform.translation = Vec3::new(phase.cos(), 0., phase.sin()) * 0.3;
    }
}
