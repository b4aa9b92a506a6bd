use crate::{
    error::{TerrainError, TerrainResult},
    formats::{DecorationConfig, SceneDescriptor},
    scatter::{ScatterJob, ScatterTask},
    terrain::{LodTerrain, TerrainConfig},
    terrain_data::{HeightField, LodTerrainMesh, TerrainSurface},
};
use bevy::prelude::*;
use std::sync::Arc;

/// The state shared by the initializer steps of a [`TerrainSceneBuilder`].
#[derive(Clone, Debug, Default)]
pub struct SceneContext {
    /// The terrain spawned by a previous step.
    pub terrain: Option<Entity>,
    /// The surface of that terrain, that decorations are placed on.
    pub surface: Option<TerrainSurface>,
}

type SceneStep = Box<dyn FnOnce(&mut World, &mut SceneContext) -> TerrainResult<()> + Send + Sync>;

/// Collects the initializer steps of a scene and applies them in insertion order.
///
/// ```no_run
/// # use bevy::prelude::*;
/// # use bevy_terrain_lod::prelude::*;
/// # use std::sync::Arc;
/// fn setup(mut commands: Commands) {
///     let height_field = Arc::new(HeightField::flat(65, 65, 1.0, 0.5).unwrap());
///
///     TerrainSceneBuilder::new()
///         .with_terrain(height_field, TerrainConfig::default(), Handle::default(), default())
///         .with_decoration(DecorationConfig::tree(), 7)
///         .queue(&mut commands);
/// }
/// ```
#[derive(Default)]
pub struct TerrainSceneBuilder {
    steps: Vec<SceneStep>,
}

impl TerrainSceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the builder for the terrain and all decorations of the descriptor.
    ///
    /// Every decoration receives its own seed derived from the descriptor's seed.
    pub fn from_descriptor(
        descriptor: &SceneDescriptor,
        height_field: Arc<HeightField>,
        material: Handle<StandardMaterial>,
        transform: Transform,
    ) -> Self {
        let builder = Self::new().with_terrain(
            height_field,
            descriptor.terrain.clone(),
            material,
            transform,
        );

        descriptor
            .decorations
            .iter()
            .enumerate()
            .fold(builder, |builder, (index, decoration)| {
                builder.with_decoration(decoration.clone(), descriptor.seed.wrapping_add(index as u64))
            })
    }

    /// Appends a custom step.
    pub fn with_step(
        mut self,
        step: impl FnOnce(&mut World, &mut SceneContext) -> TerrainResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Appends a step, that spawns the lod terrain.
    pub fn with_terrain(
        self,
        height_field: Arc<HeightField>,
        config: TerrainConfig,
        material: Handle<StandardMaterial>,
        transform: Transform,
    ) -> Self {
        self.with_step(move |world, context| {
            let mesh = LodTerrainMesh::from_config(height_field, &config)?;
            let surface = mesh.surface().clone();

            let terrain = world
                .spawn((
                    Name::new("terrain"),
                    LodTerrain::new(mesh, config.threshold_distance, material),
                    transform,
                ))
                .id();

            context.terrain = Some(terrain);
            context.surface = Some(surface);

            Ok(())
        })
    }

    /// Appends a step, that scatters the decoration over the previously spawned terrain.
    ///
    /// The model is loaded with the [`AssetServer`], if there is one.
    pub fn with_decoration(self, decoration: DecorationConfig, seed: u64) -> Self {
        self.with_step(move |world, context| {
            let (Some(terrain), Some(surface)) = (context.terrain, context.surface.clone()) else {
                return Err(TerrainError::InvalidConfig(format!(
                    "the decoration {} requires a terrain to be spawned first",
                    decoration.name
                )));
            };

            let job = ScatterJob::new(
                decoration.spec,
                surface.footprint(),
                decoration.count,
                decoration.max_attempts,
            )?;

            let scene = world
                .get_resource::<AssetServer>()
                .map(|asset_server| {
                    asset_server.load(GltfAssetLabel::Scene(0).from_asset(decoration.model.clone()))
                })
                .unwrap_or_default();

            let task = world
                .spawn((
                    Name::new(decoration.name),
                    ScatterTask::new(job, seed, surface, scene),
                ))
                .id();
            world.entity_mut(terrain).add_child(task);

            Ok(())
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Applies all steps in insertion order and stops at the first failing one.
    pub fn apply(self, world: &mut World) -> TerrainResult<SceneContext> {
        let mut context = SceneContext::default();

        for step in self.steps {
            step(world, &mut context)?;
        }

        Ok(context)
    }

    /// Defers [`apply`](Self::apply) until the commands are applied.
    pub fn queue(self, commands: &mut Commands) {
        commands.queue(move |world: &mut World| {
            let step_count = self.len();

            match self.apply(world) {
                Ok(_) => info!("Built the terrain scene in {step_count} steps."),
                Err(error) => error!("Failed to build the terrain scene: {error}."),
            }
        });
    }
}
