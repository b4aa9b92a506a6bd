use crate::{
    scatter::{ScatterJob, ScatterProgress},
    terrain_data::TerrainSurface,
};
use bevy::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

/// Marks an entity spawned for a placed decoration instance.
#[derive(Clone, Copy, Debug, Default, Component)]
pub struct Decoration;

/// The count of scatter slots every [`ScatterTask`] may fill per frame.
#[derive(Clone, Copy, Debug, Resource)]
pub struct ScatterBudget {
    pub slots_per_frame: usize,
}

impl Default for ScatterBudget {
    fn default() -> Self {
        Self {
            slots_per_frame: 64,
        }
    }
}

/// Places the instances of one decoration type over multiple frames.
///
/// Each accepted instance is spawned as a child of the task entity with a clone of the
/// `scene`. Once the job is finished, the component is removed again.
#[derive(Component)]
#[require(Transform, Visibility)]
pub struct ScatterTask {
    job: ScatterJob,
    rng: StdRng,
    surface: TerrainSurface,
    scene: Handle<Scene>,
    spawned: usize,
}

impl ScatterTask {
    pub fn new(job: ScatterJob, seed: u64, surface: TerrainSurface, scene: Handle<Scene>) -> Self {
        Self {
            job,
            rng: StdRng::seed_from_u64(seed),
            surface,
            scene,
            spawned: 0,
        }
    }

    #[inline]
    pub fn job(&self) -> &ScatterJob {
        &self.job
    }
}

pub fn advance_scatter_tasks(
    mut commands: Commands,
    budget: Res<ScatterBudget>,
    mut tasks: Query<(Entity, &mut ScatterTask, Option<&Name>)>,
) {
    for (entity, mut task, name) in &mut tasks {
        let task = &mut *task;
        let progress = task.job.step(&mut task.rng, &task.surface, budget.slots_per_frame);

        let scene = task.scene.clone();
        let new_instances = &task.job.instances()[task.spawned..];

        if !new_instances.is_empty() {
            commands.entity(entity).with_children(|parent| {
                for instance in new_instances {
                    parent.spawn((Decoration, SceneRoot(scene.clone()), instance.transform()));
                }
            });
        }
        task.spawned = task.job.instances().len();

        if let ScatterProgress::Finished { placed, skipped } = progress {
            let name = name.map_or("decoration", Name::as_str);
            info!("Scattered {placed} instances of {name}, skipped {skipped} slots.");

            commands.entity(entity).remove::<ScatterTask>();
        }
    }
}
