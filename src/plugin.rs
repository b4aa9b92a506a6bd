use crate::{
    scatter::{advance_scatter_tasks, ScatterBudget},
    terrain::{LodTerrain, TerrainChunkEntity, TerrainChunkMeshes, TerrainViewer},
};
use bevy::prelude::*;

/// The plugin for the lod terrain.
///
/// Each frame the chunks of every [`LodTerrain`] are re-evaluated against the first
/// [`TerrainViewer`], the changed chunk meshes are uploaded and pending scatter tasks
/// are advanced by their [`ScatterBudget`].
#[derive(Default)]
pub struct TerrainLodPlugin {
    pub scatter_budget: ScatterBudget,
}

impl Plugin for TerrainLodPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.scatter_budget).add_systems(
            Update,
            (
                (update_terrain_lod, sync_chunk_meshes).chain(),
                advance_scatter_tasks,
            ),
        );
    }
}

/// Updates the level of detail of all terrains for the position of the viewer.
pub fn update_terrain_lod(
    viewers: Query<&GlobalTransform, With<TerrainViewer>>,
    mut terrains: Query<(&GlobalTransform, &mut LodTerrain)>,
) {
    let Some(viewer) = viewers.iter().next() else {
        return;
    };

    for (transform, mut terrain) in &mut terrains {
        let local = transform
            .affine()
            .inverse()
            .transform_point3(viewer.translation());

        let threshold_distance = terrain.threshold_distance;
        let update = terrain.mesh.update(local.x, local.z, threshold_distance);

        if !update.is_empty() {
            debug!(
                "Regenerated {} terrain chunks and stitched {} edges.",
                update.regenerated.len(),
                update.stitched_edges
            );

            terrain.pending.extend(update.changed);
        }
    }
}

/// Spawns the chunk entities of new terrains and uploads the meshes of changed chunks.
pub fn sync_chunk_meshes(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut terrains: Query<(Entity, &mut LodTerrain, &mut TerrainChunkMeshes)>,
) {
    for (entity, mut terrain, mut chunk_meshes) in &mut terrains {
        if chunk_meshes.is_empty() {
            let terrain = &mut *terrain;

            for chunk in terrain.mesh.chunks() {
                let coordinate = chunk.coordinate();
                let Some(mesh) = terrain.mesh.chunk_mesh(coordinate) else {
                    continue;
                };
                let mesh = meshes.add(mesh);

                let chunk_entity = commands
                    .spawn((
                        Name::new(format!("chunk_{coordinate}")),
                        TerrainChunkEntity(coordinate),
                        Mesh3d(mesh.clone()),
                        MeshMaterial3d(terrain.material.clone()),
                    ))
                    .id();
                commands.entity(entity).add_child(chunk_entity);

                chunk_meshes.chunks.insert(coordinate, (chunk_entity, mesh));
            }

            terrain.pending.clear();
            continue;
        }

        if terrain.pending.is_empty() {
            continue;
        }

        let terrain = &mut *terrain;

        for coordinate in std::mem::take(&mut terrain.pending) {
            let (Some(handle), Some(mesh)) = (
                chunk_meshes.mesh(coordinate),
                terrain.mesh.chunk_mesh(coordinate),
            ) else {
                continue;
            };

            meshes.insert(handle.id(), mesh);
        }
    }
}
