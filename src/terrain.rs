//! Types to configure and spawn lod terrains.

use crate::{
    error::{TerrainError, TerrainResult},
    terrain_data::{ChunkCoordinate, LodTerrainMesh, DEFAULT_HYSTERESIS},
};
use bevy::{prelude::*, utils::HashMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The parameters of a lod terrain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// The side length of the square terrain footprint.
    pub width: f32,
    /// The vertical scale applied to the elevations of the height field.
    pub height: f32,
    /// The count of detail levels.
    pub lod_count: u32,
    /// The count of chunks along each side of the footprint.
    pub subdivisions: u32,
    /// The width of each distance band, that maps to one level of detail.
    pub threshold_distance: f32,
    /// The hysteresis margin as a fraction of the threshold distance.
    pub hysteresis: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            width: 3000.0,
            height: 450.0,
            lod_count: 5,
            subdivisions: 16,
            threshold_distance: 80.0,
            hysteresis: DEFAULT_HYSTERESIS,
        }
    }
}

impl TerrainConfig {
    /// Checks the parameters, that are not already validated by [`LodTerrainMesh::new`].
    pub fn validate(&self) -> TerrainResult<()> {
        if !self.threshold_distance.is_finite() || self.threshold_distance <= 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "the threshold distance has to be positive, got {}",
                self.threshold_distance
            )));
        }
        if !(0.0..=0.5).contains(&self.hysteresis) {
            return Err(TerrainError::InvalidConfig(format!(
                "the hysteresis has to be in [0, 0.5], got {}",
                self.hysteresis
            )));
        }

        Ok(())
    }
}

/// Marks the entity (usually the camera), whose position drives the level of detail.
#[derive(Clone, Copy, Debug, Default, Component)]
pub struct TerrainViewer;

/// Marks the entity, that renders a single chunk of a [`LodTerrain`].
#[derive(Clone, Copy, Debug, Component)]
pub struct TerrainChunkEntity(pub ChunkCoordinate);

/// The mesh handles and entities of the chunks of a [`LodTerrain`].
#[derive(Default, Component)]
pub struct TerrainChunkMeshes {
    pub(crate) chunks: HashMap<ChunkCoordinate, (Entity, Handle<Mesh>)>,
}

impl TerrainChunkMeshes {
    pub fn entity(&self, coordinate: ChunkCoordinate) -> Option<Entity> {
        self.chunks.get(&coordinate).map(|&(entity, _)| entity)
    }

    pub fn mesh(&self, coordinate: ChunkCoordinate) -> Option<&Handle<Mesh>> {
        self.chunks.get(&coordinate).map(|(_, mesh)| mesh)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A terrain, whose chunks are tessellated according to their distance to the [`TerrainViewer`].
///
/// The terrain is placed with its footprint `[0, width] x [0, width]` in the local space of
/// its transform.
#[derive(Component)]
#[require(Transform, Visibility, TerrainChunkMeshes)]
pub struct LodTerrain {
    pub(crate) mesh: LodTerrainMesh,
    pub(crate) threshold_distance: f32,
    pub(crate) material: Handle<StandardMaterial>,
    /// The chunks, whose geometry changed since the last upload.
    pub(crate) pending: BTreeSet<ChunkCoordinate>,
}

impl LodTerrain {
    pub fn new(
        mesh: LodTerrainMesh,
        threshold_distance: f32,
        material: Handle<StandardMaterial>,
    ) -> Self {
        Self {
            mesh,
            threshold_distance,
            material,
            pending: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn mesh(&self) -> &LodTerrainMesh {
        &self.mesh
    }

    #[inline]
    pub fn threshold_distance(&self) -> f32 {
        self.threshold_distance
    }

    pub fn set_threshold_distance(&mut self, threshold_distance: f32) {
        self.threshold_distance = threshold_distance;
    }

    #[inline]
    pub fn material(&self) -> &Handle<StandardMaterial> {
        &self.material
    }
}
