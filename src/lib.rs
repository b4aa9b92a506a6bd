//! This crate renders heightfield terrains with a chunked level of detail scheme
//! and scatters decorations like trees and rocks over them.
//!
//! # Background
//! There are two questions every terrain of this kind has to answer:
//!
//! ## How to approximate the terrain geometry?
//! Even a moderately sized height map would require millions of vertices to be rendered
//! each frame, if every sample became a vertex.
//! Therefore the terrain footprint is split into a fixed grid of chunks, each of which is
//! tessellated with a density depending on its distance to the viewer.
//! Only chunks that cross a distance band are regenerated, and the seams between chunks of
//! different detail are stitched so that the surface never cracks.
//! See the [`terrain_data`] module for more information.
//!
//! ## How to decorate the terrain?
//! Decorations are placed by rejection sampling: random candidates are drawn and only kept,
//! if they lie within an elevation band and keep their distance to the other instances.
//! The placement is seeded and can be spread over multiple frames.
//! See the [`scatter`] module for more information.

pub mod error;
pub mod formats;
pub mod math;
pub mod plugin;
pub mod scatter;
pub mod spawn;
pub mod terrain;
pub mod terrain_data;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        error::{TerrainError, TerrainResult},
        formats::{load_height_field, DecorationConfig, SceneDescriptor},
        plugin::TerrainLodPlugin,
        scatter::{
            Decoration, PlacedInstance, PlacementSpec, ScatterBudget, ScatterJob, ScatterPlacer,
            ScatterProgress, ScatterTask,
        },
        spawn::{SceneContext, TerrainSceneBuilder},
        terrain::{LodTerrain, TerrainChunkMeshes, TerrainConfig, TerrainViewer},
        terrain_data::{
            ChunkCoordinate, ChunkEdge, ElevationSampler, HeightField, LodTerrainMesh, LodUpdate,
            TerrainSurface,
        },
    };
}
