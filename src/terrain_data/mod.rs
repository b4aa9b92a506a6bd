//! This module contains the data structures of the terrain:
//! the [`HeightField`], the [`LodTerrainMesh`] and its [`TerrainChunk`]s.
//!
//! # Explanation
//! The [`HeightField`] wraps the elevation raster of the terrain and provides continuous,
//! clamped elevation lookups. It is immutable and shared (`Arc`) by every consumer.
//!
//! The [`LodTerrainMesh`] partitions the square footprint of the terrain into a fixed grid
//! of chunks. Each frame it re-evaluates the level of detail of every chunk from the
//! distance to the viewer, regenerates the geometry of the chunks that changed their level
//! and afterwards stitches the seams between chunks of different levels, so that the
//! surface stays free of cracks.

pub mod chunk;
pub mod height_field;
pub mod lod_mesh;
mod seam;
pub mod surface;

pub use chunk::{ChunkCoordinate, ChunkEdge, EdgeMask, TerrainChunk, VertexGrid};
pub use height_field::HeightField;
pub use lod_mesh::{lod_for_distance, LodTerrainMesh, LodUpdate, DEFAULT_HYSTERESIS, MAX_LOD_COUNT};
pub use seam::SeamMismatch;
pub use surface::TerrainSurface;

/// The capability to look up the elevation of the terrain at any horizontal position.
///
/// This is the only contract the terrain and the scatter placement depend on,
/// so any raster source (decoded image, procedural function) can be plugged in.
pub trait ElevationSampler {
    /// Returns the elevation at the position (`x`, `z`).
    fn elevation_at(&self, x: f32, z: f32) -> f32;
}
