//! Stitching of the seams between neighbouring chunks of different detail.
//!
//! The lattice guarantees that every vertex of the coarser chunk along a shared edge also
//! exists in the finer chunk. The remaining vertices of the finer chunk are snapped onto the
//! straight line between the enclosing coarse vertices, so both sides describe the same
//! polyline and no crack opens up.

use crate::{
    math::inverse_mix,
    terrain_data::{ChunkCoordinate, ChunkEdge, ElevationSampler, TerrainChunk, TerrainSurface},
};
use bevy::math::Vec3;
use std::fmt;

/// The relative tolerance used when comparing the heights of two seam sides.
const SEAM_TOLERANCE: f32 = 1e-4;

/// A vertex on the edge of a chunk, that does not lie on the edge of its neighbour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeamMismatch {
    pub chunk: ChunkCoordinate,
    pub neighbour: ChunkCoordinate,
    pub position: Vec3,
    /// The height of the neighbour's edge at the vertex position.
    pub neighbour_height: f32,
}

impl fmt::Display for SeamMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vertex {} of chunk {} is off the edge of chunk {} (height {})",
            self.position, self.chunk, self.neighbour, self.neighbour_height
        )
    }
}

impl TerrainChunk {
    /// Aligns the vertices of the `edge` with the neighbour across it.
    ///
    /// If the neighbour is coarser, the intermediate vertices are snapped onto its edge,
    /// otherwise the edge is reset to the raw surface samples.
    pub(crate) fn stitch_edge(
        &mut self,
        edge: ChunkEdge,
        neighbour_lod: u32,
        surface: &TerrainSurface,
    ) {
        let cells = self.vertex_grid.cells();

        if neighbour_lod <= self.lod {
            if self.stitched.contains(edge.mask()) {
                for k in 0..=cells {
                    let (column, row) = edge.vertex(k, cells);
                    let position = self.vertex_grid.position_mut(column, row);
                    position.y = surface.elevation_at(position.x, position.z);
                }

                self.stitched.remove(edge.mask());
            }

            return;
        }

        // the count of fine cells per coarse cell of the neighbour
        let ratio = 1 << (neighbour_lod - self.lod);

        for k0 in (0..cells).step_by(ratio as usize) {
            let k1 = k0 + ratio;

            let (column, row) = edge.vertex(k0, cells);
            let start = self.vertex_grid.position(column, row);
            let (column, row) = edge.vertex(k1, cells);
            let end = self.vertex_grid.position(column, row);

            let start_height = surface.elevation_at(start.x, start.z);
            let end_height = surface.elevation_at(end.x, end.z);

            let (column, row) = edge.vertex(k0, cells);
            self.vertex_grid.position_mut(column, row).y = start_height;
            let (column, row) = edge.vertex(k1, cells);
            self.vertex_grid.position_mut(column, row).y = end_height;

            for k in k0 + 1..k1 {
                let (column, row) = edge.vertex(k, cells);
                let position = self.vertex_grid.position_mut(column, row);
                let t = inverse_mix(edge.along(start), edge.along(end), edge.along(*position));

                position.y = start_height + (end_height - start_height) * t;
            }
        }

        self.stitched.insert(edge.mask());
    }

    /// Evaluates the polyline formed by the vertices of the `edge` at the coordinate `along` it.
    pub(crate) fn edge_height_at(&self, edge: ChunkEdge, along: f32) -> f32 {
        let positions: Vec<Vec3> = self.vertex_grid.edge_positions(edge).collect();

        let next = positions
            .partition_point(|&position| edge.along(position) < along)
            .clamp(1, positions.len() - 1);
        let (start, end) = (positions[next - 1], positions[next]);

        start.y + (end.y - start.y) * inverse_mix(edge.along(start), edge.along(end), along)
    }
}

/// Checks that every vertex on the shared edge of both chunks lies on the edge of the other.
pub(crate) fn find_seam_mismatch(
    chunk: &TerrainChunk,
    edge: ChunkEdge,
    neighbour: &TerrainChunk,
) -> Option<SeamMismatch> {
    let check = |from: &TerrainChunk, from_edge: ChunkEdge, to: &TerrainChunk| {
        from.vertex_grid
            .edge_positions(from_edge)
            .find_map(|position| {
                let height = to.edge_height_at(from_edge.opposite(), from_edge.along(position));
                let tolerance = SEAM_TOLERANCE * (1.0 + position.y.abs().max(height.abs()));

                ((height - position.y).abs() > tolerance).then_some(SeamMismatch {
                    chunk: from.coordinate,
                    neighbour: to.coordinate,
                    position,
                    neighbour_height: height,
                })
            })
    };

    check(chunk, edge, neighbour).or_else(|| check(neighbour, edge.opposite(), chunk))
}
