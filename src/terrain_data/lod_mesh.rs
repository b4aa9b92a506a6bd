use crate::{
    error::{TerrainError, TerrainResult},
    math::{distance_to_rect, Lattice},
    terrain::TerrainConfig,
    terrain_data::{
        chunk::generate_grid_indices,
        seam::{find_seam_mismatch, SeamMismatch},
        ChunkCoordinate, ChunkEdge, HeightField, TerrainChunk, TerrainSurface,
    },
};
use bevy::{
    log::{debug, info, warn},
    math::Vec2,
    prelude::Mesh,
};
use itertools::Itertools;
use ndarray::Array2;
use std::{collections::BTreeSet, sync::Arc};

/// The maximum supported count of detail levels.
///
/// The finest level tessellates each chunk with `2^(MAX_LOD_COUNT - 1)` cells per side.
pub const MAX_LOD_COUNT: u32 = 12;

/// The default hysteresis margin, as a fraction of the threshold distance.
pub const DEFAULT_HYSTERESIS: f32 = 0.05;

/// Maps the distance to a lod by dividing it into bands of `threshold_distance`.
///
/// Nearer bands map to finer detail (lower lod), everything beyond the last band
/// maps to the coarsest lod. The mapping is monotonic in the distance.
#[inline]
pub fn lod_for_distance(distance: f32, threshold_distance: f32, lod_count: u32) -> u32 {
    let band = (distance.max(0.0) / threshold_distance).floor();

    band.min(lod_count.saturating_sub(1) as f32) as u32
}

/// Keeps the current lod while the distance lies within its band widened by the margin.
#[inline]
fn select_lod(current: u32, distance: f32, threshold_distance: f32, margin: f32, lod_count: u32) -> u32 {
    let lower = current as f32 * threshold_distance - margin;
    let upper = (current + 1) as f32 * threshold_distance + margin;
    let coarsest = current + 1 >= lod_count;

    if distance >= lower && (coarsest || distance <= upper) {
        current
    } else {
        lod_for_distance(distance, threshold_distance, lod_count)
    }
}

/// The outcome of a single [`LodTerrainMesh::update`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LodUpdate {
    /// The chunks that changed their lod and were resampled.
    pub regenerated: Vec<ChunkCoordinate>,
    /// The count of edges that were stitched again.
    pub stitched_edges: usize,
    /// All chunks whose geometry changed, including neighbours whose seams were restitched.
    pub changed: Vec<ChunkCoordinate>,
}

impl LodUpdate {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// A heightfield terrain, that is split into a fixed grid of chunks, each of which is
/// tessellated according to its distance to the viewer.
///
/// The footprint `[0, width] x [0, width]` is divided into `subdivisions` x `subdivisions`
/// chunks. A chunk with the lod `l` has `2^(lod_count - 1 - l)` cells per side, so lod 0 is
/// the finest and `lod_count - 1` the coarsest level, which is also the initial one.
///
/// Each call to [`update`](Self::update) runs a two phase protocol:
/// first every chunk whose target lod changed is resampled, afterwards the seams around
/// these chunks are stitched against the new lods of their neighbours.
/// Chunks that keep their lod are not touched, so the cost of an update is proportional
/// to the count of chunks crossing a band boundary.
pub struct LodTerrainMesh {
    surface: TerrainSurface,
    lattice: Lattice,
    lod_count: u32,
    subdivisions: u32,
    hysteresis: f32,
    chunks: Array2<TerrainChunk>,
    /// The shared triangle indices for each lod.
    indices: Vec<Vec<u32>>,
}

impl LodTerrainMesh {
    /// Creates the terrain mesh with all chunks at the coarsest lod.
    ///
    /// The `height` scales the elevations of the height field vertically.
    pub fn new(
        height_field: Arc<HeightField>,
        width: f32,
        height: f32,
        lod_count: u32,
        subdivisions: u32,
    ) -> TerrainResult<Self> {
        if lod_count < 1 || lod_count > MAX_LOD_COUNT {
            return Err(TerrainError::InvalidConfig(format!(
                "the lod count has to be in [1, {MAX_LOD_COUNT}], got {lod_count}"
            )));
        }
        if subdivisions < 1 {
            return Err(TerrainError::InvalidConfig(
                "the terrain needs at least one subdivision".to_string(),
            ));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "the terrain width has to be positive, got {width}"
            )));
        }
        if !height.is_finite() {
            return Err(TerrainError::InvalidConfig(format!(
                "the terrain height has to be finite, got {height}"
            )));
        }

        let lattice = Lattice::new(width, subdivisions, lod_count).ok_or_else(|| {
            TerrainError::InvalidConfig(format!(
                "{subdivisions} subdivisions with {lod_count} lods exceed the vertex lattice"
            ))
        })?;

        let surface = TerrainSurface::new(height_field, width, height);
        let coarsest = lod_count - 1;

        let chunks = Array2::from_shape_fn(
            (subdivisions as usize, subdivisions as usize),
            |(z, x)| {
                let coordinate = ChunkCoordinate::new(x as u32, z as u32);
                TerrainChunk::new(coordinate, subdivisions, &surface, &lattice, coarsest)
            },
        );

        let indices = (0..lod_count)
            .map(|lod| generate_grid_indices(lattice.cells_for_lod(lod)))
            .collect();

        info!(
            "Created lod terrain of width {width} with {subdivisions}x{subdivisions} chunks and {lod_count} levels of detail."
        );

        Ok(Self {
            surface,
            lattice,
            lod_count,
            subdivisions,
            hysteresis: DEFAULT_HYSTERESIS,
            chunks,
            indices,
        })
    }

    /// Creates the terrain mesh from the configuration.
    pub fn from_config(height_field: Arc<HeightField>, config: &TerrainConfig) -> TerrainResult<Self> {
        config.validate()?;

        Ok(Self::new(
            height_field,
            config.width,
            config.height,
            config.lod_count,
            config.subdivisions,
        )?
        .with_hysteresis(config.hysteresis))
    }

    /// Sets the hysteresis margin as a fraction of the threshold distance.
    ///
    /// The value is clamped to `[0, 0.5]`.
    pub fn with_hysteresis(mut self, hysteresis: f32) -> Self {
        // `max` discards NaN
        self.hysteresis = hysteresis.max(0.0).min(0.5);
        self
    }

    #[inline]
    pub fn lod_count(&self) -> u32 {
        self.lod_count
    }

    #[inline]
    pub fn subdivisions(&self) -> u32 {
        self.subdivisions
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.surface.width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.surface.height()
    }

    #[inline]
    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    /// The surface tessellated by this mesh.
    #[inline]
    pub fn surface(&self) -> &TerrainSurface {
        &self.surface
    }

    #[inline]
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn chunk(&self, coordinate: ChunkCoordinate) -> Option<&TerrainChunk> {
        self.chunks.get(coordinate.index())
    }

    /// Iterates over all chunks row by row.
    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.iter()
    }

    /// Builds the renderable mesh of the chunk.
    pub fn chunk_mesh(&self, coordinate: ChunkCoordinate) -> Option<Mesh> {
        let chunk = self.chunk(coordinate)?;

        Some(chunk.to_mesh(&self.indices[chunk.lod as usize], &self.surface, &self.lattice))
    }

    /// Re-evaluates the lod of every chunk for the viewer at (`viewer_x`, `viewer_z`),
    /// regenerates the chunks that changed and stitches the affected seams.
    ///
    /// The distance to a chunk is measured to the nearest point of its bounds and divided
    /// into bands of `threshold_distance`. A chunk only leaves its current band once the
    /// viewer moved past the boundary by the hysteresis margin.
    ///
    /// Invalid thresholds or viewer positions leave the mesh untouched.
    pub fn update(&mut self, viewer_x: f32, viewer_z: f32, threshold_distance: f32) -> LodUpdate {
        let mut update = LodUpdate::default();

        if !threshold_distance.is_finite() || threshold_distance <= 0.0 {
            warn!("Skipped the terrain lod update, invalid threshold distance {threshold_distance}.");
            return update;
        }
        if !viewer_x.is_finite() || !viewer_z.is_finite() {
            warn!("Skipped the terrain lod update, invalid viewer position ({viewer_x}, {viewer_z}).");
            return update;
        }

        let viewer = Vec2::new(viewer_x, viewer_z);
        let margin = self.hysteresis * threshold_distance;

        // phase one: resample every chunk that changed its lod
        for chunk in self.chunks.iter_mut() {
            let distance = distance_to_rect(chunk.bounds, viewer);
            let lod = select_lod(chunk.lod, distance, threshold_distance, margin, self.lod_count);

            if lod != chunk.lod {
                debug!("Chunk {} changed its lod from {} to {lod}.", chunk.coordinate, chunk.lod);

                chunk.regenerate(&self.surface, &self.lattice, lod);
                update.regenerated.push(chunk.coordinate);
            }
        }

        if update.regenerated.is_empty() {
            return update;
        }

        // phase two: stitch both sides of every edge around the regenerated chunks
        let mut edges = BTreeSet::new();

        for &coordinate in &update.regenerated {
            for edge in ChunkEdge::ALL {
                if let Some(neighbour) = self.chunks[coordinate.index()].neighbour(edge) {
                    edges.insert((coordinate, edge));
                    edges.insert((neighbour, edge.opposite()));
                }
            }
        }

        for &(coordinate, edge) in &edges {
            self.stitch(coordinate, edge);
        }

        for &(coordinate, edge) in &edges {
            if let Some(mismatch) = self.seam_mismatch(coordinate, edge) {
                panic!("The terrain tessellation is broken: {mismatch}.");
            }
        }

        update.stitched_edges = edges.len();
        update.changed = update
            .regenerated
            .iter()
            .copied()
            .chain(edges.iter().map(|&(coordinate, _)| coordinate))
            .sorted()
            .dedup()
            .collect();

        update
    }

    fn stitch(&mut self, coordinate: ChunkCoordinate, edge: ChunkEdge) {
        let Some(neighbour) = self.chunks[coordinate.index()].neighbour(edge) else {
            return;
        };

        let neighbour_lod = self.chunks[neighbour.index()].lod;

        self.chunks[coordinate.index()].stitch_edge(edge, neighbour_lod, &self.surface);
    }

    /// Checks the seam between the chunk and its neighbour across the `edge` for cracks.
    ///
    /// Returns `None` if both sides match or there is no neighbour.
    pub fn seam_mismatch(&self, coordinate: ChunkCoordinate, edge: ChunkEdge) -> Option<SeamMismatch> {
        let chunk = self.chunk(coordinate)?;
        let neighbour = self.chunk(chunk.neighbour(edge)?)?;

        find_seam_mismatch(chunk, edge, neighbour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain_data::{ElevationSampler, EdgeMask};
    use itertools::iproduct;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// A bumpy surface, where linear interpolation between coarse vertices
    /// visibly differs from the fine samples.
    fn bumpy_field() -> Arc<HeightField> {
        Arc::new(
            HeightField::from_fn(33, 33, 1.0, |column, row| {
                ((column as f32 * 0.7).sin() + (row as f32 * 0.45).cos()) * 10.0
            })
            .unwrap(),
        )
    }

    fn lods(mesh: &LodTerrainMesh) -> Vec<u32> {
        mesh.chunks().map(TerrainChunk::lod).collect()
    }

    fn assert_crack_free(mesh: &LodTerrainMesh) {
        for chunk in mesh.chunks() {
            for edge in ChunkEdge::ALL {
                assert_eq!(mesh.seam_mismatch(chunk.coordinate(), edge), None);
            }
        }
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let field = bumpy_field();

        for (width, height, lod_count, subdivisions) in [
            (100.0, 1.0, 0, 4),
            (100.0, 1.0, MAX_LOD_COUNT + 1, 4),
            (100.0, 1.0, 3, 0),
            (0.0, 1.0, 3, 4),
            (f32::NAN, 1.0, 3, 4),
            (100.0, f32::INFINITY, 3, 4),
        ] {
            let result = LodTerrainMesh::new(field.clone(), width, height, lod_count, subdivisions);
            assert!(matches!(result, Err(TerrainError::InvalidConfig(_))));
        }
    }

    #[test]
    fn chunks_start_at_the_coarsest_lod() {
        let mesh = LodTerrainMesh::new(bumpy_field(), 64.0, 1.0, 4, 4).unwrap();

        assert_eq!(mesh.chunks().count(), 16);
        assert!(mesh.chunks().all(|chunk| chunk.lod() == 3));
        assert!(mesh.chunks().all(|chunk| chunk.vertex_grid().cells() == 1));
        assert_crack_free(&mesh);
    }

    #[test]
    fn chunks_partition_the_footprint() {
        let mesh = LodTerrainMesh::new(bumpy_field(), 90.0, 1.0, 3, 3).unwrap();

        let area: f32 = mesh
            .chunks()
            .map(|chunk| chunk.bounds().width() * chunk.bounds().height())
            .sum();
        assert!((area - 90.0 * 90.0).abs() < 1e-2);

        let first = mesh.chunk(ChunkCoordinate::new(0, 0)).unwrap().bounds();
        let second = mesh.chunk(ChunkCoordinate::new(1, 0)).unwrap().bounds();
        assert_eq!(first.max.x, second.min.x);
        assert!(mesh.chunk(ChunkCoordinate::new(3, 0)).is_none());
    }

    #[test]
    fn lod_mapping_is_monotonic() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let a: f32 = rng.random_range(0.0..1000.0);
            let b: f32 = rng.random_range(0.0..1000.0);
            let (near, far) = if a < b { (a, b) } else { (b, a) };

            assert!(lod_for_distance(near, 80.0, 5) <= lod_for_distance(far, 80.0, 5));
        }

        assert_eq!(lod_for_distance(0.0, 80.0, 5), 0);
        assert_eq!(lod_for_distance(79.9, 80.0, 5), 0);
        assert_eq!(lod_for_distance(80.0, 80.0, 5), 1);
        assert_eq!(lod_for_distance(1e9, 80.0, 5), 4);
        assert_eq!(lod_for_distance(1e9, 80.0, 1), 0);
    }

    #[test]
    fn viewer_inside_a_chunk_gets_the_finest_lod() {
        // 3 lods, chunks of 10 units, threshold 10
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 80.0, 1.0, 3, 8).unwrap();

        mesh.update(5.0, 5.0, 10.0);

        let near = mesh.chunk(ChunkCoordinate::new(0, 0)).unwrap();
        assert_eq!(near.lod(), 0);
        assert_eq!(near.vertex_grid().cells(), 4);

        // the nearest bound of this chunk is 25 units away
        let middle = mesh.chunk(ChunkCoordinate::new(3, 0)).unwrap();
        assert_eq!(middle.lod(), 2);

        // more than two thresholds away
        let far = mesh.chunk(ChunkCoordinate::new(7, 7)).unwrap();
        assert_eq!(far.lod(), 2);

        let neighbour = mesh.chunk(ChunkCoordinate::new(2, 0)).unwrap();
        assert_eq!(neighbour.lod(), 1);

        assert_crack_free(&mesh);
    }

    #[test]
    fn updates_only_regenerate_changed_chunks() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 160.0, 1.0, 3, 16).unwrap();

        let first = mesh.update(5.0, 5.0, 10.0);
        assert!(!first.regenerated.is_empty());
        assert!(first.changed.len() >= first.regenerated.len());

        // the same position again changes nothing
        let second = mesh.update(5.0, 5.0, 10.0);
        assert!(second.is_empty());
        assert_eq!(second.stitched_edges, 0);

        // a small step only touches the chunks close to the viewer
        let third = mesh.update(12.0, 5.0, 10.0);
        assert!(!third.regenerated.is_empty());
        assert!(third.regenerated.len() < 16 * 16 / 4);
        assert!(third.regenerated.iter().all(|coordinate| coordinate.x <= 4 && coordinate.z <= 3));
    }

    #[test]
    fn hysteresis_prevents_flicker() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 80.0, 1.0, 3, 8)
            .unwrap()
            .with_hysteresis(0.1);

        // the viewer sits on the band boundaries of several chunks (margin 1)
        mesh.update(30.0, 5.0, 10.0);
        let settled = lods(&mesh);

        for i in 0..50 {
            let offset = if i % 2 == 0 { 0.9 } else { -0.9 };
            let update = mesh.update(30.0 + offset, 5.0, 10.0);

            assert!(update.is_empty());
            assert_eq!(lods(&mesh), settled);
        }

        // chunk 1_0 sits exactly one threshold away, moving past the margin refines it
        let chunk = ChunkCoordinate::new(1, 0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 1);
        let update = mesh.update(28.5, 5.0, 10.0);
        assert!(update.regenerated.contains(&chunk));
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 0);
    }

    #[test]
    fn boundary_chunks_keep_their_lod() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 80.0, 1.0, 3, 8)
            .unwrap()
            .with_hysteresis(0.1);
        let chunk = ChunkCoordinate::new(0, 0);

        // distance 9 -> lod 0
        mesh.update(19.0, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 0);

        // exactly on the boundary and within the margin
        mesh.update(20.0, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 0);
        mesh.update(20.9, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 0);

        // strictly past the margin
        mesh.update(21.5, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 1);

        // and back again requires crossing the margin on the other side
        mesh.update(19.5, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 1);
        mesh.update(18.5, 5.0, 10.0);
        assert_eq!(mesh.chunk(chunk).unwrap().lod(), 0);
    }

    #[test]
    fn seams_are_continuous_for_all_lod_pairs() {
        let field = bumpy_field();

        for lod_count in 2..=4 {
            let mut mesh =
                LodTerrainMesh::new(field.clone(), 32.0, 2.0, lod_count, 4).unwrap();

            // sweep the viewer over the terrain to produce every adjacent lod pairing
            for (x, z) in iproduct!(0..8, 0..8) {
                mesh.update(x as f32 * 4.0 + 1.0, z as f32 * 4.0 + 1.0, 5.0);
                assert_crack_free(&mesh);
            }
        }
    }

    #[test]
    fn shared_vertices_match_the_surface() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 32.0, 1.5, 3, 4).unwrap();
        mesh.update(1.0, 1.0, 4.0);

        let fine = mesh.chunk(ChunkCoordinate::new(0, 0)).unwrap();
        let coarse = mesh.chunk(ChunkCoordinate::new(1, 0)).unwrap();
        assert!(fine.lod() < coarse.lod());
        assert!(fine.stitched_edges().contains(EdgeMask::EAST));
        assert!(!coarse.stitched_edges().contains(EdgeMask::WEST));

        // every vertex of the coarse side exists on the fine side at the surface height
        for position in coarse.vertex_grid().edge_positions(ChunkEdge::West) {
            let expected = mesh.surface().elevation_at(position.x, position.z);
            assert_eq!(position.y, expected);

            let matching = fine
                .vertex_grid()
                .edge_positions(ChunkEdge::East)
                .find(|fine_position| fine_position.z == position.z)
                .unwrap();
            assert_eq!(matching, position);
        }
    }

    #[test]
    fn stitching_is_undone_when_lods_match_again() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 32.0, 1.0, 3, 4).unwrap();
        let chunk = ChunkCoordinate::new(0, 0);

        mesh.update(1.0, 1.0, 4.0);
        assert!(!mesh.chunk(chunk).unwrap().stitched_edges().is_empty());

        // with a huge threshold every chunk is in the finest band
        mesh.update(1.0, 1.0, 1000.0);
        assert!(mesh.chunks().all(|chunk| chunk.lod() == 0));
        assert!(mesh.chunks().all(|chunk| chunk.stitched_edges().is_empty()));

        for position in mesh.chunk(chunk).unwrap().vertex_grid().positions() {
            assert_eq!(position.y, mesh.surface().elevation_at(position.x, position.z));
        }
    }

    #[test]
    #[should_panic(expected = "The terrain tessellation is broken")]
    fn cracks_along_restitched_edges_are_fatal() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 32.0, 1.0, 3, 4).unwrap();

        // chunk 2_0 stays at the coarsest lod, while its western neighbour is refined
        let coarse = ChunkCoordinate::new(2, 0);
        let (column, row) = ChunkEdge::West.vertex(0, 1);
        mesh.chunks[coarse.index()]
            .vertex_grid
            .position_mut(column, row)
            .y += 5.0;

        mesh.update(1.0, 1.0, 4.0);
    }

    #[test]
    fn invalid_updates_are_ignored() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 32.0, 1.0, 3, 4).unwrap();
        let before = lods(&mesh);

        assert!(mesh.update(1.0, 1.0, 0.0).is_empty());
        assert!(mesh.update(1.0, 1.0, f32::NAN).is_empty());
        assert!(mesh.update(f32::NAN, 1.0, 8.0).is_empty());
        assert_eq!(lods(&mesh), before);
    }

    #[test]
    fn chunk_meshes_match_the_lod() {
        let mut mesh = LodTerrainMesh::new(bumpy_field(), 32.0, 1.0, 3, 4).unwrap();
        mesh.update(1.0, 1.0, 8.0);

        let chunk = mesh.chunk(ChunkCoordinate::new(0, 0)).unwrap();
        let render_mesh = mesh.chunk_mesh(chunk.coordinate()).unwrap();
        let cells = chunk.vertex_grid().cells() as usize;

        assert_eq!(render_mesh.count_vertices(), (cells + 1) * (cells + 1));
        assert_eq!(render_mesh.indices().unwrap().len(), cells * cells * 6);
        assert!(mesh.chunk_mesh(ChunkCoordinate::new(9, 9)).is_none());
    }
}
