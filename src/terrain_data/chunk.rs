use crate::{
    math::Lattice,
    terrain_data::{ElevationSampler, TerrainSurface},
};
use bevy::{
    math::{IVec2, Rect, UVec2, Vec3},
    prelude::Mesh,
    render::{
        mesh::Indices, render_asset::RenderAssetUsages, render_resource::PrimitiveTopology,
    },
};
use derive_more::derive::Display;
use itertools::iproduct;

/// The position of a chunk inside the chunk grid of a [`LodTerrainMesh`](super::LodTerrainMesh).
#[derive(Copy, Clone, Default, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Display)]
#[display("{x}_{z}")]
pub struct ChunkCoordinate {
    /// The column of the chunk (along the x axis).
    pub x: u32,
    /// The row of the chunk (along the z axis).
    pub z: u32,
}

impl ChunkCoordinate {
    pub fn new(x: u32, z: u32) -> Self {
        Self { x, z }
    }

    /// Returns the neighbouring coordinate across the `edge`,
    /// if it lies inside of a grid of `count` x `count` chunks.
    pub fn neighbour(self, edge: ChunkEdge, count: u32) -> Option<Self> {
        let position = IVec2::new(self.x as i32, self.z as i32) + edge.offset();

        if position.cmpge(IVec2::ZERO).all() && position.cmplt(IVec2::splat(count as i32)).all() {
            Some(Self::new(position.x as u32, position.y as u32))
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn index(self) -> [usize; 2] {
        [self.z as usize, self.x as usize]
    }
}

/// One of the four sides of a chunk.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ChunkEdge {
    /// The side with the smallest x coordinate.
    West,
    /// The side with the largest x coordinate.
    East,
    /// The side with the smallest z coordinate.
    North,
    /// The side with the largest z coordinate.
    South,
}

impl ChunkEdge {
    pub const ALL: [ChunkEdge; 4] = [
        ChunkEdge::West,
        ChunkEdge::East,
        ChunkEdge::North,
        ChunkEdge::South,
    ];

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            ChunkEdge::West => ChunkEdge::East,
            ChunkEdge::East => ChunkEdge::West,
            ChunkEdge::North => ChunkEdge::South,
            ChunkEdge::South => ChunkEdge::North,
        }
    }

    pub fn mask(self) -> EdgeMask {
        match self {
            ChunkEdge::West => EdgeMask::WEST,
            ChunkEdge::East => EdgeMask::EAST,
            ChunkEdge::North => EdgeMask::NORTH,
            ChunkEdge::South => EdgeMask::SOUTH,
        }
    }

    fn offset(self) -> IVec2 {
        match self {
            ChunkEdge::West => IVec2::new(-1, 0),
            ChunkEdge::East => IVec2::new(1, 0),
            ChunkEdge::North => IVec2::new(0, -1),
            ChunkEdge::South => IVec2::new(0, 1),
        }
    }

    /// The grid position (column, row) of the `k`th vertex along this edge,
    /// counted in the direction of increasing x or z.
    #[inline]
    pub(crate) fn vertex(self, k: u32, cells: u32) -> (u32, u32) {
        match self {
            ChunkEdge::West => (0, k),
            ChunkEdge::East => (cells, k),
            ChunkEdge::North => (k, 0),
            ChunkEdge::South => (k, cells),
        }
    }

    /// The coordinate of the position along the direction of the edge.
    #[inline]
    pub(crate) fn along(self, position: Vec3) -> f32 {
        match self {
            ChunkEdge::West | ChunkEdge::East => position.z,
            ChunkEdge::North | ChunkEdge::South => position.x,
        }
    }
}

bitflags::bitflags! {
    /// A set of chunk edges.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EdgeMask: u8 {
        const WEST = 1 << 0;
        const EAST = 1 << 1;
        const NORTH = 1 << 2;
        const SOUTH = 1 << 3;
    }
}

/// The tessellated vertices of a chunk, stored row by row.
#[derive(Clone, Debug)]
pub struct VertexGrid {
    cells: u32,
    positions: Vec<Vec3>,
}

impl VertexGrid {
    /// Samples the surface over the chunk, whose minimum corner is the lattice index `origin`,
    /// with the density of the `lod`.
    pub(crate) fn generate(
        surface: &TerrainSurface,
        lattice: &Lattice,
        origin: UVec2,
        lod: u32,
    ) -> Self {
        let cells = lattice.cells_for_lod(lod);
        let stride = lattice.stride(lod);

        let positions = iproduct!(0..=cells, 0..=cells)
            .map(|(row, column)| {
                let x = lattice.position(origin.x + column * stride);
                let z = lattice.position(origin.y + row * stride);

                Vec3::new(x, surface.elevation_at(x, z), z)
            })
            .collect();

        Self { cells, positions }
    }

    /// The count of cells along one side.
    #[inline]
    pub fn cells(&self) -> u32 {
        self.cells
    }

    #[inline]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[inline]
    pub fn position(&self, column: u32, row: u32) -> Vec3 {
        self.positions[self.index(column, row)]
    }

    #[inline]
    pub(crate) fn position_mut(&mut self, column: u32, row: u32) -> &mut Vec3 {
        let index = self.index(column, row);
        &mut self.positions[index]
    }

    #[inline]
    fn index(&self, column: u32, row: u32) -> usize {
        (row * (self.cells + 1) + column) as usize
    }

    /// The vertices along the `edge`, ordered by increasing x or z.
    pub fn edge_positions(&self, edge: ChunkEdge) -> impl Iterator<Item = Vec3> + '_ {
        (0..=self.cells).map(move |k| {
            let (column, row) = edge.vertex(k, self.cells);
            self.position(column, row)
        })
    }
}

/// Generates the triangle list indices of a grid with `cells` x `cells` quads.
///
/// Triangles are wound counter clockwise when viewed from above.
pub(crate) fn generate_grid_indices(cells: u32) -> Vec<u32> {
    let row_length = cells + 1;

    iproduct!(0..cells, 0..cells)
        .flat_map(|(row, column)| {
            let a = row * row_length + column;
            let b = a + 1;
            let c = a + row_length;
            let d = c + 1;

            [a, c, b, b, c, d]
        })
        .collect()
}

/// A square section of the terrain, tessellated with the density of its current lod.
#[derive(Clone, Debug)]
pub struct TerrainChunk {
    pub(crate) coordinate: ChunkCoordinate,
    pub(crate) bounds: Rect,
    /// The lattice index of the minimum corner.
    pub(crate) origin: UVec2,
    pub(crate) lod: u32,
    pub(crate) vertex_grid: VertexGrid,
    pub(crate) neighbours: [Option<ChunkCoordinate>; 4],
    /// The edges that are currently snapped onto a coarser neighbour.
    pub(crate) stitched: EdgeMask,
}

impl TerrainChunk {
    pub(crate) fn new(
        coordinate: ChunkCoordinate,
        count: u32,
        surface: &TerrainSurface,
        lattice: &Lattice,
        lod: u32,
    ) -> Self {
        let origin = UVec2::new(coordinate.x, coordinate.z) * lattice.chunk_cells();
        let end = origin + UVec2::splat(lattice.chunk_cells());

        let bounds = Rect::new(
            lattice.position(origin.x),
            lattice.position(origin.y),
            lattice.position(end.x),
            lattice.position(end.y),
        );

        Self {
            coordinate,
            bounds,
            origin,
            lod,
            vertex_grid: VertexGrid::generate(surface, lattice, origin, lod),
            neighbours: ChunkEdge::ALL.map(|edge| coordinate.neighbour(edge, count)),
            stitched: EdgeMask::empty(),
        }
    }

    #[inline]
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The current level of detail, where 0 is the finest.
    #[inline]
    pub fn lod(&self) -> u32 {
        self.lod
    }

    #[inline]
    pub fn vertex_grid(&self) -> &VertexGrid {
        &self.vertex_grid
    }

    #[inline]
    pub fn neighbour(&self, edge: ChunkEdge) -> Option<ChunkCoordinate> {
        self.neighbours[edge.index()]
    }

    #[inline]
    pub fn stitched_edges(&self) -> EdgeMask {
        self.stitched
    }

    /// Resamples the vertex grid with the density of the new `lod`.
    ///
    /// The seams have to be stitched again afterwards.
    pub(crate) fn regenerate(&mut self, surface: &TerrainSurface, lattice: &Lattice, lod: u32) {
        self.lod = lod;
        self.vertex_grid = VertexGrid::generate(surface, lattice, self.origin, lod);
        self.stitched = EdgeMask::empty();
    }

    /// Builds a renderable triangle mesh of the chunk.
    ///
    /// The `indices` have to match the cell count of the current lod.
    pub fn to_mesh(&self, indices: &[u32], surface: &TerrainSurface, lattice: &Lattice) -> Mesh {
        let epsilon = lattice.cell_size(self.lod);
        let width = surface.width();

        let positions = self.vertex_grid.positions();

        let normals: Vec<[f32; 3]> = positions
            .iter()
            .map(|position| {
                let (x, z) = (position.x, position.z);
                let left = surface.elevation_at(x - epsilon, z);
                let right = surface.elevation_at(x + epsilon, z);
                let down = surface.elevation_at(x, z - epsilon);
                let up = surface.elevation_at(x, z + epsilon);

                Vec3::new(left - right, 2.0 * epsilon, down - up)
                    .normalize_or(Vec3::Y)
                    .to_array()
            })
            .collect();

        let uvs: Vec<[f32; 2]> = positions
            .iter()
            .map(|position| [position.x / width, position.z / width])
            .collect();

        let positions: Vec<[f32; 3]> = positions.iter().map(|position| position.to_array()).collect();

        Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
            .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
            .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
            .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
            .with_inserted_indices(Indices::U32(indices.to_vec()))
    }
}
