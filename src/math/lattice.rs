/// The vertex lattice of the finest level of detail of a terrain footprint.
///
/// Every vertex of every chunk, regardless of its lod, lies on this lattice.
/// Positions are always derived from the integer lattice index, which guarantees that
/// vertices shared by neighbouring chunks end up with bit-identical coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lattice {
    /// The count of finest cells along one side of the whole footprint.
    size: u32,
    /// The count of finest cells along one side of a single chunk.
    chunk_cells: u32,
    /// The side length of the footprint.
    width: f32,
}

impl Lattice {
    /// Creates the lattice for a square footprint of `width` split into
    /// `subdivisions` x `subdivisions` chunks with `lod_count` levels of detail.
    ///
    /// Returns `None` if the lattice index would overflow.
    pub fn new(width: f32, subdivisions: u32, lod_count: u32) -> Option<Self> {
        let chunk_cells = 1u32.checked_shl(lod_count.checked_sub(1)?)?;
        let size = subdivisions.checked_mul(chunk_cells)?;

        Some(Self {
            size,
            chunk_cells,
            width,
        })
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn chunk_cells(&self) -> u32 {
        self.chunk_cells
    }

    /// The world position of the lattice index along one axis.
    #[inline]
    pub fn position(&self, index: u32) -> f32 {
        index as f32 * self.width / self.size as f32
    }

    /// The count of cells along one side of a chunk with the `lod`.
    #[inline]
    pub fn cells_for_lod(&self, lod: u32) -> u32 {
        self.chunk_cells >> lod
    }

    /// The distance in lattice indices between two neighbouring vertices with the `lod`.
    #[inline]
    pub fn stride(&self, lod: u32) -> u32 {
        1 << lod
    }

    /// The side length of one cell with the `lod`.
    #[inline]
    pub fn cell_size(&self, lod: u32) -> f32 {
        self.width / self.size as f32 * self.stride(lod) as f32
    }
}
