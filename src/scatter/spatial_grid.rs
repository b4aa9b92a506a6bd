use bevy::{
    math::{IVec2, Vec2},
    utils::HashMap,
};
use itertools::{iproduct, Itertools};

/// Buckets accepted instances into square cells to bound the neighbour search.
///
/// As long as the cell size is at least the largest separation distance,
/// all instances that could be too close to a position lie in the 3x3 cells around it.
/// A cell size of zero disables the grid.
#[derive(Clone, Debug, Default)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<IVec2, Vec<(Vec2, f32)>>,
    len: usize,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::default(),
            len: 0,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.cell_size > 0.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The cell containing the `position`.
    ///
    /// Cell indices beyond the range of `i32` saturate, so far away positions share the
    /// outermost cells instead of wrapping around.
    #[inline]
    fn cell(&self, position: Vec2) -> IVec2 {
        (position / self.cell_size).floor().as_ivec2()
    }

    /// Stores the `position` together with the `scale` of the instance.
    pub fn insert(&mut self, position: Vec2, scale: f32) {
        if !self.is_enabled() {
            return;
        }

        let cell = self.cell(position);
        self.cells.entry(cell).or_default().push((position, scale));
        self.len += 1;
    }

    /// Iterates over all stored entries in the cell of the `position` and its eight neighbours.
    pub fn neighbours(&self, position: Vec2) -> impl Iterator<Item = (Vec2, f32)> + '_ {
        let center = if self.is_enabled() {
            Some(self.cell(position))
        } else {
            None
        };

        center
            .into_iter()
            .flat_map(|center| {
                iproduct!(-1..=1, -1..=1).map(move |(x, y)| center.saturating_add(IVec2::new(x, y)))
            })
            .unique()
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
    }
}
