use crate::{
    error::{TerrainError, TerrainResult},
    terrain_data::ElevationSampler,
};
use ndarray::Array2;

/// An immutable elevation raster with continuous lookups.
///
/// The samples are stored as `[row][column]`, where rows run along the z axis and columns
/// along the x axis. Neighbouring samples are `resolution` units apart, so the raster covers
/// `[0, width] x [0, depth]`.
///
/// Lookups are bilinearly interpolated and positions outside of the raster are clamped to
/// the nearest edge sample.
#[derive(Clone, Debug)]
pub struct HeightField {
    samples: Array2<f32>,
    resolution: f32,
    min_elevation: f32,
    max_elevation: f32,
}

impl HeightField {
    /// Creates a height field from the samples (`[row][column]`) and the spacing between them.
    pub fn new(samples: Array2<f32>, resolution: f32) -> TerrainResult<Self> {
        let (rows, columns) = samples.dim();

        if rows == 0 || columns == 0 {
            return Err(TerrainError::InvalidRaster(format!(
                "the raster has zero extent ({columns}x{rows})"
            )));
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(TerrainError::InvalidRaster(format!(
                "the sample spacing has to be positive, got {resolution}"
            )));
        }
        if let Some(((row, column), sample)) =
            samples.indexed_iter().find(|(_, sample)| !sample.is_finite())
        {
            return Err(TerrainError::InvalidRaster(format!(
                "the sample at row {row}, column {column} is not finite ({sample})"
            )));
        }

        let (min_elevation, max_elevation) = samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &sample| {
                (min.min(sample), max.max(sample))
            });

        Ok(Self {
            samples,
            resolution,
            min_elevation,
            max_elevation,
        })
    }

    /// Creates a height field by evaluating `f(column, row)` for every sample.
    pub fn from_fn(
        columns: usize,
        rows: usize,
        resolution: f32,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> TerrainResult<Self> {
        let samples = Array2::from_shape_fn((rows, columns), |(row, column)| f(column, row));

        Self::new(samples, resolution)
    }

    /// Creates a height field with the same elevation everywhere.
    pub fn flat(columns: usize, rows: usize, resolution: f32, elevation: f32) -> TerrainResult<Self> {
        Self::new(Array2::from_elem((rows, columns), elevation), resolution)
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.samples.ncols()
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.samples.nrows()
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// The extent of the raster along the x axis.
    #[inline]
    pub fn width(&self) -> f32 {
        (self.columns() - 1) as f32 * self.resolution
    }

    /// The extent of the raster along the z axis.
    #[inline]
    pub fn depth(&self) -> f32 {
        (self.rows() - 1) as f32 * self.resolution
    }

    #[inline]
    pub fn min_elevation(&self) -> f32 {
        self.min_elevation
    }

    #[inline]
    pub fn max_elevation(&self) -> f32 {
        self.max_elevation
    }

    #[inline]
    pub fn samples(&self) -> &Array2<f32> {
        &self.samples
    }

    /// Looks up the bilinearly interpolated elevation at the position (`x`, `z`).
    ///
    /// Positions outside of the raster (including NaN) are clamped to the nearest edge.
    pub fn elevation_at(&self, x: f32, z: f32) -> f32 {
        let (c0, c1, tx) = Self::axis_lookup(x / self.resolution, self.columns());
        let (r0, r1, tz) = Self::axis_lookup(z / self.resolution, self.rows());

        let top = lerp(self.samples[[r0, c0]], self.samples[[r0, c1]], tx);
        let bottom = lerp(self.samples[[r1, c0]], self.samples[[r1, c1]], tx);

        lerp(top, bottom, tz)
    }

    /// Returns the two sample indices enclosing the coordinate and the blend between them.
    #[inline]
    fn axis_lookup(coordinate: f32, count: usize) -> (usize, usize, f32) {
        let last = count - 1;
        // `max` discards NaN, which therefore clamps to the first sample
        let coordinate = coordinate.max(0.0).min(last as f32);

        let i0 = (coordinate.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);

        (i0, i1, coordinate - i0 as f32)
    }
}

impl ElevationSampler for HeightField {
    #[inline]
    fn elevation_at(&self, x: f32, z: f32) -> f32 {
        HeightField::elevation_at(self, x, z)
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ramp() -> HeightField {
        // elevation = 10 * column + row
        HeightField::from_fn(4, 3, 2.0, |column, row| 10.0 * column as f32 + row as f32).unwrap()
    }

    #[test]
    fn empty_rasters_are_rejected() {
        let result = HeightField::new(Array2::zeros((0, 4)), 1.0);
        assert!(matches!(result, Err(TerrainError::InvalidRaster(_))));

        let result = HeightField::new(Array2::zeros((4, 0)), 1.0);
        assert!(matches!(result, Err(TerrainError::InvalidRaster(_))));
    }

    #[test]
    fn invalid_resolutions_and_samples_are_rejected() {
        assert!(HeightField::flat(2, 2, 0.0, 1.0).is_err());
        assert!(HeightField::flat(2, 2, f32::NAN, 1.0).is_err());
        assert!(HeightField::new(array![[0.0, f32::INFINITY]], 1.0).is_err());
    }

    #[test]
    fn extent_and_range() {
        let field = ramp();

        assert_eq!(field.columns(), 4);
        assert_eq!(field.rows(), 3);
        assert_eq!(field.width(), 6.0);
        assert_eq!(field.depth(), 4.0);
        assert_eq!(field.min_elevation(), 0.0);
        assert_eq!(field.max_elevation(), 32.0);
    }

    #[test]
    fn samples_are_hit_exactly() {
        let field = ramp();

        assert_eq!(field.elevation_at(0.0, 0.0), 0.0);
        assert_eq!(field.elevation_at(2.0, 0.0), 10.0);
        assert_eq!(field.elevation_at(4.0, 2.0), 21.0);
        assert_eq!(field.elevation_at(6.0, 4.0), 32.0);
    }

    #[test]
    fn lookups_are_bilinear() {
        let field = HeightField::new(array![[0.0, 4.0], [8.0, 12.0]], 1.0).unwrap();

        assert_eq!(field.elevation_at(0.5, 0.0), 2.0);
        assert_eq!(field.elevation_at(0.0, 0.5), 4.0);
        assert_eq!(field.elevation_at(0.5, 0.5), 6.0);
        assert_eq!(field.elevation_at(0.25, 0.75), 7.0);
    }

    #[test]
    fn lookups_are_continuous_across_samples() {
        let field = HeightField::from_fn(8, 8, 1.0, |column, row| {
            ((column * 7 + row * 13) % 5) as f32
        })
        .unwrap();

        for i in 1..7 {
            let boundary = i as f32;
            let epsilon = 1e-3;

            let left = field.elevation_at(boundary - epsilon, 3.3);
            let right = field.elevation_at(boundary + epsilon, 3.3);
            assert!((left - right).abs() < 0.05, "jump at x = {boundary}");

            let above = field.elevation_at(2.7, boundary - epsilon);
            let below = field.elevation_at(2.7, boundary + epsilon);
            assert!((above - below).abs() < 0.05, "jump at z = {boundary}");
        }
    }

    #[test]
    fn out_of_range_lookups_are_clamped() {
        let field = ramp();

        assert_eq!(field.elevation_at(-5.0, -5.0), 0.0);
        assert_eq!(field.elevation_at(100.0, -1.0), 30.0);
        assert_eq!(field.elevation_at(100.0, 100.0), 32.0);
        assert_eq!(field.elevation_at(3.0, 100.0), field.elevation_at(3.0, 4.0));
        assert_eq!(field.elevation_at(f32::NAN, 0.0), 0.0);
    }

    #[test]
    fn single_sample_rasters_are_constant() {
        let field = HeightField::flat(1, 1, 1.0, 7.5).unwrap();

        assert_eq!(field.width(), 0.0);
        assert_eq!(field.elevation_at(0.0, 0.0), 7.5);
        assert_eq!(field.elevation_at(42.0, -3.0), 7.5);
    }
}
