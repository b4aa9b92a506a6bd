use crate::terrain_data::{ElevationSampler, HeightField};
use bevy::math::Rect;
use std::sync::Arc;

/// A [`HeightField`] stretched over the square footprint of a terrain and scaled vertically.
///
/// The whole raster is mapped onto `[0, width] x [0, width]` and every elevation is
/// multiplied by `height`. This is the surface the terrain mesh tessellates,
/// so decorations that should rest on the terrain sample it as well.
#[derive(Clone, Debug)]
pub struct TerrainSurface {
    height_field: Arc<HeightField>,
    width: f32,
    height: f32,
    scale_x: f32,
    scale_z: f32,
}

impl TerrainSurface {
    pub fn new(height_field: Arc<HeightField>, width: f32, height: f32) -> Self {
        let scale_x = height_field.width() / width;
        let scale_z = height_field.depth() / width;

        Self {
            height_field,
            width,
            height,
            scale_x,
            scale_z,
        }
    }

    #[inline]
    pub fn height_field(&self) -> &Arc<HeightField> {
        &self.height_field
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// The area covered by the surface.
    #[inline]
    pub fn footprint(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.width)
    }
}

impl ElevationSampler for TerrainSurface {
    #[inline]
    fn elevation_at(&self, x: f32, z: f32) -> f32 {
        self.height * self.height_field.elevation_at(x * self.scale_x, z * self.scale_z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_is_stretched_over_the_footprint() {
        // elevation = column / 4, raster covers [0, 4] x [0, 4]
        let field = HeightField::from_fn(5, 5, 1.0, |column, _| column as f32 / 4.0).unwrap();
        let surface = TerrainSurface::new(Arc::new(field), 100.0, 50.0);

        for (x, z, expected) in [
            (0.0, 0.0, 0.0),
            (50.0, 10.0, 25.0),
            (100.0, 100.0, 50.0),
            (200.0, 0.0, 50.0),
        ] {
            let elevation = surface.elevation_at(x, z);
            assert!((elevation - expected).abs() < 1e-4, "{elevation} != {expected}");
        }
        assert_eq!(surface.footprint(), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn unit_surface_matches_the_height_field() {
        let field = Arc::new(HeightField::from_fn(9, 9, 2.0, |c, r| (c * r) as f32).unwrap());
        let surface = TerrainSurface::new(field.clone(), field.width(), 1.0);

        for (x, z) in [(0.0, 0.0), (3.5, 7.25), (16.0, 1.0)] {
            assert_eq!(surface.elevation_at(x, z), field.elevation_at(x, z));
        }
    }
}
