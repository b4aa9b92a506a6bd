use crate::{
    error::{TerrainError, TerrainResult},
    terrain_data::HeightField,
};
use bevy::log::info;
use image::DynamicImage;
use ndarray::Array2;
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};
use tiff::decoder::{Decoder, DecodingResult};

impl HeightField {
    /// Converts the grayscale intensity of the image to elevations in `[0, 1]`.
    ///
    /// Colored images are reduced to their luminance.
    pub fn from_image(image: &DynamicImage, resolution: f32) -> TerrainResult<Self> {
        let luma = image.to_luma16();
        let (width, height) = luma.dimensions();

        let samples = Array2::from_shape_fn((height as usize, width as usize), |(row, column)| {
            luma.get_pixel(column as u32, row as u32).0[0] as f32 / u16::MAX as f32
        });

        HeightField::new(samples, resolution)
    }
}

/// Loads the height field stored in the file at `path`.
///
/// TIFF files are decoded directly to preserve their full sample depth,
/// every other format is decoded with the `image` crate.
/// Integer samples are normalized to `[0, 1]`, float samples are kept as they are.
pub fn load_height_field(path: impl AsRef<Path>, resolution: f32) -> TerrainResult<HeightField> {
    let path = path.as_ref();

    let is_tiff = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            extension.eq_ignore_ascii_case("tif") || extension.eq_ignore_ascii_case("tiff")
        });

    let height_field = if is_tiff {
        decode_tiff(BufReader::new(File::open(path)?), resolution)?
    } else {
        HeightField::from_image(&image::open(path)?, resolution)?
    };

    info!(
        "Loaded height field {} with {}x{} samples.",
        path.display(),
        height_field.columns(),
        height_field.rows()
    );

    Ok(height_field)
}

/// Decodes the first channel of a TIFF image into a height field.
pub fn decode_tiff<R: Read + Seek>(reader: R, resolution: f32) -> TerrainResult<HeightField> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    let data: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(data) => normalize(&data, u8::MAX as f64),
        DecodingResult::U16(data) => normalize(&data, u16::MAX as f64),
        DecodingResult::U32(data) => normalize(&data, u32::MAX as f64),
        DecodingResult::U64(data) => data
            .iter()
            .map(|&value| (value as f64 / u64::MAX as f64) as f32)
            .collect(),
        DecodingResult::I8(data) => normalize(&data, i8::MAX as f64),
        DecodingResult::I16(data) => normalize(&data, i16::MAX as f64),
        DecodingResult::I32(data) => normalize(&data, i32::MAX as f64),
        DecodingResult::I64(data) => data
            .iter()
            .map(|&value| (value as f64 / i64::MAX as f64) as f32)
            .collect(),
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.iter().map(|&value| value as f32).collect(),
    };

    let pixel_count = width as usize * height as usize;

    if pixel_count == 0 || data.len() < pixel_count || data.len() % pixel_count != 0 {
        return Err(TerrainError::InvalidRaster(format!(
            "the tiff image of {width}x{height} pixels contains {} samples",
            data.len()
        )));
    }

    let channels = data.len() / pixel_count;

    let samples = Array2::from_shape_fn((height as usize, width as usize), |(row, column)| {
        data[(row * width as usize + column) * channels]
    });

    HeightField::new(samples, resolution)
}

fn normalize<T: Copy + Into<f64>>(data: &[T], max: f64) -> Vec<f32> {
    data.iter().map(|&value| (value.into() / max) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    #[test]
    fn images_are_normalized() {
        let image = ImageBuffer::from_fn(3, 2, |x, y| Luma([(x + 3 * y) as u16 * 10000]));
        let field = HeightField::from_image(&DynamicImage::ImageLuma16(image), 2.0).unwrap();

        assert_eq!(field.columns(), 3);
        assert_eq!(field.rows(), 2);
        assert_eq!(field.width(), 4.0);
        assert_eq!(field.elevation_at(0.0, 0.0), 0.0);
        assert_eq!(field.elevation_at(2.0, 0.0), 10000.0 / 65535.0);
        assert_eq!(field.elevation_at(0.0, 2.0), 30000.0 / 65535.0);

        // rows run along the image's y axis
        assert_eq!(field.samples().dim(), (2, 3));
        assert_eq!(field.samples()[[1, 2]], 50000.0 / 65535.0);
    }

    #[test]
    fn empty_images_are_rejected() {
        let image = DynamicImage::new_luma16(0, 0);

        assert!(matches!(
            HeightField::from_image(&image, 1.0),
            Err(TerrainError::InvalidRaster(_))
        ));
    }

    #[test]
    fn tiff_samples_keep_their_depth() {
        let data: Vec<u16> = (0..12).map(|i| i * 1000).collect();

        let mut bytes = Cursor::new(Vec::new());
        TiffEncoder::new(&mut bytes)
            .unwrap()
            .write_image::<colortype::Gray16>(4, 3, &data)
            .unwrap();
        bytes.set_position(0);

        let field = decode_tiff(bytes, 1.0).unwrap();

        assert_eq!(field.columns(), 4);
        assert_eq!(field.rows(), 3);
        assert!((field.elevation_at(1.0, 2.0) - 9000.0 / 65535.0).abs() < 1e-6);
    }

    #[test]
    fn float_tiffs_are_not_normalized() {
        let data = [-12.5f32, 0.0, 100.0, 4000.25];

        let mut bytes = Cursor::new(Vec::new());
        TiffEncoder::new(&mut bytes)
            .unwrap()
            .write_image::<colortype::Gray32Float>(2, 2, &data)
            .unwrap();
        bytes.set_position(0);

        let field = decode_tiff(bytes, 1.0).unwrap();

        assert_eq!(field.min_elevation(), -12.5);
        assert_eq!(field.max_elevation(), 4000.25);
    }

    #[test]
    fn missing_files_fail() {
        assert!(matches!(
            load_height_field("does/not/exist.png", 1.0),
            Err(TerrainError::Image(_))
        ));
        assert!(matches!(
            load_height_field("does/not/exist.tif", 1.0),
            Err(TerrainError::Io(_))
        ));
    }
}
