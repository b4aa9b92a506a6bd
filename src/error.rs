use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("invalid elevation raster: {0}")]
    InvalidRaster(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to decode image")]
    Image(#[from] image::ImageError),
    #[error("failed to decode tiff")]
    Tiff(#[from] tiff::TiffError),
    #[error("io error")]
    Io(#[from] io::Error),
    #[error("failed to parse scene descriptor")]
    Ron(#[from] ron::error::SpannedError),
}

pub type TerrainResult<T> = Result<T, TerrainError>;
