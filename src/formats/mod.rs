//! Loading of height maps and scene descriptors.
//!
//! Height maps can be stored in any format supported by the `image` crate or as
//! (Geo)TIFF files with integer or float samples.
//! Scenes are described in RON files, see [`SceneDescriptor`].

pub mod height_map;
pub mod scene;

pub use height_map::{decode_tiff, load_height_field};
pub use scene::{DecorationConfig, SceneDescriptor};
