use crate::{
    error::{TerrainError, TerrainResult},
    scatter::PlacementSpec,
    terrain::TerrainConfig,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// A decoration type, that is scattered over the terrain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecorationConfig {
    pub name: String,
    /// The asset path of the glTF model, whose first scene is cloned for every instance.
    pub model: String,
    pub spec: PlacementSpec,
    /// The desired count of instances.
    #[serde(default = "default_count")]
    pub count: usize,
    /// The count of candidates drawn per instance, before its slot is skipped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_count() -> usize {
    200
}

fn default_max_attempts() -> u32 {
    50
}

impl DecorationConfig {
    /// Trees grow between the elevations 60 and 300.
    pub fn tree() -> Self {
        Self {
            name: "tree".to_string(),
            model: "models/lowpolytree.glb".to_string(),
            spec: PlacementSpec {
                upper_placement_bound: 300.0,
                lower_placement_bound: 60.0,
                min_scale: 10.0,
                max_scale: 70.0,
                size: 1.0,
                vertical_displacement: 0.0,
            },
            count: default_count(),
            max_attempts: default_max_attempts(),
        }
    }

    /// Rocks lie anywhere up to the elevation 1000.
    pub fn rock() -> Self {
        Self {
            name: "rock".to_string(),
            model: "models/rock.glb".to_string(),
            spec: PlacementSpec {
                upper_placement_bound: 1000.0,
                lower_placement_bound: 0.0,
                min_scale: 10.0,
                max_scale: 70.0,
                size: 1.0,
                vertical_displacement: 0.0,
            },
            count: default_count(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Describes a complete scene: the terrain and all decorations placed on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescriptor {
    /// The path of the height map, relative to the working directory.
    pub heightmap: Option<String>,
    /// The distance between neighbouring height map samples.
    pub resolution: f32,
    /// The seed of the decoration placement.
    pub seed: u64,
    pub terrain: TerrainConfig,
    pub decorations: Vec<DecorationConfig>,
}

impl Default for SceneDescriptor {
    fn default() -> Self {
        Self {
            heightmap: None,
            resolution: 1.0,
            seed: 0,
            terrain: TerrainConfig::default(),
            decorations: vec![DecorationConfig::tree(), DecorationConfig::rock()],
        }
    }
}

impl SceneDescriptor {
    /// Loads and validates the RON scene descriptor at `path`.
    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        Self::from_ron(&fs::read_to_string(path)?)
    }

    /// Parses and validates a RON scene descriptor.
    pub fn from_ron(source: &str) -> TerrainResult<Self> {
        let descriptor: Self = ron::from_str(source)?;
        descriptor.validate()?;

        Ok(descriptor)
    }

    pub fn validate(&self) -> TerrainResult<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "the height map resolution has to be positive, got {}",
                self.resolution
            )));
        }

        self.terrain.validate()?;

        for decoration in &self.decorations {
            decoration.spec.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_descriptors_use_the_defaults() {
        let descriptor = SceneDescriptor::from_ron("()").unwrap();

        assert_eq!(descriptor, SceneDescriptor::default());
        assert_eq!(descriptor.terrain.width, 3000.0);
        assert_eq!(descriptor.terrain.lod_count, 5);
        assert_eq!(descriptor.decorations.len(), 2);
    }

    #[test]
    fn descriptors_are_parsed() {
        let source = r#"
            (
                heightmap: Some("terrain/heightmap.png"),
                seed: 42,
                terrain: (
                    width: 1000.0,
                    subdivisions: 8,
                ),
                decorations: [
                    (
                        name: "bush",
                        model: "models/bush.glb",
                        spec: (
                            upper_placement_bound: 120.0,
                            lower_placement_bound: 10.0,
                            min_scale: 1.0,
                            max_scale: 3.0,
                            size: 2.0,
                        ),
                        count: 10,
                    ),
                ],
            )
        "#;

        let descriptor = SceneDescriptor::from_ron(source).unwrap();

        assert_eq!(descriptor.heightmap.as_deref(), Some("terrain/heightmap.png"));
        assert_eq!(descriptor.seed, 42);
        assert_eq!(descriptor.terrain.width, 1000.0);
        assert_eq!(descriptor.terrain.subdivisions, 8);
        assert_eq!(descriptor.terrain.height, 450.0);

        let bush = &descriptor.decorations[0];
        assert_eq!(bush.count, 10);
        assert_eq!(bush.max_attempts, 50);
        assert_eq!(bush.spec.vertical_displacement, 0.0);
    }

    #[test]
    fn malformed_descriptors_fail() {
        assert!(matches!(
            SceneDescriptor::from_ron("(seed: \"many\")"),
            Err(TerrainError::Ron(_))
        ));
        assert!(matches!(
            SceneDescriptor::from_ron("(resolution: -1.0)"),
            Err(TerrainError::InvalidConfig(_))
        ));
        assert!(matches!(
            SceneDescriptor::load("does/not/exist.ron"),
            Err(TerrainError::Io(_))
        ));
    }
}
