//! Rejection sampling of decoration instances (trees, rocks, ...) on a terrain surface.
//!
//! A [`ScatterPlacer`] draws random candidates inside of a footprint and only keeps those,
//! that lie within the elevation band of the [`PlacementSpec`] and are far enough away from
//! all previously accepted instances. The resumable [`ScatterJob`] performs the same
//! placement spread over multiple invocations.

mod placer;
mod spatial_grid;
mod task;

pub use placer::{ScatterJob, ScatterPlacer, ScatterProgress};
pub use spatial_grid::SpatialGrid;
pub use task::{advance_scatter_tasks, Decoration, ScatterBudget, ScatterTask};

use crate::error::{TerrainError, TerrainResult};
use bevy::{
    math::{Quat, Vec3},
    prelude::Transform,
};
use serde::{Deserialize, Serialize};

/// Describes where and how densely a decoration may be placed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpec {
    /// The highest elevation an instance may be placed at.
    pub upper_placement_bound: f32,
    /// The lowest elevation an instance may be placed at.
    pub lower_placement_bound: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// The footprint radius of an instance with a scale of one.
    ///
    /// Two instances have to be at least `size * max(scale_a, scale_b)` apart.
    pub size: f32,
    /// How far the model is sunk into the ground, relative to its scale.
    #[serde(default)]
    pub vertical_displacement: f32,
}

impl Default for PlacementSpec {
    fn default() -> Self {
        Self {
            upper_placement_bound: f32::MAX,
            lower_placement_bound: f32::MIN,
            min_scale: 1.0,
            max_scale: 1.0,
            size: 1.0,
            vertical_displacement: 0.0,
        }
    }
}

impl PlacementSpec {
    /// Checks that the spec describes a non-empty elevation band and scale range.
    pub fn validate(&self) -> TerrainResult<()> {
        let values = [
            ("upper_placement_bound", self.upper_placement_bound),
            ("lower_placement_bound", self.lower_placement_bound),
            ("min_scale", self.min_scale),
            ("max_scale", self.max_scale),
            ("size", self.size),
            ("vertical_displacement", self.vertical_displacement),
        ];

        if let Some((name, value)) = values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(TerrainError::InvalidConfig(format!(
                "the placement {name} has to be finite, got {value}"
            )));
        }
        if self.lower_placement_bound > self.upper_placement_bound {
            return Err(TerrainError::InvalidConfig(format!(
                "the lower placement bound {} exceeds the upper bound {}",
                self.lower_placement_bound, self.upper_placement_bound
            )));
        }
        if self.min_scale < 0.0 || self.min_scale > self.max_scale {
            return Err(TerrainError::InvalidConfig(format!(
                "the scale range [{}, {}] is invalid",
                self.min_scale, self.max_scale
            )));
        }
        if self.size < 0.0 {
            return Err(TerrainError::InvalidConfig(format!(
                "the placement size has to be non-negative, got {}",
                self.size
            )));
        }

        Ok(())
    }

    /// The smallest allowed distance between two instances with the given scales.
    #[inline]
    pub fn separation(&self, scale: f32, other_scale: f32) -> f32 {
        self.size * scale.max(other_scale)
    }
}

/// A single accepted decoration placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedInstance {
    pub position: Vec3,
    pub scale: f32,
    /// The rotation around the vertical axis in radians.
    pub rotation_y: f32,
}

impl PlacedInstance {
    /// The transform of the instance relative to the terrain.
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position)
            .with_rotation(Quat::from_rotation_y(self.rotation_y))
            .with_scale(Vec3::splat(self.scale))
    }
}
