use crate::{
    error::{TerrainError, TerrainResult},
    math::is_valid_rect,
    scatter::{PlacedInstance, PlacementSpec, SpatialGrid},
    terrain_data::ElevationSampler,
};
use bevy::{
    log::info,
    math::{Rect, Vec2, Vec3},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f32::consts::TAU;

/// The number of grid cells per axis and sign, that the footprint may span at most.
const MAX_GRID_CELLS: f32 = (i32::MAX / 4) as f32;

/// The state of a [`ScatterJob`] after a call to [`ScatterJob::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScatterProgress {
    /// There are slots left to fill.
    Pending { remaining: usize },
    /// Every slot was either filled or skipped after exhausting its attempts.
    Finished { placed: usize, skipped: usize },
}

/// A placement of a single decoration type, that can be advanced a few slots at a time.
///
/// Each of the `desired_count` slots is tried up to `max_attempts` times. A slot, whose
/// attempts are exhausted, is skipped, so the job always terminates and may place fewer
/// instances than desired.
#[derive(Clone, Debug)]
pub struct ScatterJob {
    spec: PlacementSpec,
    footprint: Rect,
    desired_count: usize,
    max_attempts: u32,
    next_slot: usize,
    skipped: usize,
    grid: SpatialGrid,
    instances: Vec<PlacedInstance>,
}

impl ScatterJob {
    pub fn new(
        spec: PlacementSpec,
        footprint: Rect,
        desired_count: usize,
        max_attempts: u32,
    ) -> TerrainResult<Self> {
        spec.validate()?;

        if !is_valid_rect(footprint) {
            return Err(TerrainError::InvalidConfig(format!(
                "the scatter footprint {footprint:?} is invalid"
            )));
        }

        // the separation, unless that would exceed the cell range of the grid
        let separation = spec.size * spec.max_scale;
        let extent = footprint.min.abs().max(footprint.max.abs()).max_element();
        let cell_size = if separation > 0.0 {
            separation.max(extent / MAX_GRID_CELLS)
        } else {
            0.0
        };

        Ok(Self {
            spec,
            footprint,
            desired_count,
            max_attempts,
            next_slot: 0,
            skipped: 0,
            grid: SpatialGrid::new(cell_size),
            instances: Vec::new(),
        })
    }

    #[inline]
    pub fn spec(&self) -> &PlacementSpec {
        &self.spec
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.next_slot >= self.desired_count
    }

    /// The instances accepted so far.
    #[inline]
    pub fn instances(&self) -> &[PlacedInstance] {
        &self.instances
    }

    #[inline]
    pub fn into_instances(self) -> Vec<PlacedInstance> {
        self.instances
    }

    pub fn progress(&self) -> ScatterProgress {
        if self.is_finished() {
            ScatterProgress::Finished {
                placed: self.instances.len(),
                skipped: self.skipped,
            }
        } else {
            ScatterProgress::Pending {
                remaining: self.desired_count - self.next_slot,
            }
        }
    }

    /// Fills up to `slot_budget` of the remaining slots.
    pub fn step<R, S>(&mut self, rng: &mut R, sampler: &S, slot_budget: usize) -> ScatterProgress
    where
        R: Rng + ?Sized,
        S: ElevationSampler + ?Sized,
    {
        let was_finished = self.is_finished();
        let end = self.next_slot.saturating_add(slot_budget).min(self.desired_count);

        for _ in self.next_slot..end {
            let placed = (0..self.max_attempts).find_map(|_| self.try_place(rng, sampler));

            match placed {
                Some(instance) => {
                    let position = Vec2::new(instance.position.x, instance.position.z);
                    self.grid.insert(position, instance.scale);
                    self.instances.push(instance);
                }
                None => self.skipped += 1,
            }

            self.next_slot += 1;
        }

        let progress = self.progress();

        if !was_finished && self.is_finished() && self.skipped > 0 {
            info!(
                "Placed {} of {} instances, {} slots ran out of attempts.",
                self.instances.len(),
                self.desired_count,
                self.skipped
            );
        }

        progress
    }

    /// Draws a single candidate and returns it, if it satisfies all constraints.
    fn try_place<R, S>(&self, rng: &mut R, sampler: &S) -> Option<PlacedInstance>
    where
        R: Rng + ?Sized,
        S: ElevationSampler + ?Sized,
    {
        let spec = &self.spec;
        let (min, max) = (self.footprint.min, self.footprint.max);

        let x = min.x + rng.random::<f32>() * (max.x - min.x);
        let z = min.y + rng.random::<f32>() * (max.y - min.y);

        let elevation = sampler.elevation_at(x, z);

        if elevation < spec.lower_placement_bound || elevation > spec.upper_placement_bound {
            return None;
        }

        let scale = spec.min_scale + rng.random::<f32>() * (spec.max_scale - spec.min_scale);
        let candidate = Vec2::new(x, z);

        let overlapping = self
            .grid
            .neighbours(candidate)
            .any(|(position, other_scale)| {
                position.distance(candidate) < spec.separation(scale, other_scale)
            });

        if overlapping {
            return None;
        }

        Some(PlacedInstance {
            position: Vec3::new(x, elevation - spec.vertical_displacement * scale, z),
            scale,
            rotation_y: rng.random_range(0.0..TAU),
        })
    }
}

/// Places decoration instances by rejection sampling with an injected random source.
pub struct ScatterPlacer<R: Rng = StdRng> {
    rng: R,
}

impl ScatterPlacer<StdRng> {
    /// Creates a placer with a reproducible random source.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ScatterPlacer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Places up to `desired_count` instances inside of the `footprint`.
    ///
    /// Every returned instance lies within the elevation band of the `spec` and keeps
    /// the scale aware minimum distance to all other instances. Slots that could not be
    /// filled within `max_attempts` candidates are skipped.
    pub fn generate<S>(
        &mut self,
        spec: PlacementSpec,
        sampler: &S,
        footprint: Rect,
        desired_count: usize,
        max_attempts: u32,
    ) -> TerrainResult<Vec<PlacedInstance>>
    where
        S: ElevationSampler + ?Sized,
    {
        let mut job = ScatterJob::new(spec, footprint, desired_count, max_attempts)?;
        job.step(&mut self.rng, sampler, usize::MAX);

        Ok(job.into_instances())
    }
}
