//! Resource levels for a grid of cells.
//!
//! Global resources are a single scalar integrated lazily: `update(dt)` only
//! records elapsed time, and the first read or write afterwards folds the
//! pending time in with precalculated decay/inflow tables. Partial resources
//! integrate the same way but are only visible from their listed cells.
//! Spatial resources advance in whole updates through [`SpatialField`].

pub mod gradient;
pub mod spatial;

use crate::error::{CoreError, Result};
use gradient::GradientState;
use petri_data::{CellId, Geometry, ResourceDef, ResourceId};
#[cfg(feature = "std")]
use rayon::prelude::*;
use spatial::SpatialField;

/// Fraction of an update covered by one integration sub-step.
pub const UPDATE_STEP: f64 = 1.0 / 10_000.0;
/// Sub-steps per update.
pub const STEPS_PER_UPDATE: f64 = 10_000.0;
/// Number of sub-steps covered by the precalc tables.
pub const PRECALC_DISTANCE: usize = 100;

/// Current level of one resource.
#[derive(Debug, Clone)]
pub enum Levels {
    Scalar(f64),
    Cells(SpatialField),
}

#[derive(Debug, Clone)]
struct ResourceState {
    def: ResourceDef,
    levels: Levels,
    /// `decay_table[n]` = multiplier after `n` sub-steps.
    decay_table: Vec<f64>,
    /// `inflow_table[n]` = amount added over `n` sub-steps.
    inflow_table: Vec<f64>,
    gradient: Option<GradientState>,
    /// Cells that can see a partial resource.
    reach: Option<Vec<bool>>,
}

impl ResourceState {
    fn new(def: ResourceDef, width: usize, height: usize, seed: u64) -> Self {
        let step_decay = (1.0 - def.decay).powf(UPDATE_STEP);
        let step_inflow = def.inflow * UPDATE_STEP;
        let decay_table: Vec<f64> = (0..=PRECALC_DISTANCE)
            .map(|n| step_decay.powi(n as i32))
            .collect();
        let inflow_table = (0..=PRECALC_DISTANCE)
            .map(|n| {
                if step_decay == 1.0 {
                    step_inflow * n as f64
                } else {
                    step_inflow * (1.0 - decay_table[n]) / (1.0 - step_decay)
                }
            })
            .collect();
        let levels = if def.geometry.is_spatial() {
            Levels::Cells(SpatialField::new(&def, width, height))
        } else {
            Levels::Scalar(def.initial)
        };
        let gradient = def
            .gradient
            .map(|g| GradientState::new(g, width, height, seed));
        let reach = (def.geometry == Geometry::Partial).then(|| {
            let mut reach = vec![false; width * height];
            for c in &def.cells {
                reach[c.cell] = true;
            }
            reach
        });
        Self {
            def,
            levels,
            decay_table,
            inflow_table,
            gradient,
            reach,
        }
    }

    fn reaches(&self, cell: CellId) -> bool {
        self.reach.as_ref().map_or(true, |r| r[cell])
    }

    /// Level seen from `cell`.
    fn seen_from(&self, cell: CellId) -> f64 {
        match &self.levels {
            Levels::Scalar(v) if self.reaches(cell) => *v,
            Levels::Scalar(_) => 0.0,
            Levels::Cells(field) => field.level(cell),
        }
    }

    /// Folds `steps` sub-steps into a scalar level.
    fn integrate(&mut self, mut steps: usize) {
        let Levels::Scalar(level) = &mut self.levels else {
            return;
        };
        while steps > PRECALC_DISTANCE {
            *level = *level * self.decay_table[PRECALC_DISTANCE] + self.inflow_table[PRECALC_DISTANCE];
            steps -= PRECALC_DISTANCE;
        }
        *level = *level * self.decay_table[steps] + self.inflow_table[steps];
        if !self.def.allow_negative && *level < 0.0 {
            *level = 0.0;
        }
    }

    fn step_spatial(&mut self, width: usize, height: usize) {
        let Levels::Cells(field) = &mut self.levels else {
            return;
        };
        match &mut self.gradient {
            Some(g) => g.step(&mut field.levels, width, height, self.def.geometry == Geometry::Torus),
            None => field.step(&self.def),
        }
    }

    fn total(&self) -> f64 {
        match &self.levels {
            Levels::Scalar(v) => *v,
            Levels::Cells(field) => field.sum(),
        }
    }

    fn reset(&mut self, level: f64) {
        match &mut self.levels {
            Levels::Scalar(v) => *v = level,
            Levels::Cells(field) => field.reset(&self.def, level),
        }
    }
}

/// All resources of one grid, global or spatial.
#[derive(Debug, Clone)]
pub struct ResourceGrid {
    width: usize,
    height: usize,
    resources: Vec<ResourceState>,
    /// Sub-steps of global integration not yet applied.
    pending_steps: f64,
    /// Updates of spatial integration not yet applied.
    pending_spatial: f64,
    spatial_updates: u64,
}

impl ResourceGrid {
    /// Builds a grid of `width` × `height` cells from resource definitions.
    ///
    /// Gradient walks are seeded from `seed` and the resource index.
    pub fn new(defs: &[ResourceDef], width: usize, height: usize, seed: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::config("resource grid needs at least one cell"));
        }
        crate::config::validate_resources(defs, width, height)
            .map_err(|e| CoreError::config(e.to_string()))?;
        let resources = defs
            .iter()
            .enumerate()
            .map(|(i, def)| ResourceState::new(def.clone(), width, height, seed.wrapping_add(i as u64)))
            .collect();
        Ok(Self {
            width,
            height,
            resources,
            pending_steps: 0.0,
            pending_spatial: 0.0,
            spatial_updates: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn num_cells(&self) -> usize {
        self.width * self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.def.name.as_str())
    }

    pub fn def(&self, id: ResourceId) -> Result<&ResourceDef> {
        self.resources
            .get(id)
            .map(|r| &r.def)
            .ok_or(CoreError::InvalidResourceId(id))
    }

    pub fn resource_by_name(&self, name: &str) -> Result<ResourceId> {
        self.resources
            .iter()
            .position(|r| r.def.name == name)
            .ok_or_else(|| CoreError::UnknownResource(name.to_string()))
    }

    /// Whole spatial updates applied so far.
    pub fn spatial_updates(&self) -> u64 {
        self.spatial_updates
    }

    /// Records `dt` updates of elapsed time. Nothing is integrated until the
    /// next access.
    pub fn update(&mut self, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        self.pending_steps += dt * STEPS_PER_UPDATE;
        self.pending_spatial += dt;
    }

    /// Integrates all pending time.
    pub fn flush(&mut self) {
        let steps = self.pending_steps.floor();
        if steps >= 1.0 {
            self.pending_steps -= steps;
            let steps = steps as usize;
            for r in &mut self.resources {
                r.integrate(steps);
            }
        }

        let (width, height) = (self.width, self.height);
        while self.pending_spatial >= 1.0 {
            self.pending_spatial -= 1.0;
            self.spatial_updates += 1;
            #[cfg(feature = "std")]
            self.resources
                .par_iter_mut()
                .for_each(|r| r.step_spatial(width, height));
            #[cfg(not(feature = "std"))]
            self.resources
                .iter_mut()
                .for_each(|r| r.step_spatial(width, height));
        }
    }

    fn check_cell(&self, cell: CellId) -> Result<()> {
        if cell < self.num_cells() {
            Ok(())
        } else {
            Err(CoreError::InvalidCellId(cell))
        }
    }

    fn state_mut(&mut self, id: ResourceId) -> Result<&mut ResourceState> {
        self.resources
            .get_mut(id)
            .ok_or(CoreError::InvalidResourceId(id))
    }

    /// Total level of a resource; the sum over cells for spatial resources.
    pub fn get(&mut self, id: ResourceId) -> Result<f64> {
        if id >= self.resources.len() {
            return Err(CoreError::InvalidResourceId(id));
        }
        self.flush();
        Ok(self.resources[id].total())
    }

    /// Levels of every resource.
    pub fn levels(&mut self) -> Vec<f64> {
        self.flush();
        self.resources.iter().map(ResourceState::total).collect()
    }

    pub fn total_level(&mut self) -> f64 {
        self.levels().iter().sum()
    }

    /// Sets a resource's total, spread evenly for spatial resources.
    pub fn set(&mut self, id: ResourceId, level: f64) -> Result<()> {
        self.flush();
        let r = self.state_mut(id)?;
        let level = if r.def.allow_negative { level } else { level.max(0.0) };
        match &mut r.levels {
            Levels::Scalar(v) => *v = level,
            Levels::Cells(field) => field.fill(level),
        }
        Ok(())
    }

    /// Adds `delta` to a resource's total.
    pub fn modify(&mut self, id: ResourceId, delta: f64) -> Result<()> {
        let current = self.get(id)?;
        self.set(id, current + delta)
    }

    /// Applies one delta per resource to a single cell.
    ///
    /// Global resources take the delta on their shared scalar. Partial
    /// resources ignore deltas from cells outside their list.
    pub fn modify_cell(&mut self, cell: CellId, deltas: &[f64]) -> Result<()> {
        self.check_cell(cell)?;
        if deltas.len() > self.resources.len() {
            return Err(CoreError::InvalidResourceId(self.resources.len()));
        }
        self.flush();
        for (r, delta) in self.resources.iter_mut().zip(deltas) {
            apply_cell_delta(r, cell, *delta);
        }
        Ok(())
    }

    pub fn modify_cell_resource(&mut self, cell: CellId, id: ResourceId, delta: f64) -> Result<()> {
        self.check_cell(cell)?;
        self.flush();
        let r = self.state_mut(id)?;
        apply_cell_delta(r, cell, delta);
        Ok(())
    }

    /// Level one cell sees. Global resources broadcast their scalar, and
    /// partial resources broadcast it to their listed cells only.
    pub fn cell_level(&mut self, cell: CellId, id: ResourceId) -> Result<f64> {
        self.check_cell(cell)?;
        self.flush();
        let r = self.state_mut(id)?;
        Ok(r.seen_from(cell))
    }

    /// Snapshot of every resource as seen from one cell.
    pub fn cell_resources(&mut self, cell: CellId) -> Result<Vec<f64>> {
        self.check_cell(cell)?;
        self.flush();
        Ok(self
            .resources
            .iter()
            .map(|r| r.seen_from(cell))
            .collect())
    }

    /// Removes up to `amount` from what `cell` sees and returns what was taken.
    pub fn withdraw(&mut self, cell: CellId, id: ResourceId, amount: f64) -> Result<f64> {
        let available = self.cell_level(cell, id)?.max(0.0);
        let taken = amount.max(0.0).min(available);
        if taken > 0.0 {
            self.modify_cell_resource(cell, id, -taken)?;
        }
        Ok(taken)
    }

    /// Current peak of a gradient resource.
    pub fn peak_position(&mut self, id: ResourceId) -> Result<(usize, usize)> {
        self.flush();
        let r = self.state_mut(id)?;
        r.gradient
            .as_ref()
            .map(|g| (g.peak_x, g.peak_y))
            .ok_or(CoreError::NotAGradient(id))
    }

    /// Resets every resource to its initial level plus `additional[id]`.
    pub fn reinitialize(&mut self, additional: &[f64]) {
        self.pending_steps = 0.0;
        self.pending_spatial = 0.0;
        for (i, r) in self.resources.iter_mut().enumerate() {
            let extra = additional.get(i).copied().unwrap_or(0.0);
            r.reset(r.def.initial + extra);
        }
    }
}

fn apply_cell_delta(r: &mut ResourceState, cell: CellId, delta: f64) {
    if delta == 0.0 || !r.reaches(cell) {
        return;
    }
    let allow_negative = r.def.allow_negative;
    match &mut r.levels {
        Levels::Scalar(v) => {
            let next = *v + delta;
            *v = if allow_negative { next } else { next.max(0.0) };
        }
        Levels::Cells(field) => field.add(cell, delta, allow_negative),
    }
}
