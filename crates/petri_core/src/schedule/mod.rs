//! Merit-weighted execution schedulers.
//!
//! Every occupied cell carries a weight (its organism's merit). A weight of
//! zero marks a cell that must not be scheduled until it is re-weighted.

mod integrated;
mod probabilistic;
mod round_robin;

pub use integrated::IntegratedScheduler;
pub use probabilistic::{ProbabilisticIntegratedScheduler, ProbabilisticScheduler, WeightTree};
pub use round_robin::RoundRobinScheduler;

use petri_data::CellId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    RoundRobin,
    #[default]
    MeritIntegrated,
    Probabilistic,
    ProbabilisticIntegrated,
}

/// Hands out execution slices to weighted cells.
pub trait Scheduler: Send + std::fmt::Debug {
    /// Sets the weight of `cell`. Negative and non-finite weights count as 0.
    fn adjust(&mut self, cell: CellId, weight: f64);

    /// The next cell to execute, or `None` when every weight is 0.
    fn next(&mut self) -> Option<CellId>;

    fn weight(&self, cell: CellId) -> f64;

    /// Cells with a positive weight.
    fn active_count(&self) -> usize;

    fn total_weight(&self) -> f64;

    fn policy(&self) -> SchedulePolicy;
}

/// Builds the scheduler for `policy` over `num_cells` cells.
pub fn build(policy: SchedulePolicy, num_cells: usize, seed: u64) -> Box<dyn Scheduler> {
    match policy {
        SchedulePolicy::RoundRobin => Box::new(RoundRobinScheduler::new(num_cells)),
        SchedulePolicy::MeritIntegrated => Box::new(IntegratedScheduler::new(num_cells)),
        SchedulePolicy::Probabilistic => Box::new(ProbabilisticScheduler::new(num_cells, seed)),
        SchedulePolicy::ProbabilisticIntegrated => {
            Box::new(ProbabilisticIntegratedScheduler::new(num_cells, seed))
        }
    }
}

/// Clamps a caller-supplied weight to a usable value.
pub(crate) fn sanitize_weight(cell: CellId, weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        return weight;
    }
    if weight < 0.0 || weight.is_nan() {
        tracing::warn!(cell, weight, "Clamping invalid scheduler weight to 0");
    }
    0.0
}

/// Virtual-time stamp with a total order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pass(pub f64);

impl Eq for Pass {}

impl PartialOrd for Pass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pass {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
