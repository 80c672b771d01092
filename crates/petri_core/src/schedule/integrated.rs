use super::{sanitize_weight, Pass, SchedulePolicy, Scheduler};
use petri_data::CellId;
use std::collections::BTreeSet;

/// Deterministic fair-share scheduler.
///
/// Each cell owns a pass value that advances by `1 / weight` every time it is
/// served; the lowest pass runs next, ties broken by cell id. Over any window a
/// cell receives slices in proportion to its weight.
#[derive(Debug, Clone)]
pub struct IntegratedScheduler {
    weights: Vec<f64>,
    pass: Vec<f64>,
    queue: BTreeSet<(Pass, CellId)>,
    global_pass: f64,
    total: f64,
}

impl IntegratedScheduler {
    pub fn new(num_cells: usize) -> Self {
        Self {
            weights: vec![0.0; num_cells],
            pass: vec![0.0; num_cells],
            queue: BTreeSet::new(),
            global_pass: 0.0,
            total: 0.0,
        }
    }
}

impl Scheduler for IntegratedScheduler {
    fn adjust(&mut self, cell: CellId, weight: f64) {
        if cell >= self.weights.len() {
            tracing::warn!(cell, "Scheduler adjust on unknown cell");
            return;
        }
        let weight = sanitize_weight(cell, weight);
        let old = self.weights[cell];
        if old > 0.0 {
            self.queue.remove(&(Pass(self.pass[cell]), cell));
        }
        if weight > 0.0 {
            self.pass[cell] = if old > 0.0 {
                // keep the same fraction of a stride left before the next slice
                let remaining = (self.pass[cell] - self.global_pass).max(0.0);
                self.global_pass + remaining * old / weight
            } else {
                self.global_pass + 1.0 / weight
            };
            self.queue.insert((Pass(self.pass[cell]), cell));
        }
        self.total += weight - old;
        self.weights[cell] = weight;
        if self.queue.is_empty() {
            self.total = 0.0;
        }
    }

    fn next(&mut self) -> Option<CellId> {
        let (Pass(pass), cell) = self.queue.pop_first()?;
        self.global_pass = pass;
        let advanced = pass + 1.0 / self.weights[cell];
        self.pass[cell] = advanced;
        self.queue.insert((Pass(advanced), cell));
        Some(cell)
    }

    fn weight(&self, cell: CellId) -> f64 {
        self.weights.get(cell).copied().unwrap_or(0.0)
    }

    fn active_count(&self) -> usize {
        self.queue.len()
    }

    fn total_weight(&self) -> f64 {
        self.total
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::MeritIntegrated
    }
}
