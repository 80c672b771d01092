use super::{sanitize_weight, SchedulePolicy, Scheduler};
use petri_data::CellId;

/// Visits weighted cells in cell order, one slice each, ignoring weight magnitude.
#[derive(Debug, Clone)]
pub struct RoundRobinScheduler {
    weights: Vec<f64>,
    cursor: usize,
    active: usize,
}

impl RoundRobinScheduler {
    pub fn new(num_cells: usize) -> Self {
        Self {
            weights: vec![0.0; num_cells],
            cursor: 0,
            active: 0,
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn adjust(&mut self, cell: CellId, weight: f64) {
        let Some(slot) = self.weights.get_mut(cell) else {
            tracing::warn!(cell, "Scheduler adjust on unknown cell");
            return;
        };
        let weight = sanitize_weight(cell, weight);
        match (*slot > 0.0, weight > 0.0) {
            (false, true) => self.active += 1,
            (true, false) => self.active -= 1,
            _ => {}
        }
        *slot = weight;
    }

    fn next(&mut self) -> Option<CellId> {
        if self.active == 0 {
            return None;
        }
        let n = self.weights.len();
        for offset in 0..n {
            let cell = (self.cursor + offset) % n;
            if self.weights[cell] > 0.0 {
                self.cursor = (cell + 1) % n;
                return Some(cell);
            }
        }
        None
    }

    fn weight(&self, cell: CellId) -> f64 {
        self.weights.get(cell).copied().unwrap_or(0.0)
    }

    fn active_count(&self) -> usize {
        self.active
    }

    fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    fn policy(&self) -> SchedulePolicy {
        SchedulePolicy::RoundRobin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_order() {
        let mut s = RoundRobinScheduler::new(5);
        s.adjust(1, 10.0);
        s.adjust(3, 1.0);
        s.adjust(4, 0.5);
        let order: Vec<_> = (0..6).filter_map(|_| s.next()).collect();
        assert_eq!(order, vec![1, 3, 4, 1, 3, 4]);
    }
}
