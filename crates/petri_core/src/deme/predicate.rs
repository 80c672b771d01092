//! Conditions a deme can be asked to satisfy.

use super::event::CellEvent;
use crate::cell::Cell;
use crate::resource::ResourceGrid;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DemePredicate {
    /// The deme's own pool holds more than `threshold` of `resource`.
    ResourceThreshold { resource: String, threshold: f64 },
    /// At least `fraction` of the cells marked by active event `event` are occupied.
    EventCellsOccupied { event: usize, fraction: f64 },
}

/// A predicate and whether it has fired since the last reset.
#[derive(Debug, Clone)]
pub struct PredicateState {
    pub predicate: DemePredicate,
    satisfied: bool,
}

impl PredicateState {
    pub fn new(predicate: DemePredicate) -> Self {
        Self {
            predicate,
            satisfied: false,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn reset(&mut self) {
        self.satisfied = false;
    }

    /// Re-checks the predicate; once satisfied it stays so until reset.
    pub fn evaluate(&mut self, pool: &mut ResourceGrid, events: &[CellEvent], cells: &[Cell]) -> bool {
        if self.satisfied {
            return true;
        }
        self.satisfied = match &self.predicate {
            DemePredicate::ResourceThreshold { resource, threshold } => pool
                .resource_by_name(resource)
                .and_then(|id| pool.get(id))
                .map(|level| level > *threshold)
                .unwrap_or(false),
            DemePredicate::EventCellsOccupied { event, fraction } => {
                events.get(*event).filter(|e| e.is_active()).is_some_and(|e| {
                    let targets = e.targets();
                    let occupied = targets.iter().filter(|c| cells[**c].is_occupied()).count();
                    !targets.is_empty() && occupied as f64 >= *fraction * targets.len() as f64
                })
            }
        };
        self.satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petri_data::ResourceDef;

    #[test]
    fn test_resource_threshold_latches() {
        let mut pool = ResourceGrid::new(&[ResourceDef::global("food", 5.0, 0.0)], 2, 2, 0).unwrap();
        let mut p = PredicateState::new(DemePredicate::ResourceThreshold {
            resource: "food".into(),
            threshold: 4.0,
        });
        assert!(p.evaluate(&mut pool, &[], &[]));
        pool.set(0, 0.0).unwrap();
        assert!(p.evaluate(&mut pool, &[], &[]));
        p.reset();
        assert!(!p.evaluate(&mut pool, &[], &[]));
    }

    #[test]
    fn test_unknown_resource_never_fires() {
        let mut pool = ResourceGrid::new(&[], 1, 1, 0).unwrap();
        let mut p = PredicateState::new(DemePredicate::ResourceThreshold {
            resource: "nope".into(),
            threshold: 0.0,
        });
        assert!(!p.evaluate(&mut pool, &[], &[]));
    }
}
