//! Choosing a cell for an offspring.

use crate::cell::Cell;
use crate::config::BirthConfig;
use crate::error::{CoreError, Result};
use petri_data::CellId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BirthMethod {
    /// Replace the oldest neighbour.
    #[default]
    Age,
    /// Replace the neighbour with the lowest merit.
    Merit,
    /// Any neighbour.
    Random,
    /// Empty neighbours only.
    Empty,
    /// Any cell in the world.
    FullSoupRandom,
    /// The cell after the parent.
    NextCell,
}

/// What placement needs to know about an occupant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupantInfo {
    pub age: u64,
    pub merit: f64,
}

/// Picks the cell an offspring of `parent` goes to.
///
/// `info` describes the occupant of a cell, `None` for empty cells. Returns
/// `CapacityExhausted` when the policy leaves no candidate; the caller owns the
/// fallback.
pub fn choose_cell<R, F>(
    config: &BirthConfig,
    parent: CellId,
    cells: &[Cell],
    info: F,
    rng: &mut R,
) -> Result<CellId>
where
    R: Rng,
    F: Fn(CellId) -> Option<OccupantInfo>,
{
    let exhausted = CoreError::CapacityExhausted { parent };
    let parent_ok = |c: &CellId| config.allow_parent || *c != parent;

    match config.method {
        BirthMethod::FullSoupRandom => {
            if config.prefer_empty {
                let empty: Vec<CellId> = cells
                    .iter()
                    .map(|c| c.id)
                    .filter(|c| info(*c).is_none())
                    .collect();
                if let Some(cell) = empty.choose(rng) {
                    return Ok(*cell);
                }
            }
            let all: Vec<CellId> = (0..cells.len()).filter(parent_ok).collect();
            all.choose(rng).copied().ok_or(exhausted)
        }
        BirthMethod::NextCell => {
            let next = (parent + 1) % cells.len();
            if parent_ok(&next) {
                Ok(next)
            } else {
                Err(exhausted)
            }
        }
        method => {
            let neighbors = &cells[parent].neighbors;
            if config.prefer_empty || method == BirthMethod::Empty {
                let empty: Vec<CellId> = neighbors
                    .iter()
                    .copied()
                    .filter(|c| info(*c).is_none())
                    .collect();
                if let Some(cell) = empty.choose(rng) {
                    return Ok(*cell);
                }
            }
            let mut candidates: Vec<CellId> = neighbors.clone();
            if config.allow_parent {
                candidates.push(parent);
            }
            match method {
                BirthMethod::Empty => candidates
                    .into_iter()
                    .find(|c| info(*c).is_none())
                    .ok_or(exhausted),
                BirthMethod::Age => pick_best(&candidates, &info, |o| o.age as f64).ok_or(exhausted),
                BirthMethod::Merit => {
                    pick_best(&candidates, &info, |o| -o.merit).ok_or(exhausted)
                }
                BirthMethod::Random | BirthMethod::FullSoupRandom | BirthMethod::NextCell => {
                    candidates.choose(rng).copied().ok_or(exhausted)
                }
            }
        }
    }
}

/// Empty cells first, then the occupant with the highest `score`; earliest wins ties.
fn pick_best<F, S>(candidates: &[CellId], info: &F, score: S) -> Option<CellId>
where
    F: Fn(CellId) -> Option<OccupantInfo>,
    S: Fn(&OccupantInfo) -> f64,
{
    let mut best: Option<(CellId, f64)> = None;
    for &cell in candidates {
        let s = match info(cell) {
            None => return Some(cell),
            Some(o) => score(&o),
        };
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((cell, s));
        }
    }
    best.map(|(c, _)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::build_cells;
    use petri_data::Geometry;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn config(method: BirthMethod, prefer_empty: bool, allow_parent: bool) -> BirthConfig {
        BirthConfig {
            method,
            prefer_empty,
            allow_parent,
            population_cap: 0,
        }
    }

    fn full(cells: &[Cell]) -> HashMap<CellId, OccupantInfo> {
        cells
            .iter()
            .map(|c| {
                (
                    c.id,
                    OccupantInfo {
                        age: c.id as u64,
                        merit: 100.0 - c.id as f64,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_prefers_empty_neighbor() {
        let cells = build_cells(3, 3, Geometry::Grid, 1);
        let mut occ = full(&cells);
        occ.remove(&2);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cell = choose_cell(&config(BirthMethod::Age, true, true), 4, &cells, |c| occ.get(&c).copied(), &mut rng);
        assert_eq!(cell, Ok(2));
    }

    #[test]
    fn test_age_replaces_oldest() {
        let cells = build_cells(3, 3, Geometry::Grid, 1);
        let occ = full(&cells);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cell = choose_cell(&config(BirthMethod::Age, true, false), 4, &cells, |c| occ.get(&c).copied(), &mut rng);
        assert_eq!(cell, Ok(8));
    }

    #[test]
    fn test_merit_replaces_weakest() {
        let cells = build_cells(3, 3, Geometry::Grid, 1);
        let occ = full(&cells);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cell = choose_cell(&config(BirthMethod::Merit, false, false), 4, &cells, |c| occ.get(&c).copied(), &mut rng);
        assert_eq!(cell, Ok(8));
    }

    #[test]
    fn test_empty_method_exhausts() {
        let cells = build_cells(3, 3, Geometry::Grid, 1);
        let occ = full(&cells);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cell = choose_cell(&config(BirthMethod::Empty, false, false), 0, &cells, |c| occ.get(&c).copied(), &mut rng);
        assert_eq!(cell, Err(CoreError::CapacityExhausted { parent: 0 }));
    }

    #[test]
    fn test_next_cell_wraps() {
        let cells = build_cells(2, 2, Geometry::Grid, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let cell = choose_cell(&config(BirthMethod::NextCell, false, true), 3, &cells, |_| None, &mut rng);
        assert_eq!(cell, Ok(0));
    }

    #[test]
    fn test_full_soup_prefers_empty() {
        let cells = build_cells(5, 5, Geometry::Grid, 1);
        let mut occ = full(&cells);
        occ.remove(&24);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let cell = choose_cell(&config(BirthMethod::FullSoupRandom, true, true), 0, &cells, |c| occ.get(&c).copied(), &mut rng);
        assert_eq!(cell, Ok(24));
    }
}
