use serde::{Deserialize, Serialize};

/// Per-update summary handed to whatever collects statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub update: u64,
    pub organisms: usize,
    pub births: u64,
    pub deaths: u64,
    pub executed_slices: u64,
    pub average_merit: f64,
    pub max_generation: u64,
    pub genotypes: usize,
    pub replications: u64,
    pub resource_levels: Vec<(String, f64)>,
}
