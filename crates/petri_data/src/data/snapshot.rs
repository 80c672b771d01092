use super::ids::{CellId, DemeId, GenotypeId};
use serde::{Deserialize, Serialize};

/// Frozen copy of the phenotype fields a founder is remembered by.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhenotypeSnapshot {
    pub merit: f64,
    pub gestation_time: u64,
    pub generation: u64,
    pub tasks: Vec<u32>,
}

/// One living organism, enough to reconstruct placement on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismRecord {
    pub cell_id: CellId,
    pub genotype_id: GenotypeId,
    /// Cycles executed since the last completed gestation.
    pub gestation_offset: u64,
    pub merit: f64,
    pub generation: u64,
    pub birth_cell: CellId,
    #[serde(default)]
    pub group: Option<u32>,
    #[serde(default)]
    pub forager: Option<u32>,
    #[serde(default)]
    pub avatar_cell: Option<CellId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenotypeRecordData {
    pub id: GenotypeId,
    pub parent: Option<GenotypeId>,
    pub birth_update: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemeRecord {
    pub id: DemeId,
    pub founders: Vec<(GenotypeId, PhenotypeSnapshot)>,
    pub germline: Option<GenotypeId>,
    pub current_merit: f64,
    pub heritable_merit: f64,
    pub age: u64,
    pub generation: u64,
}

/// Minimal persisted state of a population: layout, lineage references and deme merit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub update: u64,
    pub width: usize,
    pub height: usize,
    pub organisms: Vec<OrganismRecord>,
    pub genotypes: Vec<GenotypeRecordData>,
    pub demes: Vec<DemeRecord>,
}
