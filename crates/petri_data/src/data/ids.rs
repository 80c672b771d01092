/// Index of a cell in the world grid (`y * width + x`).
pub type CellId = usize;
/// Index of a resource in its owning grid.
pub type ResourceId = usize;
/// Index of a deme in the population.
pub type DemeId = usize;
/// Stable genotype identifier, never reused within a run.
pub type GenotypeId = u64;
