//! Organism components and the executable interface.
//!
//! Organisms are entities in a `hecs::World`. The virtual machine that runs
//! them is opaque to the core: it is reached only through [`Hardware`] and
//! reports its effects as an [`ExecutionOutcome`].

use crate::genotype::GenotypeLease;
use petri_data::{CellId, DemeId, ResourceId};

/// Something that can run one execution slice and copy itself.
pub trait Hardware: Send + Sync + std::fmt::Debug {
    fn execute(&mut self, ctx: &ExecutionContext<'_>) -> ExecutionOutcome;

    /// A fresh executable for an offspring or clone.
    fn replicate(&self) -> Box<dyn Hardware>;

    fn kind(&self) -> &str {
        "hardware"
    }
}

/// What an organism can see while it executes.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub cell: CellId,
    pub deme: DemeId,
    /// Resource levels at the cell, global resources first, then the deme pool.
    pub resources: &'a [f64],
    pub merit: f64,
    pub age: u64,
    pub update: u64,
}

#[derive(Debug)]
pub struct BirthRequest {
    pub hardware: Box<dyn Hardware>,
    /// Register a new genotype for the offspring instead of sharing the parent's.
    pub novel_genotype: bool,
    /// Starting merit; defaults to the parent's.
    pub merit: Option<f64>,
}

impl BirthRequest {
    pub fn clone_of(hardware: Box<dyn Hardware>) -> Self {
        Self {
            hardware,
            novel_genotype: false,
            merit: None,
        }
    }
}

/// Side effects of one execution slice.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub consumed_cycles: u64,
    pub merit_delta: f64,
    /// Amounts to withdraw from the organism's cell, indexed like `ExecutionContext::resources`.
    pub resource_requests: Vec<(ResourceId, f64)>,
    pub birth_requests: Vec<BirthRequest>,
    pub is_dead: bool,
    /// Task ids completed during the slice.
    pub tasks: Vec<usize>,
    /// Reaction ids triggered during the slice.
    pub reactions: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub genotype: GenotypeLease,
    pub generation: u64,
    pub birth_update: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phenotype {
    pub merit: f64,
    /// Cycles taken by the last completed gestation.
    pub gestation_time: u64,
    /// Cycles executed since the last birth.
    pub gestation_offset: u64,
    /// Execution slices received.
    pub age: u64,
    pub cur_tasks: Vec<u32>,
    pub cur_reactions: Vec<u32>,
    /// Resources collected so far.
    pub energy: f64,
}

impl Phenotype {
    /// Counters are sized once from the environment's task and reaction tables.
    pub fn new(merit: f64, num_tasks: usize, num_reactions: usize) -> Self {
        Self {
            merit,
            gestation_time: 0,
            gestation_offset: 0,
            age: 0,
            cur_tasks: vec![0; num_tasks],
            cur_reactions: vec![0; num_reactions],
            energy: 0.0,
        }
    }

    /// Returns false for a task id outside the table.
    pub fn record_task(&mut self, task: usize) -> bool {
        bump(&mut self.cur_tasks, task)
    }

    /// Returns false for a reaction id outside the table.
    pub fn record_reaction(&mut self, reaction: usize) -> bool {
        bump(&mut self.cur_reactions, reaction)
    }

    /// Closes the current gestation after a successful birth.
    pub fn divide(&mut self) {
        self.gestation_time = self.gestation_offset;
        self.gestation_offset = 0;
    }
}

/// Increments `counts[index]`. Out-of-range ids leave the counters untouched.
pub(crate) fn bump(counts: &mut [u32], index: usize) -> bool {
    match counts.get_mut(index) {
        Some(count) => {
            *count = count.saturating_add(1);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub cell: CellId,
    pub birth_cell: CellId,
    pub group: Option<u32>,
    pub forager: Option<u32>,
    pub avatar_cell: Option<CellId>,
}

impl Placement {
    pub fn at(cell: CellId) -> Self {
        Self {
            cell,
            birth_cell: cell,
            group: None,
            forager: None,
            avatar_cell: None,
        }
    }
}

/// The organism's executable. `None` while its slice is running.
#[derive(Debug)]
pub struct Cpu(pub Option<Box<dyn Hardware>>);
