//! The population: cells, organisms, resources, scheduler and demes, and the
//! update loop that drives them.
//!
//! One update runs:
//!
//! 1. **PreUpdate**: remember the spatial-update counter.
//! 2. **ScheduleAndExecute**: `avg_time_slice × organisms` micro-steps, each
//!    asking the scheduler for a cell and applying the occupant's side effects
//!    before the next pick.
//! 3. **AgeGlobalResources**: one update of elapsed time on the global grid.
//! 4. **Demes**: events, deme pools and predicates age; replication triggers fire.
//! 5. **CollectStats** and **PostUpdate**: occupancy invariant, genotype pruning.

mod replication;

use crate::cell::{build_cells, Cell};
use crate::config::AppConfig;
use crate::deme::Deme;
use crate::error::{CoreError, Result};
use crate::genotype::{GenotypeLease, GenotypeRegistry};
use crate::metrics::Metrics;
use crate::organism::{
    BirthRequest, Cpu, ExecutionContext, ExecutionOutcome, Hardware, Identity, Phenotype, Placement,
};
use crate::placement::{choose_cell, OccupantInfo};
use crate::resource::ResourceGrid;
use crate::schedule::{self, Scheduler};
use hecs::Entity;
use petri_data::{CellId, DemeId, PopulationStats};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

/// Everything needed to place a new organism.
#[derive(Debug)]
pub struct NewOrganism {
    pub hardware: Box<dyn Hardware>,
    pub genotype: GenotypeLease,
    pub merit: f64,
    pub generation: u64,
    pub placement: Placement,
}

/// Per-update tallies, folded into [`PopulationStats`].
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    births: u64,
    deaths: u64,
    slices: u64,
    replications: u64,
}

pub struct Population {
    config: AppConfig,
    seed: u64,
    cells: Vec<Cell>,
    world: hecs::World,
    resources: ResourceGrid,
    scheduler: Box<dyn Scheduler>,
    demes: Vec<Deme>,
    genotypes: GenotypeRegistry,
    rng: ChaCha8Rng,
    update: u64,
    live: usize,
    spatial_mark: u64,
    tally: Tally,
    stats: PopulationStats,
    metrics: Metrics,
}

impl std::fmt::Debug for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Population")
            .field("update", &self.update)
            .field("live", &self.live)
            .field("cells", &self.cells.len())
            .field("demes", &self.demes.len())
            .finish()
    }
}

impl Population {
    /// Builds an empty population. Configuration errors are fatal here.
    pub fn new(config: AppConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CoreError::config(e.to_string()))?;
        let seed = config.world.seed.unwrap_or_else(rand::random);
        let (width, height) = (config.world.width, config.world.height);
        let num_demes = config.demes.num_demes;
        let cells = build_cells(width, height, config.world.geometry, num_demes);
        let resources = ResourceGrid::new(&config.resources, width, height, seed)?;
        let scheduler = schedule::build(config.scheduler.policy, cells.len(), seed);
        let deme_height = config.deme_height();
        let demes = (0..num_demes)
            .map(|d| {
                Deme::new(
                    d,
                    d * deme_height * width,
                    width,
                    deme_height,
                    &config.demes,
                    &config.environment,
                    seed,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            width,
            height,
            demes = num_demes,
            resources = resources.len(),
            policy = ?config.scheduler.policy,
            seed,
            "Population created"
        );

        Ok(Self {
            config,
            seed,
            cells,
            world: hecs::World::new(),
            resources,
            scheduler,
            demes,
            genotypes: GenotypeRegistry::new(),
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(0x5EED)),
            update: 0,
            live: 0,
            spatial_mark: 0,
            tally: Tally::default(),
            stats: PopulationStats::default(),
            metrics: Metrics::new(),
        })
    }

    // ----- accessors -----

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn update_number(&self) -> u64 {
        self.update
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(id).ok_or(CoreError::InvalidCellId(id))
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Organisms in the live registry.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Cells with an occupant.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    pub fn resources(&self) -> &ResourceGrid {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceGrid {
        &mut self.resources
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn demes(&self) -> &[Deme] {
        &self.demes
    }

    pub fn deme(&self, id: DemeId) -> Result<&Deme> {
        self.demes.get(id).ok_or(CoreError::InvalidDemeId(id))
    }

    pub fn deme_mut(&mut self, id: DemeId) -> Result<&mut Deme> {
        self.demes.get_mut(id).ok_or(CoreError::InvalidDemeId(id))
    }

    pub fn genotypes(&self) -> &GenotypeRegistry {
        &self.genotypes
    }

    pub fn genotypes_mut(&mut self) -> &mut GenotypeRegistry {
        &mut self.genotypes
    }

    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut hecs::World {
        &mut self.world
    }

    pub(crate) fn set_update_number(&mut self, update: u64) {
        self.update = update;
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Statistics of the last completed update.
    pub fn stats(&self) -> &PopulationStats {
        &self.stats
    }

    pub fn occupant(&self, cell: CellId) -> Option<Entity> {
        self.cells.get(cell).and_then(|c| c.occupant)
    }

    pub fn phenotype(&self, cell: CellId) -> Option<Phenotype> {
        let entity = self.occupant(cell)?;
        self.world.get::<&Phenotype>(entity).ok().map(|p| (*p).clone())
    }

    pub fn identity(&self, cell: CellId) -> Option<Identity> {
        let entity = self.occupant(cell)?;
        self.world.get::<&Identity>(entity).ok().map(|i| (*i).clone())
    }

    pub fn placement(&self, cell: CellId) -> Option<Placement> {
        let entity = self.occupant(cell)?;
        self.world.get::<&Placement>(entity).ok().map(|p| (*p).clone())
    }

    // ----- organism registry -----

    /// Scheduler weight for an organism of `merit` in `cell`.
    fn weight_for(&self, cell: CellId, merit: f64) -> f64 {
        if self.config.demes.have_merit {
            merit * self.demes[self.cells[cell].deme].current_merit()
        } else {
            merit
        }
    }

    /// Places a new organism with a fresh genotype in `cell`.
    pub fn inject(&mut self, cell: CellId, hardware: Box<dyn Hardware>, merit: f64) -> Result<Entity> {
        let genotype = self.genotypes.register(None, self.update);
        self.insert_organism(
            cell,
            NewOrganism {
                hardware,
                genotype,
                merit,
                generation: 0,
                placement: Placement::at(cell),
            },
            false,
        )
    }

    /// Kills whatever occupies `cell`, then places `organism` there.
    pub fn insert_organism(&mut self, cell: CellId, organism: NewOrganism, birth: bool) -> Result<Entity> {
        if cell >= self.cells.len() {
            return Err(CoreError::InvalidCellId(cell));
        }
        self.kill_organism(cell)?;

        let NewOrganism {
            hardware,
            genotype,
            merit,
            generation,
            mut placement,
        } = organism;
        placement.cell = cell;
        let genotype_id = genotype.id();
        let merit = merit.max(0.0);
        let entity = self.world.spawn((
            Identity {
                genotype,
                generation,
                birth_update: self.update,
            },
            Phenotype::new(
                merit,
                self.config.environment.num_tasks,
                self.config.environment.num_reactions,
            ),
            placement,
            Cpu(Some(hardware)),
        ));
        self.cells[cell].occupant = Some(entity);
        self.genotypes.add_organism(genotype_id);
        let deme = self.cells[cell].deme;
        self.demes[deme].organism_added(birth);
        self.live += 1;
        let weight = self.weight_for(cell, merit);
        self.scheduler.adjust(cell, weight);
        tracing::debug!(cell, genotype = genotype_id, birth, "Organism inserted");
        Ok(entity)
    }

    /// Removes the occupant of `cell`, if any. Returns whether one was removed.
    ///
    /// If the organism is mid-slice its executable is held by the update loop
    /// and is dropped when the slice returns instead of being restored.
    pub fn kill_organism(&mut self, cell: CellId) -> Result<bool> {
        let Some(entity) = self.cells.get_mut(cell).ok_or(CoreError::InvalidCellId(cell))?.occupant.take()
        else {
            return Ok(false);
        };
        if let Ok(identity) = self.world.get::<&Identity>(entity) {
            self.genotypes.remove_organism(identity.genotype.id());
        }
        if self.world.despawn(entity).is_err() {
            return Err(CoreError::invariant(format!(
                "cell {cell} held a dead organism handle"
            )));
        }
        let deme = self.cells[cell].deme;
        self.demes[deme].organism_removed();
        self.scheduler.adjust(cell, 0.0);
        self.live -= 1;
        self.tally.deaths += 1;
        tracing::debug!(cell, "Organism removed");
        Ok(true)
    }

    /// Kills every organism in a deme. Returns how many died.
    pub fn kill_deme(&mut self, deme: DemeId) -> Result<usize> {
        let range = self.deme(deme)?.cell_range();
        let mut killed = 0;
        for cell in range {
            if self.kill_organism(cell)? {
                killed += 1;
            }
        }
        Ok(killed)
    }

    /// Resets a deme in place (see [`Deme::reset`]).
    pub fn reset_deme(&mut self, deme: DemeId, reset_resources: bool) -> Result<()> {
        let range = self.deme(deme)?.cell_range();
        self.demes[deme].reset(&mut self.cells[range], reset_resources, &[]);
        Ok(())
    }

    /// Sets an organism's merit and re-weights its cell.
    pub fn set_merit(&mut self, cell: CellId, merit: f64) -> Result<()> {
        let entity = self.occupant(cell).ok_or(CoreError::InvalidCellId(cell))?;
        let merit = merit.max(0.0);
        if let Ok(mut p) = self.world.get::<&mut Phenotype>(entity) {
            p.merit = merit;
        }
        let weight = self.weight_for(cell, merit);
        self.scheduler.adjust(cell, weight);
        Ok(())
    }

    fn random_occupied(&mut self, exclude: Option<CellId>) -> Option<CellId> {
        let occupied: Vec<CellId> = self
            .cells
            .iter()
            .filter(|c| c.is_occupied() && Some(c.id) != exclude)
            .map(|c| c.id)
            .collect();
        occupied.choose(&mut self.rng).copied()
    }

    // ----- update loop -----

    /// Runs one update.
    ///
    /// Only an invariant violation aborts the update; it is returned after
    /// being logged.
    pub fn tick(&mut self) -> Result<&PopulationStats> {
        let started = Instant::now();

        // PreUpdate
        self.spatial_mark = self.resources.spatial_updates();
        self.tally = Tally::default();

        // ScheduleAndExecute
        let budget = self.config.world.avg_time_slice * self.live as u64;
        for _ in 0..budget {
            let Some(cell) = self.scheduler.next() else {
                break;
            };
            if let Err(e) = self.process_slice(cell) {
                if e.is_fatal() {
                    tracing::error!(update = self.update, error = %e, "Update aborted");
                    return Err(e);
                }
                tracing::warn!(update = self.update, cell, error = %e, "Slice side effect failed");
            }
        }

        // AgeGlobalResources
        self.resources.update(1.0);

        self.process_demes()?;
        self.replicate_demes()?;

        // CollectStats
        self.collect_stats();

        // PostUpdate
        self.check_occupancy()?;
        self.genotypes.prune();
        self.update += 1;
        let total = self.resources.total_level();
        self.metrics
            .record_update(started.elapsed(), self.live, self.tally.slices, total);
        Ok(&self.stats)
    }

    /// Runs `updates` updates, stopping at the first fatal error.
    pub fn run(&mut self, updates: u64) -> Result<()> {
        for _ in 0..updates {
            self.tick()?;
        }
        Ok(())
    }

    /// Verifies `live == occupied cells`.
    pub fn check_occupancy(&self) -> Result<()> {
        let occupied = self.occupied_count();
        let registered = self.world.len() as usize;
        if occupied != self.live || registered != self.live {
            let e = CoreError::invariant(format!(
                "live count {} but {} occupied cells and {} registered organisms",
                self.live, occupied, registered
            ));
            tracing::error!(error = %e, "Occupancy check failed");
            return Err(e);
        }
        Ok(())
    }

    /// Grants one execution slice to the occupant of `cell` and applies its side effects.
    pub fn process_slice(&mut self, cell: CellId) -> Result<()> {
        let Some(entity) = self.occupant(cell) else {
            // stale weight on a vacant cell
            self.scheduler.adjust(cell, 0.0);
            return Ok(());
        };
        self.tally.slices += 1;
        self.cells[cell].visits += 1;

        let deme_id = self.cells[cell].deme;
        let rel = self.demes[deme_id].to_relative(cell)?;
        let mut snapshot = self.resources.cell_resources(cell)?;
        snapshot.extend(self.demes[deme_id].resources_mut().cell_resources(rel)?);
        self.cells[cell].resources.clone_from(&snapshot);

        let (merit, age) = {
            let p = self
                .world
                .get::<&Phenotype>(entity)
                .map_err(|_| CoreError::invariant(format!("organism in cell {cell} has no phenotype")))?;
            (p.merit, p.age)
        };
        let Some(mut hardware) = self
            .world
            .get::<&mut Cpu>(entity)
            .ok()
            .and_then(|mut cpu| cpu.0.take())
        else {
            return Ok(());
        };

        let ctx = ExecutionContext {
            cell,
            deme: deme_id,
            resources: &snapshot,
            merit,
            age,
            update: self.update,
        };
        let outcome = hardware.execute(&ctx);
        let result = self.apply_outcome(cell, entity, outcome);

        // deferred delete: a killed organism's executable is dropped here
        if let Ok(mut cpu) = self.world.get::<&mut Cpu>(entity) {
            cpu.0 = Some(hardware);
        }
        result
    }

    fn apply_outcome(&mut self, cell: CellId, entity: Entity, outcome: ExecutionOutcome) -> Result<()> {
        let deme_id = self.cells[cell].deme;
        let global_count = self.resources.len();
        let rel = self.demes[deme_id].to_relative(cell)?;

        let mut gained = 0.0;
        for (rid, amount) in &outcome.resource_requests {
            let taken = if *rid < global_count {
                self.resources.withdraw(cell, *rid, *amount)
            } else {
                self.demes[deme_id]
                    .resources_mut()
                    .withdraw(rel, rid - global_count, *amount)
                    .map_err(|e| match e {
                        CoreError::InvalidResourceId(_) => CoreError::InvalidResourceId(*rid),
                        other => other,
                    })
            };
            match taken {
                Ok(t) => gained += t,
                Err(e) => tracing::warn!(cell, error = %e, "Resource request rejected"),
            }
        }

        let env = &self.config.environment;
        let tasks: Vec<usize> = outcome
            .tasks
            .iter()
            .copied()
            .filter(|&task| {
                let known = task < env.num_tasks;
                if !known {
                    tracing::warn!(cell, task, "Unknown task id rejected");
                }
                known
            })
            .collect();
        let reactions: Vec<usize> = outcome
            .reactions
            .iter()
            .copied()
            .filter(|&reaction| {
                let known = reaction < env.num_reactions;
                if !known {
                    tracing::warn!(cell, reaction, "Unknown reaction id rejected");
                }
                known
            })
            .collect();

        let merit = {
            let mut p = self
                .world
                .get::<&mut Phenotype>(entity)
                .map_err(|_| CoreError::invariant(format!("organism in cell {cell} has no phenotype")))?;
            p.age += 1;
            p.gestation_offset += outcome.consumed_cycles;
            p.energy += gained;
            for &task in &tasks {
                p.record_task(task);
            }
            for &reaction in &reactions {
                p.record_reaction(reaction);
            }
            if outcome.merit_delta != 0.0 {
                p.merit = (p.merit + outcome.merit_delta).max(0.0);
            }
            p.merit
        };
        {
            let deme = &mut self.demes[deme_id];
            for &task in &tasks {
                deme.record_task(task);
            }
            for &reaction in &reactions {
                deme.record_reaction(reaction);
            }
            if !reactions.is_empty() {
                deme.accumulate_reaction_merit(reactions.len());
            }
        }
        if outcome.merit_delta != 0.0 {
            let weight = self.weight_for(cell, merit);
            self.scheduler.adjust(cell, weight);
        }

        for request in outcome.birth_requests {
            if !self.world.contains(entity) {
                tracing::debug!(cell, "Parent replaced by its own offspring, dropping further births");
                break;
            }
            self.give_birth(cell, entity, request)?;
        }

        if outcome.is_dead && self.occupant(cell) == Some(entity) {
            self.kill_organism(cell)?;
        }
        Ok(())
    }

    /// Places the offspring of the organism `parent` in `parent_cell`.
    fn give_birth(&mut self, parent_cell: CellId, parent: Entity, request: BirthRequest) -> Result<CellId> {
        let (parent_genotype, generation) = {
            let identity = self
                .world
                .get::<&Identity>(parent)
                .map_err(|_| CoreError::invariant("birth from a dead parent"))?;
            (identity.genotype.clone(), identity.generation)
        };
        let parent_merit = {
            let mut p = self
                .world
                .get::<&mut Phenotype>(parent)
                .map_err(|_| CoreError::invariant("birth from a dead parent"))?;
            p.divide();
            p.merit
        };

        let cap = self.config.birth.population_cap;
        if cap > 0 && self.live >= cap {
            if let Some(victim) = self.random_occupied(Some(parent_cell)) {
                tracing::debug!(victim, "Population cap reached, culling");
                self.kill_organism(victim)?;
            }
        }

        let target = self.offspring_cell(parent_cell)?;
        let genotype = if request.novel_genotype {
            self.genotypes.register(Some(parent_genotype.id()), self.update)
        } else {
            parent_genotype
        };
        self.insert_organism(
            target,
            NewOrganism {
                hardware: request.hardware,
                genotype,
                merit: request.merit.unwrap_or(parent_merit),
                generation: generation + 1,
                placement: Placement::at(target),
            },
            true,
        )?;
        self.tally.births += 1;
        self.metrics.increment_counter("births");
        Ok(target)
    }

    /// Runs the birth policy, resolving exhaustion through the fallback chain:
    /// the parent's own cell when parents may be replaced, otherwise a random
    /// resident neighbour.
    fn offspring_cell(&mut self, parent_cell: CellId) -> Result<CellId> {
        let world = &self.world;
        let cells = &self.cells;
        let info = |c: CellId| {
            cells[c].occupant.and_then(|e| {
                world.get::<&Phenotype>(e).ok().map(|p| OccupantInfo {
                    age: p.age,
                    merit: p.merit,
                })
            })
        };
        match choose_cell(&self.config.birth, parent_cell, cells, info, &mut self.rng) {
            Ok(cell) => Ok(cell),
            Err(CoreError::CapacityExhausted { parent }) => {
                self.metrics.increment_counter("placement_fallback");
                let fallback = if self.config.birth.allow_parent {
                    parent
                } else {
                    let neighbors = &self.cells[parent].neighbors;
                    if neighbors.is_empty() {
                        parent
                    } else {
                        neighbors[self.rng.gen_range(0..neighbors.len())]
                    }
                };
                tracing::warn!(parent, fallback, "No eligible cell for offspring, using fallback");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }

    /// Ages every deme and kills occupants claimed by kill events.
    fn process_demes(&mut self) -> Result<()> {
        for d in 0..self.demes.len() {
            let range = self.demes[d].cell_range();
            let doomed = self.demes[d].process_update(&mut self.cells[range]);
            for cell in doomed {
                self.kill_organism(cell)?;
            }
        }
        Ok(())
    }

    fn collect_stats(&mut self) {
        let mut merit_sum = 0.0;
        let mut max_generation = 0;
        for (_entity, (identity, phenotype)) in self.world.query::<(&Identity, &Phenotype)>().iter() {
            merit_sum += phenotype.merit;
            max_generation = max_generation.max(identity.generation);
        }
        let levels = self.resources.levels();
        self.stats = PopulationStats {
            update: self.update,
            organisms: self.live,
            births: self.tally.births,
            deaths: self.tally.deaths,
            executed_slices: self.tally.slices,
            average_merit: if self.live > 0 { merit_sum / self.live as f64 } else { 0.0 },
            max_generation,
            genotypes: self.genotypes.active_count(),
            replications: self.tally.replications,
            resource_levels: self
                .resources
                .names()
                .map(str::to_string)
                .zip(levels)
                .collect(),
        };
    }

    /// Whole spatial resource updates applied during the current update so far.
    pub fn spatial_updates_this_update(&self) -> u64 {
        self.resources.spatial_updates() - self.spatial_mark
    }
}
