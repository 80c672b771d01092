//! Deme replication: triggers and the replace-deme procedure.

use super::{NewOrganism, Population};
use crate::config::ReplicationTrigger;
use crate::error::{CoreError, Result};
use crate::organism::{Cpu, Identity, Phenotype, Placement};
use petri_data::{CellId, DemeId, PhenotypeSnapshot};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

impl Population {
    /// Whether `deme` meets the configured replication trigger.
    pub fn replication_due(&self, deme: DemeId) -> Result<bool> {
        let d = self.deme(deme)?;
        if d.is_empty() {
            return Ok(false);
        }
        let c = &self.config.demes;
        Ok(match c.trigger {
            ReplicationTrigger::Disabled => false,
            ReplicationTrigger::Occupied => true,
            ReplicationTrigger::Full => d.org_count() == d.cell_count(),
            ReplicationTrigger::Corners => {
                let (a, b) = d.corner_cells();
                self.cells[a].is_occupied() && self.cells[b].is_occupied()
            }
            ReplicationTrigger::Age => d.age() >= c.max_age,
            ReplicationTrigger::Births => d.births() >= c.max_births,
            ReplicationTrigger::Predicates => d.predicates_satisfied(),
        })
    }

    /// Replicates every deme whose trigger fired into a random other deme.
    /// Returns the number of replications.
    ///
    /// Triggers are read once before anything is replaced, and a deme takes
    /// part in at most one replication per pass.
    pub fn replicate_demes(&mut self) -> Result<usize> {
        if self.config.demes.trigger == ReplicationTrigger::Disabled || self.demes.len() < 2 {
            return Ok(0);
        }
        let mut due = Vec::new();
        for deme in 0..self.demes.len() {
            if self.replication_due(deme)? {
                due.push(deme);
            }
        }
        let mut touched = BTreeSet::new();
        let mut count = 0;
        for source in due {
            if touched.contains(&source) {
                continue;
            }
            let targets: Vec<DemeId> = (0..self.demes.len())
                .filter(|d| *d != source && !touched.contains(d))
                .collect();
            let Some(&target) = targets.choose(&mut self.rng) else {
                tracing::debug!(update = self.update, source, "No free deme to replicate into");
                continue;
            };
            self.demes[source].mark_for_replication();
            self.replace_deme(source, target)?;
            touched.insert(source);
            touched.insert(target);
            count += 1;
        }
        Ok(count)
    }

    /// Seeds `target` and re-seeds `source` from one organism of `source`.
    ///
    /// Founders of both demes become the occupants `source` had. Every organism
    /// in both demes dies, `replicate_size` clones of the seed are injected
    /// around each centre, the target inherits `inherit_fraction` of the
    /// source's pool and the source's heritable merit, and both demes
    /// divide-reset.
    pub fn replace_deme(&mut self, source: DemeId, target: DemeId) -> Result<()> {
        self.deme(source)?;
        self.deme(target)?;
        if source == target {
            return Err(CoreError::InvalidDemeId(target));
        }
        if self.demes[source].is_empty() {
            return Err(CoreError::DemeNotOccupied(source));
        }

        // founders and seed
        let range = self.demes[source].cell_range();
        let occupied: Vec<CellId> = range.filter(|c| self.cells[*c].is_occupied()).collect();
        let mut founders = Vec::with_capacity(occupied.len());
        let mut generation_sum = 0.0;
        for &cell in &occupied {
            let (Some(identity), Some(phenotype)) = (self.identity(cell), self.phenotype(cell)) else {
                continue;
            };
            generation_sum += identity.generation as f64;
            founders.push((
                identity.genotype.clone(),
                PhenotypeSnapshot {
                    merit: phenotype.merit,
                    gestation_time: phenotype.gestation_time,
                    generation: identity.generation,
                    tasks: phenotype.cur_tasks.clone(),
                },
            ));
        }
        let avg_generation = generation_sum / occupied.len().max(1) as f64;
        let seed_cell = *occupied
            .choose(&mut self.rng)
            .ok_or(CoreError::DemeNotOccupied(source))?;
        let seed_entity = self
            .occupant(seed_cell)
            .ok_or(CoreError::DemeNotOccupied(source))?;
        let (seed_genotype, seed_generation) = {
            let identity = self
                .world
                .get::<&Identity>(seed_entity)
                .map_err(|_| CoreError::invariant("replication seed has no identity"))?;
            (identity.genotype.clone(), identity.generation)
        };
        let seed_merit = self
            .world
            .get::<&Phenotype>(seed_entity)
            .map(|p| p.merit)
            .map_err(|_| CoreError::invariant("replication seed has no phenotype"))?;
        let seed_hardware = self
            .world
            .get::<&Cpu>(seed_entity)
            .ok()
            .and_then(|cpu| cpu.0.as_ref().map(|hw| hw.replicate()))
            .ok_or_else(|| CoreError::invariant("replication seed is mid-execution"))?;

        // resources handed to the target
        let fraction = self.config.demes.inherit_fraction;
        let reset_resources = self.config.demes.reset_resources;
        let pool = self.demes[source].resources_mut();
        let mut inherited = pool.levels();
        for (id, level) in inherited.iter_mut().enumerate() {
            *level *= fraction;
            if !reset_resources && *level != 0.0 {
                pool.modify(id, -*level)?;
            }
        }

        self.kill_deme(source)?;
        self.kill_deme(target)?;

        // merit
        let heritable = self.demes[source].heritable_merit();
        self.demes[target].inherit_merit_from(heritable)?;
        self.demes[source].rotate_merit()?;

        // lineage
        let source_generation = self.demes[source].generation();
        for deme in [source, target] {
            let d = &mut self.demes[deme];
            d.clear_founders();
            for (lease, snapshot) in &founders {
                d.add_founder(lease.clone(), snapshot.clone());
            }
            d.replace_germline(seed_genotype.clone());
        }

        let target_range = self.demes[target].cell_range();
        self.demes[target].divide_reset(
            &mut self.cells[target_range],
            source_generation,
            avg_generation,
            reset_resources,
            &inherited,
        );
        let source_range = self.demes[source].cell_range();
        self.demes[source].divide_reset(
            &mut self.cells[source_range],
            source_generation,
            avg_generation,
            reset_resources,
            &[],
        );

        let clones = self.config.demes.replicate_size;
        for deme in [source, target] {
            for cell in self.seed_cells(deme, clones) {
                self.insert_organism(
                    cell,
                    NewOrganism {
                        hardware: seed_hardware.replicate(),
                        genotype: seed_genotype.clone(),
                        merit: seed_merit,
                        generation: seed_generation,
                        placement: Placement::at(cell),
                    },
                    false,
                )?;
            }
        }

        self.tally.replications += 1;
        self.metrics.increment_counter("replications");
        tracing::info!(
            update = self.update,
            source,
            target,
            founders = founders.len(),
            generation = source_generation + 1,
            "Deme replicated"
        );
        Ok(())
    }

    /// Up to `count` cells of `deme`, nearest the centre first.
    fn seed_cells(&self, deme: DemeId, count: usize) -> Vec<CellId> {
        let d = &self.demes[deme];
        let center = &self.cells[d.center_cell()];
        let mut cells: Vec<CellId> = d.cell_range().collect();
        cells.sort_by_key(|c| {
            let cell = &self.cells[*c];
            let dx = cell.x.abs_diff(center.x);
            let dy = cell.y.abs_diff(center.y);
            (dx * dx + dy * dy, *c)
        });
        cells.truncate(count);
        cells
    }
}
