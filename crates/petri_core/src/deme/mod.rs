//! Demes: fixed bands of cells that replicate as a unit.
//!
//! A deme never owns organisms or cells. It owns its counters, merit, founder
//! leases, resource pool and events, and it is handed the slice of cells it
//! covers whenever an operation needs to touch cell state.

pub mod event;
pub mod predicate;

use crate::cell::Cell;
use crate::config::{DemeConfig, EnvironmentConfig};
use crate::error::{CoreError, Result};
use crate::genotype::GenotypeLease;
use crate::organism::bump;
use crate::resource::ResourceGrid;
use event::{CellEvent, EventTransition};
use petri_data::{CellId, DemeId, DemeRecord, PhenotypeSnapshot};
use predicate::PredicateState;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::ops::Range;

/// An organism resident at the deme's last replication.
#[derive(Debug, Clone)]
pub struct Founder {
    pub genotype: GenotypeLease,
    pub phenotype: PhenotypeSnapshot,
}

#[derive(Debug, Clone)]
pub struct Deme {
    id: DemeId,
    first_cell: CellId,
    width: usize,
    height: usize,

    age: u64,
    generation: u64,
    births: u64,
    org_count: usize,
    replications: u64,

    current_merit: f64,
    heritable_merit: f64,
    reaction_merit: f64,

    founders: Vec<Founder>,
    germline: Option<GenotypeLease>,
    avg_founder_generation: f64,
    generations_per_lifetime: f64,

    cur_tasks: Vec<u32>,
    last_tasks: Vec<u32>,
    cur_reactions: Vec<u32>,
    last_reactions: Vec<u32>,

    treatment_ages: BTreeSet<u64>,
    resources: ResourceGrid,
    events: Vec<CellEvent>,
    max_random_delay: u64,
    predicates: Vec<PredicateState>,
    replicate: bool,
    rng: ChaCha8Rng,
}

impl Deme {
    pub fn new(
        id: DemeId,
        first_cell: CellId,
        width: usize,
        height: usize,
        config: &DemeConfig,
        env: &EnvironmentConfig,
        seed: u64,
    ) -> Result<Self> {
        let seed = seed ^ (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let resources = ResourceGrid::new(&config.resources, width, height, seed)?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let events = config
            .events
            .iter()
            .enumerate()
            .map(|(i, def)| CellEvent::new(i as u32, def.clone(), config.max_random_delay, &mut rng))
            .collect();
        Ok(Self {
            id,
            first_cell,
            width,
            height,
            age: 0,
            generation: 0,
            births: 0,
            org_count: 0,
            replications: 0,
            current_merit: 1.0,
            heritable_merit: 1.0,
            reaction_merit: config.reaction_merit,
            founders: Vec::new(),
            germline: None,
            avg_founder_generation: 0.0,
            generations_per_lifetime: 0.0,
            cur_tasks: vec![0; env.num_tasks],
            last_tasks: vec![0; env.num_tasks],
            cur_reactions: vec![0; env.num_reactions],
            last_reactions: vec![0; env.num_reactions],
            treatment_ages: config.treatment_ages.iter().copied().collect(),
            resources,
            events,
            max_random_delay: config.max_random_delay,
            predicates: config
                .predicates
                .iter()
                .cloned()
                .map(PredicateState::new)
                .collect(),
            replicate: false,
            rng,
        })
    }

    pub fn id(&self) -> DemeId {
        self.id
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Absolute ids of the cells this deme covers.
    pub fn cell_range(&self) -> Range<CellId> {
        self.first_cell..self.first_cell + self.cell_count()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.cell_range().contains(&cell)
    }

    pub fn to_relative(&self, cell: CellId) -> Result<CellId> {
        if self.contains(cell) {
            Ok(cell - self.first_cell)
        } else {
            Err(CoreError::InvalidCellId(cell))
        }
    }

    pub fn to_absolute(&self, relative: CellId) -> Result<CellId> {
        if relative < self.cell_count() {
            Ok(self.first_cell + relative)
        } else {
            Err(CoreError::InvalidCellId(relative))
        }
    }

    /// Absolute id of the cell nearest the deme's centre.
    pub fn center_cell(&self) -> CellId {
        self.first_cell + (self.height / 2) * self.width + self.width / 2
    }

    /// First and last cell, the two corners replication can require.
    pub fn corner_cells(&self) -> (CellId, CellId) {
        (self.first_cell, self.first_cell + self.cell_count() - 1)
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn births(&self) -> u64 {
        self.births
    }

    pub fn replications(&self) -> u64 {
        self.replications
    }

    pub fn org_count(&self) -> usize {
        self.org_count
    }

    pub fn is_empty(&self) -> bool {
        self.org_count == 0
    }

    pub(crate) fn organism_added(&mut self, birth: bool) {
        self.org_count += 1;
        if birth {
            self.births += 1;
        }
    }

    pub(crate) fn organism_removed(&mut self) {
        self.org_count = self.org_count.saturating_sub(1);
    }

    // ----- merit -----

    pub fn current_merit(&self) -> f64 {
        self.current_merit
    }

    pub fn heritable_merit(&self) -> f64 {
        self.heritable_merit
    }

    pub fn add_heritable_merit(&mut self, delta: f64) {
        self.heritable_merit += delta;
    }

    /// Credits `count` reactions towards the next lifetime's merit.
    pub fn accumulate_reaction_merit(&mut self, count: usize) {
        self.heritable_merit += self.reaction_merit * count as f64;
    }

    /// Moves heritable merit into current merit and resets heritable to 1.
    pub fn rotate_merit(&mut self) -> Result<()> {
        if !(self.heritable_merit >= 1.0) {
            return Err(CoreError::invariant(format!(
                "deme {} heritable merit {} below 1.0",
                self.id, self.heritable_merit
            )));
        }
        self.current_merit = self.heritable_merit;
        self.heritable_merit = 1.0;
        Ok(())
    }

    /// Takes `source`'s heritable merit as this deme's current merit.
    pub fn inherit_merit_from(&mut self, source_heritable: f64) -> Result<()> {
        if !(source_heritable >= 1.0) {
            return Err(CoreError::invariant(format!(
                "inherited merit {} below 1.0 for deme {}",
                source_heritable, self.id
            )));
        }
        self.current_merit = source_heritable;
        self.heritable_merit = 1.0;
        Ok(())
    }

    // ----- counters -----

    pub fn record_task(&mut self, task: usize) -> bool {
        bump(&mut self.cur_tasks, task)
    }

    pub fn record_reaction(&mut self, reaction: usize) -> bool {
        bump(&mut self.cur_reactions, reaction)
    }

    pub fn cur_tasks(&self) -> &[u32] {
        &self.cur_tasks
    }

    pub fn last_tasks(&self) -> &[u32] {
        &self.last_tasks
    }

    pub fn cur_reactions(&self) -> &[u32] {
        &self.cur_reactions
    }

    pub fn last_reactions(&self) -> &[u32] {
        &self.last_reactions
    }

    pub fn avg_founder_generation(&self) -> f64 {
        self.avg_founder_generation
    }

    pub fn generations_per_lifetime(&self) -> f64 {
        self.generations_per_lifetime
    }

    // ----- lineage -----

    pub fn founders(&self) -> &[Founder] {
        &self.founders
    }

    pub fn add_founder(&mut self, genotype: GenotypeLease, phenotype: PhenotypeSnapshot) {
        self.founders.push(Founder { genotype, phenotype });
    }

    /// Releases every founder lease.
    pub fn clear_founders(&mut self) {
        self.founders.clear();
    }

    pub fn germline(&self) -> Option<&GenotypeLease> {
        self.germline.as_ref()
    }

    /// Swaps in a new germline, releasing the old lease.
    pub fn replace_germline(&mut self, genotype: GenotypeLease) -> Option<GenotypeLease> {
        self.germline.replace(genotype)
    }

    // ----- treatment -----

    pub fn add_treatment_age(&mut self, age: u64) {
        self.treatment_ages.insert(age);
    }

    pub fn is_treatable_at(&self, age: u64) -> bool {
        self.treatment_ages.range(..=age).next_back().is_some()
    }

    pub fn is_treatable_now(&self) -> bool {
        self.is_treatable_at(self.age)
    }

    // ----- resources, events, predicates -----

    pub fn resources(&self) -> &ResourceGrid {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceGrid {
        &mut self.resources
    }

    pub fn events(&self) -> &[CellEvent] {
        &self.events
    }

    pub fn predicates(&self) -> &[PredicateState] {
        &self.predicates
    }

    pub fn predicates_satisfied(&self) -> bool {
        !self.predicates.is_empty() && self.predicates.iter().all(PredicateState::is_satisfied)
    }

    pub fn replicate_flag(&self) -> bool {
        self.replicate
    }

    pub fn mark_for_replication(&mut self) {
        self.replicate = true;
    }

    /// Ages the deme by one update.
    ///
    /// `cells` is this deme's slice of the world. Events due at the current age
    /// fire before the age advances, then the pool ages and predicates are
    /// re-checked. Returns absolute cells whose occupants a kill event claimed.
    pub fn process_update(&mut self, cells: &mut [Cell]) -> Vec<CellId> {
        debug_assert_eq!(cells.len(), self.cell_count());
        let mut doomed = Vec::new();
        for event in &mut self.events {
            match event.process(self.age, cells, self.width, self.height, &mut self.rng) {
                Some(EventTransition::Activated { cells: targets, kill }) => {
                    tracing::debug!(deme = self.id, event = event.id, cells = targets.len(), "Cell event activated");
                    if kill {
                        doomed.extend(
                            targets
                                .iter()
                                .filter(|rel| cells[**rel].is_occupied())
                                .map(|rel| self.first_cell + rel),
                        );
                    }
                }
                Some(EventTransition::Deactivated) => {
                    tracing::debug!(deme = self.id, event = event.id, "Cell event deactivated");
                }
                None => {}
            }
        }
        self.age += 1;
        self.resources.update(1.0);
        for p in &mut self.predicates {
            p.evaluate(&mut self.resources, &self.events, cells);
        }
        doomed
    }

    /// Clears the markers of every active event and rearms all events.
    pub fn deactivate_events(&mut self, cells: &mut [Cell]) {
        for event in &mut self.events {
            if event.is_active() {
                event.clear_markers(cells);
            }
            event.rearm(self.max_random_delay, &mut self.rng);
        }
    }

    /// Starts a fresh lifetime: age and counters zeroed, events and predicates
    /// rearmed, the pool optionally reseeded with `additional` on top of its
    /// initial levels.
    pub fn reset(&mut self, cells: &mut [Cell], reset_resources: bool, additional: &[f64]) {
        self.age = 0;
        self.births = 0;
        self.replicate = false;
        self.cur_tasks.iter_mut().for_each(|c| *c = 0);
        self.cur_reactions.iter_mut().for_each(|c| *c = 0);
        self.deactivate_events(cells);
        self.predicates.iter_mut().for_each(PredicateState::reset);
        if reset_resources {
            self.resources.reinitialize(additional);
        } else {
            for (id, extra) in additional.iter().enumerate() {
                if *extra == 0.0 {
                    continue;
                }
                if let Err(e) = self.resources.modify(id, *extra) {
                    tracing::warn!(deme = self.id, error = %e, "Dropped inherited resource");
                }
            }
        }
    }

    /// Reset after replication: archives the lifetime's counters, advances the
    /// generation past `parent_generation`, then resets.
    pub fn divide_reset(
        &mut self,
        cells: &mut [Cell],
        parent_generation: u64,
        avg_org_generation: f64,
        reset_resources: bool,
        additional: &[f64],
    ) {
        if !self.founders.is_empty() {
            self.avg_founder_generation = self
                .founders
                .iter()
                .map(|f| f.phenotype.generation as f64)
                .sum::<f64>()
                / self.founders.len() as f64;
        }
        self.generations_per_lifetime = (avg_org_generation - self.avg_founder_generation).max(0.0);
        self.generation = parent_generation + 1;
        self.replications += 1;
        self.last_tasks.clone_from(&self.cur_tasks);
        self.last_reactions.clone_from(&self.cur_reactions);
        self.reset(cells, reset_resources, additional);
    }

    pub fn to_record(&self) -> DemeRecord {
        DemeRecord {
            id: self.id,
            founders: self
                .founders
                .iter()
                .map(|f| (f.genotype.id(), f.phenotype.clone()))
                .collect(),
            germline: self.germline.as_ref().map(GenotypeLease::id),
            current_merit: self.current_merit,
            heritable_merit: self.heritable_merit,
            age: self.age,
            generation: self.generation,
        }
    }

    /// Restores merit, age and generation from a record. Leases are re-attached by the caller.
    pub fn apply_record(&mut self, record: &DemeRecord) {
        self.current_merit = record.current_merit;
        self.heritable_merit = record.heritable_merit;
        self.age = record.age;
        self.generation = record.generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::build_cells;
    use crate::genotype::GenotypeRegistry;
    use event::{CellEventDef, EventShape};
    use petri_data::{Geometry, ResourceDef};

    fn deme(config: &DemeConfig) -> (Deme, Vec<Cell>) {
        let cells = build_cells(3, 3, Geometry::Grid, 1);
        let env = EnvironmentConfig {
            num_tasks: 2,
            num_reactions: 1,
        };
        (Deme::new(0, 0, 3, 3, config, &env, 1).unwrap(), cells)
    }

    #[test]
    fn test_relative_ids() {
        let d = Deme::new(2, 18, 3, 3, &DemeConfig::default(), &EnvironmentConfig::default(), 0).unwrap();
        assert_eq!(d.to_relative(20).unwrap(), 2);
        assert_eq!(d.to_absolute(8).unwrap(), 26);
        assert_eq!(d.to_relative(27), Err(CoreError::InvalidCellId(27)));
        assert_eq!(d.center_cell(), 22);
        assert_eq!(d.corner_cells(), (18, 26));
    }

    #[test]
    fn test_rotate_merit() {
        let (mut d, _) = deme(&DemeConfig::default());
        d.add_heritable_merit(4.0);
        d.rotate_merit().unwrap();
        assert_eq!(d.current_merit(), 5.0);
        assert_eq!(d.heritable_merit(), 1.0);
    }

    #[test]
    fn test_rotate_merit_rejects_low_heritable() {
        let (mut d, _) = deme(&DemeConfig::default());
        d.add_heritable_merit(-0.5);
        assert!(matches!(d.rotate_merit(), Err(CoreError::InvariantViolation(_))));
        assert_eq!(d.current_merit(), 1.0);
    }

    #[test]
    fn test_reaction_merit_accumulates() {
        let config = DemeConfig {
            reaction_merit: 0.5,
            ..DemeConfig::default()
        };
        let (mut d, _) = deme(&config);
        d.accumulate_reaction_merit(4);
        assert_eq!(d.heritable_merit(), 3.0);
    }

    #[test]
    fn test_event_markers_cleared_on_reset() {
        let config = DemeConfig {
            events: vec![CellEventDef {
                shape: EventShape::Rect { x1: 0, y1: 0, x2: 2, y2: 0 },
                delay: Some(1),
                duration: 10,
                kill_on_activation: false,
            }],
            ..DemeConfig::default()
        };
        let (mut d, mut cells) = deme(&config);
        d.process_update(&mut cells);
        d.process_update(&mut cells);
        assert!(cells[..3].iter().all(|c| c.has_marker(0)));
        d.reset(&mut cells, true, &[]);
        assert!(cells.iter().all(|c| c.markers().is_empty()));
        assert_eq!(d.age(), 0);
    }

    #[test]
    fn test_divide_reset_archives_counters() {
        let (mut d, mut cells) = deme(&DemeConfig::default());
        let mut reg = GenotypeRegistry::new();
        d.add_founder(
            reg.register(None, 0),
            PhenotypeSnapshot {
                generation: 4,
                ..PhenotypeSnapshot::default()
            },
        );
        d.record_task(1);
        d.record_reaction(0);
        d.process_update(&mut cells);
        d.divide_reset(&mut cells, 6, 9.0, true, &[]);
        assert_eq!(d.generation(), 7);
        assert_eq!(d.last_tasks(), &[0, 1]);
        assert_eq!(d.last_reactions(), &[1]);
        assert_eq!(d.cur_tasks(), &[0, 0]);
        assert_eq!(d.avg_founder_generation(), 4.0);
        assert_eq!(d.generations_per_lifetime(), 5.0);
        assert_eq!(d.age(), 0);
    }

    #[test]
    fn test_founder_lease_survives_prune() {
        let (mut d, _) = deme(&DemeConfig::default());
        let mut reg = GenotypeRegistry::new();
        let lease = reg.register(None, 0);
        let id = lease.id();
        d.add_founder(lease, PhenotypeSnapshot::default());
        reg.prune();
        assert!(reg.contains(id));
        d.clear_founders();
        reg.prune();
        assert!(!reg.contains(id));
    }

    #[test]
    fn test_reset_reseeds_pool() {
        let config = DemeConfig {
            resources: vec![ResourceDef::global("food", 10.0, 0.0)],
            ..DemeConfig::default()
        };
        let (mut d, mut cells) = deme(&config);
        d.resources_mut().set(0, 1.0).unwrap();
        d.reset(&mut cells, true, &[2.0]);
        assert_eq!(d.resources_mut().get(0).unwrap(), 12.0);
    }

    #[test]
    fn test_treatment_ages() {
        let (mut d, _) = deme(&DemeConfig::default());
        assert!(!d.is_treatable_now());
        d.add_treatment_age(0);
        assert!(d.is_treatable_now());
        assert!(d.is_treatable_at(50));
    }
}
