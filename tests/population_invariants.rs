mod common;

use common::{PopulationBuilder, ScriptedHardware};
use petri_core::placement::BirthMethod;
use petri_core::{CoreError, SchedulePolicy};
use petri_data::{Geometry, ResourceDef};
use petri_lib::{Ancestor, AncestorParams};

#[test]
fn test_occupancy_holds_under_churn() {
    for policy in [
        SchedulePolicy::RoundRobin,
        SchedulePolicy::MeritIntegrated,
        SchedulePolicy::Probabilistic,
        SchedulePolicy::ProbabilisticIntegrated,
    ] {
        let params = AncestorParams {
            gestation: 2,
            lifespan: 9,
            ..AncestorParams::default()
        };
        let mut pop = PopulationBuilder::new(6, 6)
            .with_policy(policy)
            .with_organism(14, Ancestor::boxed(params, 1), 1.0)
            .build();
        for _ in 0..40 {
            pop.tick().unwrap();
            pop.check_occupancy().unwrap();
            let occupied = pop.cells().iter().filter(|c| c.is_occupied()).count();
            assert_eq!(pop.live_count(), occupied, "{:?}", policy);
        }
        assert!(pop.stats().deaths > 0 || pop.live_count() > 0);
    }
}

#[test]
fn test_vacant_cells_carry_no_weight() {
    let mut pop = PopulationBuilder::new(5, 5)
        .with_organism(12, ScriptedHardware::breeder(1), 1.0)
        .build();
    pop.run(3).unwrap();
    pop.kill_organism(12).unwrap();
    for cell in 0..pop.num_cells() {
        if pop.occupant(cell).is_none() {
            assert_cell_empty!(pop, cell);
        } else {
            assert!(pop.scheduler().weight(cell) > 0.0);
        }
    }
}

#[test]
fn test_empty_population_tick_is_noop() {
    let mut pop = PopulationBuilder::new(4, 4).build();
    let stats = pop.tick().unwrap().clone();
    assert_eq!(stats.executed_slices, 0);
    assert_eq!(pop.update_number(), 1);
    assert_population!(pop, 0);
}

#[test]
fn test_prefer_empty_fills_neighbours_first() {
    let mut pop = PopulationBuilder::new(3, 3)
        .with_config(|c| {
            c.birth.method = BirthMethod::Age;
            c.birth.prefer_empty = true;
        })
        .with_organism(4, ScriptedHardware::breeder(1), 1.0)
        .build();
    for cell in 0..pop.num_cells() {
        pop.process_slice(4).unwrap();
        assert_eq!(pop.live_count(), (cell + 2).min(9));
    }
    assert_population!(pop, 9);
}

#[test]
fn test_no_parent_replacement_uses_neighbour() {
    let mut pop = PopulationBuilder::new(1, 2)
        .with_config(|c| {
            c.birth.method = BirthMethod::Empty;
            c.birth.allow_parent = false;
        })
        .with_organism(0, ScriptedHardware::breeder(1), 1.0)
        .with_organism(1, ScriptedHardware::idle(), 1.0)
        .build();
    pop.process_slice(0).unwrap();
    assert_population!(pop, 2);
    // parent survives, the resident neighbour was replaced by its offspring
    assert_eq!(pop.identity(0).unwrap().generation, 0);
    assert_eq!(pop.identity(1).unwrap().generation, 1);
}

#[test]
fn test_consumption_feeds_merit() {
    let params = AncestorParams {
        gestation: 0,
        appetite: 1.0,
        meal_merit: 0.5,
        ..AncestorParams::default()
    };
    let mut pop = PopulationBuilder::new(2, 2)
        .with_resource(ResourceDef::spatial("food", Geometry::Grid, 40.0, 0.0))
        .with_organism(0, Ancestor::boxed(params, 3), 1.0)
        .build();
    pop.tick().unwrap();
    let phenotype = pop.phenotype(0).unwrap();
    assert_close!(phenotype.merit, 3.5);
    assert_close!(phenotype.energy, 5.0);
    assert_eq!(pop.scheduler().weight(0), phenotype.merit);
    // 10 per cell, 5 eaten from cell 0
    assert_close!(pop.resources_mut().cell_level(0, 0).unwrap(), 5.0);
}

#[test]
fn test_unknown_task_ids_leave_counters_alone() {
    let mut pop = PopulationBuilder::new(3, 3)
        .with_config(|c| {
            c.environment.num_tasks = 3;
            c.environment.num_reactions = 0;
        })
        .with_organism(4, ScriptedHardware::tasker(vec![1, usize::MAX, 40], 2), 1.0)
        .build();
    pop.process_slice(4).unwrap();

    let phenotype = pop.phenotype(4).unwrap();
    assert_eq!(phenotype.cur_tasks, vec![0, 1, 0]);
    assert!(phenotype.cur_reactions.is_empty());
    let deme = pop.deme(0).unwrap();
    assert_eq!(deme.cur_tasks(), &[0, 1, 0]);
    assert!(deme.cur_reactions().is_empty());
    assert_eq!(deme.heritable_merit(), 1.0);
}

#[test]
fn test_invalid_ids() {
    let mut pop = PopulationBuilder::new(2, 2).build();
    assert_eq!(pop.kill_organism(4), Err(CoreError::InvalidCellId(4)));
    assert!(matches!(pop.deme(3), Err(CoreError::InvalidDemeId(3))));
    assert!(pop
        .inject(9, ScriptedHardware::idle(), 1.0)
        .is_err());
}

#[test]
fn test_genotypes_pruned_when_extinct() {
    let mut pop = PopulationBuilder::new(3, 3)
        .with_organism(4, ScriptedHardware::mortal(1), 1.0)
        .build();
    let genotype = pop.identity(4).unwrap().genotype.id();
    pop.tick().unwrap();
    assert!(!pop.genotypes().contains(genotype));
}
