mod common;

use common::PopulationBuilder;
use petri_core::config::ReplicationTrigger;
use petri_core::Population;
use petri_lib::{Ancestor, AncestorParams};
use std::path::PathBuf;
use uuid::Uuid;

fn temp_path(ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!("petri_test_{}.{}", Uuid::new_v4(), ext))
}

fn builder() -> PopulationBuilder {
    PopulationBuilder::new(6, 6)
        .with_seed(77)
        .with_demes(2, ReplicationTrigger::Births)
        .with_config(|c| c.demes.max_births = 6)
}

fn grown() -> Population {
    let params = AncestorParams {
        gestation: 2,
        mutation_rate: 0.3,
        ..AncestorParams::default()
    };
    let mut pop = builder().with_organism(7, Ancestor::boxed(params, 5), 1.0).build();
    pop.run(25).unwrap();
    pop
}

#[test]
fn test_snapshot_round_trip_through_file() {
    let original = grown();
    let fingerprint = builder().config().fingerprint();
    let path = temp_path("json.gz");
    petri_io::save_snapshot(&original.snapshot(), &fingerprint, &path).unwrap();

    let file = petri_io::load_snapshot(&path, Some(&fingerprint)).unwrap();
    let mut restored = builder().build();
    restored
        .restore(&file.snapshot, |_| Ancestor::boxed(AncestorParams::default(), 1))
        .unwrap();

    assert_eq!(restored.snapshot(), original.snapshot());
    assert_eq!(restored.update_number(), original.update_number());
    assert_population!(restored, original.live_count());
    for (a, b) in restored.demes().iter().zip(original.demes()) {
        assert_eq!(a.founders().len(), b.founders().len());
        assert_eq!(a.current_merit(), b.current_merit());
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn test_restored_population_keeps_running() {
    let original = grown();
    let mut restored = builder().build();
    restored
        .restore(&original.snapshot(), |_| Ancestor::boxed(AncestorParams::default(), 1))
        .unwrap();
    restored.run(5).unwrap();
    restored.check_occupancy().unwrap();
    assert_eq!(restored.update_number(), original.update_number() + 5);
}

#[test]
fn test_snapshot_from_other_config_rejected() {
    let original = grown();
    let path = temp_path("json");
    petri_io::save_snapshot(&original.snapshot(), "another-config", &path).unwrap();
    let fingerprint = builder().config().fingerprint();
    assert!(petri_io::load_snapshot(&path, Some(&fingerprint)).is_err());
    std::fs::remove_file(path).ok();
}

#[test]
fn test_restore_into_wrong_dimensions_rejected() {
    let snapshot = grown().snapshot();
    let mut other = PopulationBuilder::new(4, 4).build();
    assert!(other.restore(&snapshot, |_| Ancestor::boxed(AncestorParams::default(), 1)).is_err());
}

#[test]
fn test_restore_keeps_deme_weighted_priorities() {
    let build = || {
        PopulationBuilder::new(3, 6).with_config(|c| {
            c.demes.num_demes = 2;
            c.demes.have_merit = true;
        })
    };
    let mut original = build().build();
    original.deme_mut(1).unwrap().add_heritable_merit(3.0);
    original.deme_mut(1).unwrap().rotate_merit().unwrap();
    original.inject(10, common::ScriptedHardware::idle(), 2.0).unwrap();
    original.inject(1, common::ScriptedHardware::idle(), 2.0).unwrap();
    assert_eq!(original.scheduler().weight(10), 8.0);

    let mut restored = build().build();
    restored
        .restore(&original.snapshot(), |_| common::ScriptedHardware::idle())
        .unwrap();

    assert_eq!(restored.deme(1).unwrap().current_merit(), 4.0);
    assert_eq!(restored.scheduler().weight(10), 8.0);
    assert_eq!(restored.scheduler().weight(1), 2.0);
    assert_eq!(restored.scheduler().total_weight(), original.scheduler().total_weight());
}
