//! Genotype records and the leases that keep them alive.
//!
//! Records are shared through `Arc`. The registry holds one strong reference;
//! every organism, deme founder entry and germline holds another through a
//! [`GenotypeLease`]. A record is reclaimed by [`GenotypeRegistry::prune`] only
//! when no living organism uses it and nothing else holds a lease.

use petri_data::{GenotypeId, GenotypeRecordData};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
pub struct GenotypeRecord {
    pub id: GenotypeId,
    pub parent: Option<GenotypeId>,
    pub birth_update: u64,
    pub name: String,
}

/// Shared handle on a genotype record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeLease(Arc<GenotypeRecord>);

impl GenotypeLease {
    pub fn id(&self) -> GenotypeId {
        self.0.id
    }

    pub fn record(&self) -> &GenotypeRecord {
        &self.0
    }
}

#[derive(Debug)]
struct Entry {
    record: Arc<GenotypeRecord>,
    living: usize,
}

#[derive(Debug, Default)]
pub struct GenotypeRegistry {
    entries: BTreeMap<GenotypeId, Entry>,
    next_id: GenotypeId,
}

impl GenotypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new genotype and returns a lease on it.
    pub fn register(&mut self, parent: Option<GenotypeId>, birth_update: u64) -> GenotypeLease {
        let id = self.next_id;
        self.next_id += 1;
        self.insert(GenotypeRecord {
            id,
            parent,
            birth_update,
            name: format!("genotype-{id:06}"),
        })
    }

    /// Re-creates a record with a known id, as on snapshot reload.
    pub fn restore(&mut self, data: &GenotypeRecordData) -> GenotypeLease {
        if let Some(lease) = self.lease(data.id) {
            return lease;
        }
        self.next_id = self.next_id.max(data.id + 1);
        self.insert(GenotypeRecord {
            id: data.id,
            parent: data.parent,
            birth_update: data.birth_update,
            name: data.name.clone(),
        })
    }

    fn insert(&mut self, record: GenotypeRecord) -> GenotypeLease {
        let id = record.id;
        let record = Arc::new(record);
        self.entries.insert(
            id,
            Entry {
                record: Arc::clone(&record),
                living: 0,
            },
        );
        GenotypeLease(record)
    }

    pub fn lease(&self, id: GenotypeId) -> Option<GenotypeLease> {
        self.entries
            .get(&id)
            .map(|e| GenotypeLease(Arc::clone(&e.record)))
    }

    pub fn contains(&self, id: GenotypeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn living(&self, id: GenotypeId) -> usize {
        self.entries.get(&id).map_or(0, |e| e.living)
    }

    /// Genotypes with at least one living organism.
    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|e| e.living > 0).count()
    }

    pub fn add_organism(&mut self, id: GenotypeId) {
        if let Some(e) = self.entries.get_mut(&id) {
            e.living += 1;
        }
    }

    pub fn remove_organism(&mut self, id: GenotypeId) {
        if let Some(e) = self.entries.get_mut(&id) {
            e.living = e.living.saturating_sub(1);
        }
    }

    /// Drops records with no living organisms and no outstanding leases.
    /// Returns how many were reclaimed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.living > 0 || Arc::strong_count(&e.record) > 1);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Pruned genotypes");
        }
        removed
    }

    pub fn records(&self) -> Vec<GenotypeRecordData> {
        self.entries
            .values()
            .map(|e| GenotypeRecordData {
                id: e.record.id,
                parent: e.record.parent,
                birth_update: e.record.birth_update,
                name: e.record.name.clone(),
            })
            .collect()
    }
}
