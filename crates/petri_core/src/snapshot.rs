//! Capturing and rebuilding population layout.

use crate::error::{CoreError, Result};
use crate::organism::{Hardware, Identity, Phenotype, Placement};
use crate::population::{NewOrganism, Population};
use petri_data::{OrganismRecord, PopulationSnapshot};

impl Population {
    /// Layout, lineage references and deme merit of the current state.
    pub fn snapshot(&self) -> PopulationSnapshot {
        let mut organisms: Vec<OrganismRecord> = self
            .world()
            .query::<(&Identity, &Phenotype, &Placement)>()
            .iter()
            .map(|(_, (identity, phenotype, placement))| OrganismRecord {
                cell_id: placement.cell,
                genotype_id: identity.genotype.id(),
                gestation_offset: phenotype.gestation_offset,
                merit: phenotype.merit,
                generation: identity.generation,
                birth_cell: placement.birth_cell,
                group: placement.group,
                forager: placement.forager,
                avatar_cell: placement.avatar_cell,
            })
            .collect();
        organisms.sort_by_key(|o| o.cell_id);
        let (width, height) = self.resources().dimensions();
        PopulationSnapshot {
            update: self.update_number(),
            width,
            height,
            organisms,
            genotypes: self.genotypes().records(),
            demes: self.demes().iter().map(|d| d.to_record()).collect(),
        }
    }

    /// Replaces every organism with those in `snapshot`.
    ///
    /// `factory` supplies the executable for each record; the core never
    /// persists organism programs itself.
    pub fn restore<F>(&mut self, snapshot: &PopulationSnapshot, mut factory: F) -> Result<()>
    where
        F: FnMut(&OrganismRecord) -> Box<dyn Hardware>,
    {
        let (width, height) = self.resources().dimensions();
        if (snapshot.width, snapshot.height) != (width, height) {
            return Err(CoreError::config(format!(
                "snapshot is {}x{}, world is {}x{}",
                snapshot.width, snapshot.height, width, height
            )));
        }
        if snapshot.demes.len() != self.demes().len() {
            return Err(CoreError::config(format!(
                "snapshot has {} demes, world has {}",
                snapshot.demes.len(),
                self.demes().len()
            )));
        }

        for cell in 0..self.num_cells() {
            self.kill_organism(cell)?;
        }
        // hold every record until organisms and demes have leased what they need
        let leases: Vec<_> = snapshot
            .genotypes
            .iter()
            .map(|g| self.genotypes_mut().restore(g))
            .collect();
        let lease_of = |id| {
            leases
                .iter()
                .find(|l| l.id() == id)
                .cloned()
                .ok_or_else(|| CoreError::config(format!("snapshot references unknown genotype {id}")))
        };

        // deme merit feeds scheduler weights, so demes come back first
        for record in &snapshot.demes {
            let deme = self.deme_mut(record.id)?;
            deme.apply_record(record);
            deme.clear_founders();
            for (id, phenotype) in &record.founders {
                deme.add_founder(lease_of(*id)?, phenotype.clone());
            }
            if let Some(id) = record.germline {
                deme.replace_germline(lease_of(id)?);
            }
        }

        for record in &snapshot.organisms {
            if record.cell_id >= self.num_cells() {
                return Err(CoreError::InvalidCellId(record.cell_id));
            }
            let organism = NewOrganism {
                hardware: factory(record),
                genotype: lease_of(record.genotype_id)?,
                merit: record.merit,
                generation: record.generation,
                placement: Placement {
                    cell: record.cell_id,
                    birth_cell: record.birth_cell,
                    group: record.group,
                    forager: record.forager,
                    avatar_cell: record.avatar_cell,
                },
            };
            let entity = self.insert_organism(record.cell_id, organism, false)?;
            if let Ok(mut p) = self.world_mut().get::<&mut Phenotype>(entity) {
                p.gestation_offset = record.gestation_offset;
            }
        }

        self.set_update_number(snapshot.update);
        drop(leases);
        self.genotypes_mut().prune();
        self.check_occupancy()?;
        tracing::info!(
            update = snapshot.update,
            organisms = snapshot.organisms.len(),
            "Population restored"
        );
        Ok(())
    }
}
