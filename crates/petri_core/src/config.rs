//! Configuration for a simulation run.
//!
//! Every parameter of the world, scheduler, birth policy, demes and resource
//! tables is named here and validated once before the first update. The
//! structures map one-to-one onto `config.toml`.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [world]
//! width = 30
//! height = 30
//! seed = 42
//!
//! [scheduler]
//! policy = "merit-integrated"
//!
//! [birth]
//! method = "age"
//! prefer_empty = true
//!
//! [[resources]]
//! name = "glucose"
//! inflow = 100.0
//! decay = 0.01
//! ```

use crate::deme::event::CellEventDef;
use crate::deme::predicate::DemePredicate;
use crate::placement::BirthMethod;
use crate::schedule::SchedulePolicy;
use petri_data::{Geometry, ResourceDef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// World dimensions, topology and determinism.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WorldConfig {
    pub width: usize,
    pub height: usize,
    /// Neighbourhood topology of the cell grid (`grid` or `torus`).
    pub geometry: Geometry,
    pub seed: Option<u64>,
    /// Average execution slices granted per organism per update.
    pub avg_time_slice: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 30,
            height: 30,
            geometry: Geometry::Torus,
            seed: None,
            avg_time_slice: 30,
        }
    }
}

/// Sizes of the environment's task and reaction tables.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub num_tasks: usize,
    pub num_reactions: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            num_tasks: 9,
            num_reactions: 9,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SchedulerConfig {
    pub policy: SchedulePolicy,
}

/// Offspring placement policy.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BirthConfig {
    pub method: BirthMethod,
    pub prefer_empty: bool,
    /// Whether the parent's own cell is a candidate.
    pub allow_parent: bool,
    /// Maximum living organisms; 0 disables the cap.
    pub population_cap: usize,
}

impl Default for BirthConfig {
    fn default() -> Self {
        Self {
            method: BirthMethod::Age,
            prefer_empty: true,
            allow_parent: true,
            population_cap: 0,
        }
    }
}

/// Condition under which a deme replicates at the end of an update.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicationTrigger {
    #[default]
    Disabled,
    /// At least one organism present.
    Occupied,
    /// Every cell occupied.
    Full,
    /// Both corner cells occupied.
    Corners,
    /// Deme age reached `max_age`.
    Age,
    /// Births reached `max_births`.
    Births,
    /// Every configured predicate satisfied.
    Predicates,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DemeConfig {
    pub num_demes: usize,
    /// Scale organism scheduling weight by the deme's current merit.
    pub have_merit: bool,
    /// Clones of the seed organism injected into each deme on replication.
    pub replicate_size: usize,
    pub trigger: ReplicationTrigger,
    pub max_age: u64,
    pub max_births: u64,
    pub reset_resources: bool,
    /// Fraction of each source pool resource handed to the target.
    pub inherit_fraction: f64,
    /// Heritable merit added per completed reaction.
    pub reaction_merit: f64,
    /// Ages at which demes become treatable.
    pub treatment_ages: Vec<u64>,
    /// Upper bound for randomly chosen event delays.
    pub max_random_delay: u64,
    pub events: Vec<CellEventDef>,
    pub predicates: Vec<DemePredicate>,
    /// Resource pool each deme owns, on a grid the size of the deme.
    pub resources: Vec<ResourceDef>,
}

impl Default for DemeConfig {
    fn default() -> Self {
        Self {
            num_demes: 1,
            have_merit: false,
            replicate_size: 1,
            trigger: ReplicationTrigger::Disabled,
            max_age: 500,
            max_births: 100,
            reset_resources: true,
            inherit_fraction: 0.0,
            reaction_merit: 1.0,
            treatment_ages: Vec::new(),
            max_random_delay: 100,
            events: Vec::new(),
            predicates: Vec::new(),
            resources: Vec::new(),
        }
    }
}

/// Top-level configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub world: WorldConfig,
    pub environment: EnvironmentConfig,
    pub scheduler: SchedulerConfig,
    pub birth: BirthConfig,
    pub demes: DemeConfig,
    pub resources: Vec<ResourceDef>,
}

impl AppConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns the first failing rule as an error.
    pub fn validate(&self) -> anyhow::Result<()> {
        let w = &self.world;
        anyhow::ensure!(w.width > 0, "World width must be positive");
        anyhow::ensure!(w.height > 0, "World height must be positive");
        anyhow::ensure!(
            w.width * w.height <= 1_000_000,
            "World too large (max 1,000,000 cells)"
        );
        anyhow::ensure!(
            matches!(w.geometry, Geometry::Grid | Geometry::Torus),
            "World geometry must be grid or torus"
        );
        anyhow::ensure!(w.avg_time_slice > 0, "Average time slice must be positive");
        anyhow::ensure!(
            self.environment.num_tasks <= 1024 && self.environment.num_reactions <= 1024,
            "Task and reaction tables are limited to 1024 entries"
        );

        let d = &self.demes;
        anyhow::ensure!(d.num_demes > 0, "At least one deme is required");
        anyhow::ensure!(
            w.height % d.num_demes == 0,
            "World height {} is not divisible into {} demes",
            w.height,
            d.num_demes
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&d.inherit_fraction),
            "Inherit fraction must be in [0.0, 1.0]"
        );
        anyhow::ensure!(d.reaction_merit >= 0.0, "Reaction merit must be non-negative");
        anyhow::ensure!(
            d.trigger == ReplicationTrigger::Disabled || d.num_demes >= 2,
            "Deme replication needs at least two demes"
        );
        let deme_height = w.height / d.num_demes;
        for event in &d.events {
            event.validate(w.width, deme_height)?;
        }
        validate_resources(&self.resources, w.width, w.height)?;
        validate_resources(&d.resources, w.width, deme_height)?;
        for predicate in &d.predicates {
            if let DemePredicate::ResourceThreshold { resource, .. } = predicate {
                anyhow::ensure!(
                    d.resources.iter().any(|r| &r.name == resource),
                    "Predicate refers to unknown deme resource '{}'",
                    resource
                );
            }
            if let DemePredicate::EventCellsOccupied { event, fraction } = predicate {
                anyhow::ensure!(*event < d.events.len(), "Predicate refers to unknown event {}", event);
                anyhow::ensure!(
                    (0.0..=1.0).contains(fraction),
                    "Predicate fraction must be in [0.0, 1.0]"
                );
            }
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Stable hash of every parameter that changes simulation outcomes.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.world).as_bytes());
        hasher.update(format!("{:?}", self.environment).as_bytes());
        hasher.update(format!("{:?}", self.scheduler).as_bytes());
        hasher.update(format!("{:?}", self.birth).as_bytes());
        hasher.update(format!("{:?}", self.demes).as_bytes());
        hasher.update(format!("{:?}", self.resources).as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn deme_height(&self) -> usize {
        self.world.height / self.demes.num_demes.max(1)
    }
}

/// Checks one resource table against a `width` × `height` grid.
pub fn validate_resources(defs: &[ResourceDef], width: usize, height: usize) -> anyhow::Result<()> {
    let mut names = HashSet::new();
    for def in defs {
        anyhow::ensure!(!def.name.is_empty(), "Resource name must not be empty");
        anyhow::ensure!(names.insert(&def.name), "Duplicate resource '{}'", def.name);
        anyhow::ensure!(
            (0.0..=1.0).contains(&def.decay),
            "Resource '{}' decay must be in [0.0, 1.0]",
            def.name
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&def.outflow),
            "Resource '{}' outflow must be in [0.0, 1.0]",
            def.name
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&def.x_diffuse) && (0.0..=1.0).contains(&def.y_diffuse),
            "Resource '{}' diffusion must be in [0.0, 1.0]",
            def.name
        );
        anyhow::ensure!(
            def.x_gravity.abs() <= 1.0 && def.y_gravity.abs() <= 1.0,
            "Resource '{}' gravity must be in [-1.0, 1.0]",
            def.name
        );
        anyhow::ensure!(
            def.initial >= 0.0 || def.allow_negative,
            "Resource '{}' initial level must be non-negative",
            def.name
        );
        for region in [def.inflow_region, def.outflow_region].into_iter().flatten() {
            anyhow::ensure!(
                region.fits(width, height),
                "Resource '{}' region {:?} outside {}x{} grid",
                def.name,
                region,
                width,
                height
            );
        }
        for cell in &def.cells {
            anyhow::ensure!(
                cell.cell < width * height,
                "Resource '{}' cell {} out of range",
                def.name,
                cell.cell
            );
            anyhow::ensure!(
                (0.0..=1.0).contains(&cell.outflow),
                "Resource '{}' cell outflow must be in [0.0, 1.0]",
                def.name
            );
        }
        if def.geometry == Geometry::Partial {
            anyhow::ensure!(
                !def.cells.is_empty(),
                "Partial resource '{}' needs a cell list",
                def.name
            );
        }
        if let Some(g) = &def.gradient {
            anyhow::ensure!(
                def.geometry.is_spatial(),
                "Gradient resource '{}' must be spatial",
                def.name
            );
            anyhow::ensure!(g.height >= 0.0, "Gradient height must be non-negative");
            anyhow::ensure!(g.spread >= 0.0, "Gradient spread must be non-negative");
            anyhow::ensure!(g.updates_per_move > 0, "Gradient updates_per_move must be positive");
        }
    }
    Ok(())
}
