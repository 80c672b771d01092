//! # Petri Core
//!
//! Simulation core for a spatial population of self-replicating programs
//! competing for diffusing resources.
//!
//! This crate contains:
//! - A merit-weighted execution scheduler with pluggable policies
//! - A lazily integrated resource grid with diffusion, gravity and moving peaks
//! - The population update loop with birth placement and death handling
//! - Demes: replicating groups of cells with their own merit, pools and events
//! - Configuration, metrics and structured logging
//!
//! ## Architecture
//!
//! Organisms are `hecs` entities whose executable is opaque behind
//! [`organism::Hardware`]. The [`population::Population`] owns the cells, the
//! organism world, the global [`resource::ResourceGrid`], the scheduler and the
//! demes, and mutates them only from its update loop. Every random choice is
//! drawn from a seeded `ChaCha8Rng`, so a fixed seed reproduces a run.
//!
//! ## Example
//!
//! ```
//! use petri_core::resource::ResourceGrid;
//! use petri_data::ResourceDef;
//!
//! let mut grid = ResourceGrid::new(&[ResourceDef::global("A", 0.0, 1.0)], 10, 10, 42).unwrap();
//! for _ in 0..5 {
//!     grid.update(1.0);
//! }
//! assert!((grid.get(0).unwrap() - 5.0).abs() < 1e-9);
//! ```

/// Grid cells, neighbourhoods and event markers
pub mod cell;
/// Configuration management for simulation parameters
pub mod config;
/// Replicating sub-populations with their own pools and events
pub mod deme;
/// Error taxonomy of the core
pub mod error;
/// Genotype records and lineage leases
pub mod genotype;
/// Performance metrics collection and logging
pub mod metrics;
/// Organism components and the executable interface
pub mod organism;
/// Offspring placement policies
pub mod placement;
/// Population state and the per-update loop
pub mod population;
/// Lazily integrated resource levels
pub mod resource;
/// Merit-weighted schedulers
pub mod schedule;
/// Population snapshot capture and restore
pub mod snapshot;

pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use metrics::{init_logging, init_logging_with_level, Metrics};
pub use organism::{BirthRequest, ExecutionContext, ExecutionOutcome, Hardware};
pub use population::Population;
pub use resource::ResourceGrid;
pub use schedule::{SchedulePolicy, Scheduler};
