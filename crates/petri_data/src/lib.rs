//! Plain data types shared by the petri crates.
//!
//! Nothing in here carries behaviour beyond small constructors and
//! geometry helpers; the simulation logic lives in `petri_core`.

pub mod data;

pub use data::ids::{CellId, DemeId, GenotypeId, ResourceId};
pub use data::resource::{CellResourceDef, Geometry, GradientDef, Rect, ResourceDef};
pub use data::snapshot::{
    DemeRecord, GenotypeRecordData, OrganismRecord, PhenotypeSnapshot, PopulationSnapshot,
};
pub use data::stats::PopulationStats;
