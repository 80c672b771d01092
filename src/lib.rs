//! Petri: a spatial artificial-life world.
//!
//! The simulation lives in `petri_core`, shared records in `petri_data`
//! and snapshot persistence in `petri_io`. This crate adds a reference
//! organism and the `petri` command line runner.

pub mod ancestor;

pub use petri_core as core;
pub use petri_data as data;
pub use petri_io as io;

pub use ancestor::{Ancestor, AncestorParams};
