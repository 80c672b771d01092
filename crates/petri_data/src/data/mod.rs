pub mod ids;
pub mod resource;
pub mod snapshot;
pub mod stats;
