//! Error types for the simulation core.

use petri_data::CellId;
use thiserror::Error;

/// Failures surfaced by grid, scheduler, deme and population operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Malformed resource or deme setup, detected before the first update.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid resource id: {0}")]
    InvalidResourceId(usize),

    #[error("Invalid cell id: {0}")]
    InvalidCellId(usize),

    #[error("Invalid deme id: {0}")]
    InvalidDemeId(usize),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// `peak_position` asked of a resource without gradient parameters.
    #[error("Resource {0} has no gradient")]
    NotAGradient(usize),

    /// Replication needs at least one founder.
    #[error("Deme {0} has no occupants to replicate")]
    DemeNotOccupied(usize),

    /// A broken internal invariant; aborts the current update.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// No eligible cell for an offspring under the current birth policy.
    #[error("No room for offspring of cell {parent}")]
    CapacityExhausted { parent: CellId },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    #[must_use]
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// True for the one failure class that must abort an update.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidResourceId(7);
        assert_eq!(err.to_string(), "Invalid resource id: 7");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(CoreError::invariant("merit").is_fatal());
        assert!(!CoreError::CapacityExhausted { parent: 3 }.is_fatal());
        assert!(!CoreError::InvalidCellId(1).is_fatal());
    }
}
