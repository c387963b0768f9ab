//! Error types reported by the objectives.
//!
//! Only configuration-level problems are recoverable and surface as
//! [`ObjectiveError`]. Internal-state corruption (out-of-sync physical-node
//! bookkeeping, duplicated consolidation entries) indicates a logic bug and
//! panics instead; the driver is not expected to recover from it.

use crate::entities::NodeId;

/// A recoverable error detected while wiring or initializing an objective.
#[derive(Debug, thiserror::Error)]
pub enum ObjectiveError {
    /// The meta objective is selected but a leaf carries no meta data in the
    /// first dimension.
    #[error("leaf {0} carries no meta data in dimension 0")]
    MissingMetaData(NodeId),

    /// The configured meta-data rate is negative or non-finite.
    #[error("meta data rate must be a non-negative finite number, got {0}")]
    InvalidMetaDataRate(f64),
}

/// A convenient alias for `Result` with [`ObjectiveError`].
pub type ObjectiveResult<T> = Result<T, ObjectiveError>;
