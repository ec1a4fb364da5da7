//! Error types for topocal-core.

use thiserror::Error;

/// Result type alias for topocal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for topocal operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A sampling name in the configuration could not be resolved.
    #[error("unknown sampling name: {0}")]
    UnknownSampling(String),

    /// A neighbor-relation mask with bits outside the defined categories.
    #[error("malformed neighbor mask: {0:#x}")]
    MalformedNeighborMask(u32),

    /// A cell exceeded the per-cell adjacency capacity at build time.
    #[error("cell {cell} has {count} neighbors, exceeding the capacity of {capacity}")]
    NeighborCapacityExceeded {
        /// Offending cell index.
        cell: usize,
        /// Number of neighbors requested.
        count: usize,
        /// Fixed per-cell capacity.
        capacity: usize,
    },

    /// Inconsistent threshold configuration.
    #[error("invalid threshold configuration: {0}")]
    InvalidThresholds(String),

    /// Geometry input tables of mismatched length.
    #[error("geometry size mismatch: expected {expected} cells, got {got}")]
    GeometrySizeMismatch {
        /// Cell count the structure was built for.
        expected: usize,
        /// Cell count actually supplied.
        got: usize,
    },

    /// The cluster table overflowed its fixed capacity.
    ///
    /// This is fatal: it indicates a configuration/pileup mismatch, not a
    /// condition the pass can recover from by truncation.
    #[error("cluster capacity exceeded: event requires more than {limit} clusters")]
    ClusterCapacityExceeded {
        /// Fixed cluster-id capacity.
        limit: usize,
    },

    /// A cell record carried an unrecognized raw gain state.
    #[error("unrecognized gain state: {0}")]
    UnrecognizedGain(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownSampling("EMB9".to_string());
        assert_eq!(err.to_string(), "unknown sampling name: EMB9");

        let err = Error::ClusterCapacityExceeded { limit: 65536 };
        assert!(err.to_string().contains("65536"));
    }
}
