//! Error types for the placement engine.

use std::path::PathBuf;

/// Errors that can abort a placement run.
///
/// Configuration and capacity problems are surfaced before any placement
/// work. Convergence and legalization failures leave the circuit in the
/// last well-defined layout so a caller may inspect it or retry with
/// relaxed parameters.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// An option or technology value is illegal.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Description of the offending value.
        reason: String,
    },

    /// The movable cells cannot fit into the placement region.
    #[error("capacity exceeded: {reason} (movable area {cell_area}, region area {region_area})")]
    Capacity {
        /// What exceeded the region: total area or a cell dimension.
        reason: String,
        /// Total movable cell area.
        cell_area: i64,
        /// Total region area.
        region_area: i64,
    },

    /// Global placement failed to converge.
    ///
    /// The blocks keep the best layout seen so far.
    #[error("global placement did not converge; best HPWL {best_hpwl}")]
    Convergence {
        /// The best half-perimeter wire length observed.
        best_hpwl: f64,
    },

    /// Both clustering passes overflowed a stripe.
    ///
    /// The layout is left as packed so far; retry with a larger stripe
    /// width or a relaxed filling rate.
    #[error("cluster legalization overflowed stripe {stripe}")]
    Legalization {
        /// Index of the overflowing stripe.
        stripe: usize,
    },

    /// The quadratic solve produced a non-finite system.
    #[error("numeric failure in quadratic solve: {reason}")]
    Numeric {
        /// Description of the numeric problem.
        reason: String,
    },

    /// An I/O error occurred while emitting result files.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_display() {
        let err = PlaceError::Config {
            reason: "filling rate must lie in (0, 1]".into(),
        };
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("filling rate"));
    }

    #[test]
    fn capacity_display() {
        let err = PlaceError::Capacity {
            reason: "cell area exceeds region area".into(),
            cell_area: 110,
            region_area: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("110"));
        assert!(msg.contains("100"));
        assert!(msg.contains("cell area exceeds region area"));
    }

    #[test]
    fn convergence_display() {
        let err = PlaceError::Convergence { best_hpwl: 42.5 };
        assert!(err.to_string().contains("42.5"));
    }

    #[test]
    fn legalization_display() {
        let err = PlaceError::Legalization { stripe: 3 };
        assert!(err.to_string().contains("stripe 3"));
    }

    #[test]
    fn io_display() {
        let err = PlaceError::Io {
            path: PathBuf::from("out_cluster.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("out_cluster.txt"));
    }
}
