//! Engine-level configuration errors, distinct from position validation.
//!
//! Contract violations inside the search tree (placing on an occupied cell,
//! an unbalanced make/unmake pair, popcount drift) are programmer bugs and
//! stay as `debug_assert!`s — they never reach this enum.

/// Configuration problems detected when building an engine instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A thread pool was configured with zero worker threads.
    #[error("thread count must be at least 1, got {requested}")]
    ZeroThreads {
        /// The rejected thread count.
        requested: usize,
    },
    /// A transposition table was sized at zero megabytes.
    #[error("transposition table size must be at least 1 MiB, got {requested}")]
    ZeroHashSize {
        /// The rejected size in MiB.
        requested: usize,
    },
    /// The position handed to the engine failed board-invariant validation.
    #[error(transparent)]
    InvalidPosition(#[from] caro_core::PositionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threads_display() {
        let err = EngineError::ZeroThreads { requested: 0 };
        assert_eq!(format!("{err}"), "thread count must be at least 1, got 0");
    }

    #[test]
    fn zero_hash_size_display() {
        let err = EngineError::ZeroHashSize { requested: 0 };
        assert_eq!(format!("{err}"), "transposition table size must be at least 1 MiB, got 0");
    }
}
