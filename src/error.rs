//! Tracker error types.
//!
//! [`TrackerError`] is the central error type for the tracker. Variants map
//! onto the failure taxonomy: configuration problems abort startup, store
//! failures abort the current cycle, and source failures are caught at the
//! orchestration boundary so a single bad source never aborts a cycle.

/// Error raised while fetching or extracting events from one source.
///
/// Source errors are non-fatal: the orchestrator logs them and treats the
/// source as having contributed zero events for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed after all retries were exhausted.
    #[error("fetch failed after {attempts} attempts: {reason}")]
    FetchFailed {
        /// Number of attempts made (initial try plus retries).
        attempts: u32,
        /// Last error observed.
        reason: String,
    },

    /// Server answered with a non-success status code.
    #[error("unexpected status {0}")]
    BadStatus(u16),
}

/// Central error enum for the tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// One source failed to fetch or parse.
    #[error("source '{provider}' failed: {source}")]
    Source {
        /// Provider name of the failing source.
        provider: String,
        /// Underlying source error.
        source: SourceError,
    },

    /// Persistence layer failure. Fatal to the current cycle: the snapshot
    /// must not be replaced and no success digest is reported.
    #[error("store error: {0}")]
    Store(String),

    /// JSON serialization of a history payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
