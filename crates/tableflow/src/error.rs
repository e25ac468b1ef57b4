// ── Table error types ──
//
// Failures surfaced to consumers through `TableState::error` and the
// injected error hook. Fetch failures never escape the mutator API --
// they are folded into state so views can render them.

use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by [`DataSource`](crate::source::DataSource)
/// implementations.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for a fetch cycle.
///
/// The variant records *which stage* failed: the source itself, payload
/// shape validation, record decoding, or the fetch deadline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    // ── Payload errors ───────────────────────────────────────────────
    #[error("response is not a record sequence (got {got})")]
    InvalidShape { got: &'static str },

    #[error("record decoding failed: {message}")]
    Decode { message: String },

    // ── Source errors ────────────────────────────────────────────────
    #[error("data source failed: {message}")]
    Source { message: String },

    #[error("fetch exceeded deadline of {deadline:?}")]
    Timeout { deadline: Duration },
}

// ── Conversion from source-layer errors ──────────────────────────────

impl From<SourceError> for TableError {
    fn from(err: SourceError) -> Self {
        TableError::Source {
            message: err.to_string(),
        }
    }
}
