//! Unified error handling for the commutematch library.
//!
//! Every error is non-recoverable for the trip group or user it concerns:
//! callers catch at the per-user boundary, log, and continue with the next
//! user. Computation is pure and deterministic, so there are no retries.

use thiserror::Error;

/// Result type alias using [`CommuteFlowError`].
pub type Result<T> = std::result::Result<T, CommuteFlowError>;

/// Errors produced by the classification pipeline.
#[derive(Debug, Error)]
pub enum CommuteFlowError {
    /// A merge operation received an empty membership payload.
    #[error("cluster '{cluster_id}' cannot absorb an empty membership payload")]
    EmptyMembership { cluster_id: String },

    /// Two commuting legs were paired with a transfer-type combination
    /// that has no valid daily classification.
    #[error("cannot pair commuting legs with transfer types '{primary}' and '{secondary}'")]
    IncompatibleTransferTypes { primary: String, secondary: String },

    /// A configuration value is out of range or non-finite.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A trip record was rejected at ingestion.
    #[error("invalid trip record '{trip_id}': {reason}")]
    InvalidRecord { trip_id: String, reason: String },

    /// A wall-clock time string did not parse as HH:MM:SS.
    #[error("malformed time-of-day '{value}', expected HH:MM:SS")]
    MalformedTime { value: String },
}
