//! Error types for dispatch operations.

use thiserror::Error;

use crate::core::model::JobStatus;
use crate::util::serde::{DriverId, JobId};

/// Failures decoding or validating an offer token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token deadline has passed.
    #[error("token expired")]
    Expired,
    /// Token could not be parsed.
    #[error("token malformed")]
    Malformed,
    /// Token signature does not match its payload.
    #[error("token signature mismatch")]
    BadSignature,
}

/// Failure reported by a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Errors produced by dispatch components.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Job does not exist in the store.
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    /// A sent offer already exists for the job.
    #[error("job {0} already has an outstanding offer")]
    AlreadyOffered(JobId),
    /// Candidate cannot receive an offer.
    #[error("driver {driver} is ineligible: {reason}")]
    Ineligible {
        /// Driver that was skipped.
        driver: DriverId,
        /// Why the driver was skipped.
        reason: String,
    },
    /// The job left the states that accept a new offer.
    #[error("job {job} is no longer awaiting an offer ({status:?})")]
    NotOpen {
        /// Job the offer was meant for.
        job: JobId,
        /// Status found at commit time.
        status: JobStatus,
    },
    /// Schedule or deadline arithmetic left the representable time range.
    #[error("time out of range for job {job}: {what}")]
    OutOfRange {
        /// Job whose schedule was being computed.
        job: JobId,
        /// Which value overflowed.
        what: &'static str,
    },
    /// The job kept changing under a conditional commit.
    #[error("job {0} changed repeatedly during acceptance")]
    Contended(JobId),
    /// Token could not be produced or read.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    /// Configuration failed validation.
    #[error("config invalid: {0}")]
    Config(String),
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
