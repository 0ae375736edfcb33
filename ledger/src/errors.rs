//! Ledger error types
//!
//! One distinguishable variant per failure kind, never a catch-all, so
//! callers can key retry logic off the kind (e.g. wait out a cooldown and
//! resubmit). Every error aborts the whole call with no partial writes.

use ciphersum_fhe::{FheError, RequestId};
use thiserror::Error;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum LedgerError {
    // Authorization errors
    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Caller is not a registered provider")]
    NotProvider,

    // Lifecycle errors
    #[error("Ledger is paused")]
    Paused,

    #[error("Ledger is already paused")]
    AlreadyPaused,

    #[error("Ledger is not paused")]
    NotPaused,

    #[error("Current batch is closed or does not exist")]
    BatchClosedOrInvalid,

    #[error("Invalid batch id: {0}")]
    InvalidBatchId(u64),

    #[error("Batch {0} has an uninitialized aggregate")]
    UninitializedAggregate(u64),

    #[error("Invalid actor id: {0}")]
    InvalidActorId(String),

    // Rate limiting errors
    #[error("Cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: u64 },

    #[error("Cooldown must be strictly positive")]
    InvalidCooldown,

    // Oracle protocol errors
    #[error("Decryption request {0} is unknown or already processed")]
    ReplayAttempt(RequestId),

    #[error("Ciphertext fingerprint mismatch for request {0}")]
    StateMismatch(RequestId),

    #[error("Decryption proof rejected: {0}")]
    ProofRejected(String),

    // Engine passthrough
    #[error("Engine error: {0}")]
    Engine(#[from] FheError),
}
