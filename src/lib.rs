//! CIPHERSUM: Confidential Batch Aggregation
//!
//! This is the root crate that re-exports all CIPHERSUM components and
//! provides the async service layer wiring the FHE engine's callback
//! delivery into the aggregation ledger.
//!
//! ## Architecture Overview
//!
//! Registered providers submit FHE-encrypted numeric contributions into
//! sequenced batches. The owner closes a batch to freeze its aggregate;
//! any actor may then request a one-time, verifiable decryption. The
//! external engine answers asynchronously, and the ledger accepts the
//! result only when the ciphertext fingerprint recorded at request time
//! still matches — a result never silently retargets a mutated aggregate,
//! and a request is consumed at most once.
//!
//! ## Crate Organization
//!
//! - `ciphersum-fhe`: the FHE engine capability (opaque handles,
//!   homomorphic add, asynchronous decryption oracle)
//! - `ciphersum-ledger`: access control, rate limiting, batch lifecycle,
//!   oracle protocol, event log
//! - this crate: the `AggregatorService` integration layer

pub mod service;

// Re-export component crates
pub use ciphersum_fhe as fhe;
pub use ciphersum_ledger as ledger;

/// CIPHERSUM protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service configuration defaults
pub mod config {
    /// Default capacity of the event broadcast channel
    pub const DEFAULT_EVENT_CAPACITY: usize = 256;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use ciphersum_fhe::{
        CiphertextHandle, DecryptionDelivery, DecryptionOutcome, DecryptionProof, FheEngine,
        LocalFheEngine, MockFheEngine, RequestId,
    };
    pub use ciphersum_ledger::{
        ActionClass, ActorId, AggregationLedger, BatchInfo, LedgerConfig, LedgerError,
        LedgerEvent, LedgerResult, RecordedEvent,
    };
    pub use crate::service::{AggregatorService, ServiceConfig, ServiceError};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
