//! CIPHERSUM FHE Engine Capability
//!
//! Opaque ciphertext handles and the decryption-oracle contract consumed by
//! the aggregation ledger. The ledger never looks inside a ciphertext: it
//! zero-initializes, homomorphically adds, serializes for fingerprinting,
//! and asks the engine for an asynchronous decryption whose result arrives
//! later as a callback.
//!
//! # Architecture:
//! - `FheEngine`: the capability contract (zero/add/serialize/request/verify)
//! - `DecryptionDelivery`: handoff of the asynchronous outcome stream
//! - `LocalFheEngine`: TFHE-rs backed engine that acts as its own oracle
//! - `MockFheEngine`: deterministic plaintext-tracking engine for tests

pub mod errors;

mod engine;
mod handle;
mod local;
mod mock;

pub use engine::{DecryptionDelivery, DecryptionOutcome, DecryptionProof, FheEngine, RequestId};
pub use errors::FheError;
pub use handle::CiphertextHandle;
pub use local::LocalFheEngine;
pub use mock::MockFheEngine;

/// Result type for engine operations
pub type FheResult<T> = Result<T, FheError>;
