//! CIPHERSUM Aggregation Ledger
//!
//! Registered providers submit encrypted numeric contributions into
//! sequenced batches; once a batch is closed, any actor may request a
//! one-time, verifiable decryption of its aggregate through an
//! asynchronous oracle callback.
//!
//! The crate is organized leaves-first:
//!
//! - `actor`: opaque 32-byte actor identities
//! - `access`: owner, provider allow-list, pause flag
//! - `ratelimit`: per-actor cooldowns for submissions and decryption requests
//! - `batch`: batch sequencing, open/closed lifecycle, encrypted aggregates
//! - `oracle`: decryption requests, ciphertext fingerprints, replay guard
//! - `events`: append-only notification log of state transitions
//! - `aggregator`: the facade executing each public operation atomically

pub mod access;
pub mod actor;
pub mod aggregator;
pub mod batch;
pub mod errors;
pub mod events;
pub mod oracle;
pub mod ratelimit;

pub use access::AccessControl;
pub use actor::ActorId;
pub use aggregator::{AggregationLedger, LedgerConfig, DEFAULT_COOLDOWN_SECS};
pub use batch::{Batch, BatchInfo, BatchLedger, EncryptedAggregate};
pub use errors::{LedgerError, LedgerResult};
pub use events::{EventLog, LedgerEvent, RecordedEvent};
pub use oracle::{DecryptionRequest, Fingerprint, OracleProtocol};
pub use ratelimit::{ActionClass, RateLimiter};
