//! Append-only event log
//!
//! Every state transition appends one event; external observers poll or
//! subscribe to reconstruct state. Together with the entities themselves
//! this log is the only durable audit trail.

use ciphersum_fhe::RequestId;
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;

/// State transition notifications
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Ownership reassigned
    OwnershipTransferred { previous: ActorId, new_owner: ActorId },
    /// Provider registered
    ProviderAdded { provider: ActorId },
    /// Provider deregistered
    ProviderRemoved { provider: ActorId },
    /// Ledger paused
    Paused,
    /// Ledger unpaused
    Unpaused,
    /// Shared cooldown changed
    CooldownChanged { cooldown_secs: u64 },
    /// Batch opened and made current
    BatchOpened { batch_id: u64 },
    /// Batch closed
    BatchClosed { batch_id: u64 },
    /// Contribution merged into a batch
    ContributionAdded { batch_id: u64, provider: ActorId },
    /// Decryption request issued
    DecryptionRequested { request_id: RequestId, batch_id: u64 },
    /// Decryption result delivered
    DecryptionCompleted {
        request_id: RequestId,
        batch_id: u64,
        cleartext: u64,
    },
}

/// An event with its position in the log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Zero-based position in the log
    pub seq: u64,
    pub event: LedgerEvent,
}

/// Ordered, append-only log of ledger events
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    entries: Vec<RecordedEvent>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns its sequence number.
    pub fn emit(&mut self, event: LedgerEvent) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(RecordedEvent { seq, event });
        seq
    }

    /// All events in order
    pub fn entries(&self) -> &[RecordedEvent] {
        &self.entries
    }

    /// Events with sequence number >= `from_seq`
    pub fn since(&self, from_seq: u64) -> &[RecordedEvent] {
        let start = (from_seq as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<&RecordedEvent> {
        self.entries.last()
    }

    /// Number of events emitted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
