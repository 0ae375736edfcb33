//! The aggregation ledger facade
//!
//! One `AggregationLedger` is the unit the platform executes transactions
//! against: every public operation validates fully before its first write,
//! so a failed call observes no partial state change — in particular a
//! failed submission never advances a rate-limit timestamp and a failed
//! request never leaves a request record behind.

use std::sync::Arc;

use ciphersum_fhe::{CiphertextHandle, DecryptionProof, FheEngine, RequestId};

use crate::access::AccessControl;
use crate::actor::ActorId;
use crate::batch::{BatchInfo, BatchLedger};
use crate::errors::{LedgerError, LedgerResult};
use crate::events::{EventLog, LedgerEvent, RecordedEvent};
use crate::oracle::{DecryptionRequest, OracleProtocol};
use crate::ratelimit::{ActionClass, RateLimiter};

/// Default cooldown between same-class actions of one actor
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Domain separation tag for instance identity derivation
const INSTANCE_DST: &[u8] = b"ciphersum_ledger_instance_v1";

/// Ledger construction parameters
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Initial owner (also seeded as a provider)
    pub owner: ActorId,
    /// Shared cooldown for submissions and decryption requests
    pub cooldown_secs: u64,
    /// Tag mixed into the instance identity, separating fingerprints of
    /// otherwise identical deployments
    pub instance_tag: [u8; 32],
}

impl LedgerConfig {
    /// Create a configuration with defaults
    pub fn new(owner: ActorId) -> Self {
        Self {
            owner,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            instance_tag: [0u8; 32],
        }
    }

    /// Set the cooldown
    pub fn with_cooldown_secs(mut self, cooldown_secs: u64) -> Self {
        self.cooldown_secs = cooldown_secs;
        self
    }

    /// Set the instance tag
    pub fn with_instance_tag(mut self, instance_tag: [u8; 32]) -> Self {
        self.instance_tag = instance_tag;
        self
    }
}

/// Confidential batch aggregation ledger
pub struct AggregationLedger {
    instance_id: [u8; 32],
    engine: Arc<dyn FheEngine>,
    access: AccessControl,
    limiter: RateLimiter,
    batches: BatchLedger,
    oracle: OracleProtocol,
    events: EventLog,
}

impl AggregationLedger {
    /// Create a ledger with the given configuration and engine
    pub fn new(config: LedgerConfig, engine: Arc<dyn FheEngine>) -> LedgerResult<Self> {
        let limiter = RateLimiter::new(config.cooldown_secs)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(INSTANCE_DST);
        hasher.update(&config.instance_tag);
        hasher.update(config.owner.as_bytes());
        let instance_id = *hasher.finalize().as_bytes();

        Ok(Self {
            instance_id,
            engine,
            access: AccessControl::new(config.owner),
            limiter,
            batches: BatchLedger::new(),
            oracle: OracleProtocol::new(instance_id),
            events: EventLog::new(),
        })
    }

    // ------------------------------------------------------------------
    // Owner operations
    // ------------------------------------------------------------------

    /// Reassign ownership
    pub fn transfer_ownership(&mut self, caller: &ActorId, new_owner: ActorId) -> LedgerResult<()> {
        let previous = self.access.transfer_ownership(caller, new_owner)?;
        self.events.emit(LedgerEvent::OwnershipTransferred {
            previous,
            new_owner,
        });
        Ok(())
    }

    /// Register a provider. A no-op (no event) when already registered.
    pub fn add_provider(&mut self, caller: &ActorId, provider: ActorId) -> LedgerResult<()> {
        if self.access.add_provider(caller, provider)? {
            self.events.emit(LedgerEvent::ProviderAdded { provider });
        }
        Ok(())
    }

    /// Deregister a provider. A no-op (no event) when not registered.
    pub fn remove_provider(&mut self, caller: &ActorId, provider: ActorId) -> LedgerResult<()> {
        if self.access.remove_provider(caller, &provider)? {
            self.events.emit(LedgerEvent::ProviderRemoved { provider });
        }
        Ok(())
    }

    /// Pause batch-mutating and contribution operations
    pub fn pause(&mut self, caller: &ActorId) -> LedgerResult<()> {
        self.access.pause(caller)?;
        self.events.emit(LedgerEvent::Paused);
        Ok(())
    }

    /// Lift the pause
    pub fn unpause(&mut self, caller: &ActorId) -> LedgerResult<()> {
        self.access.unpause(caller)?;
        self.events.emit(LedgerEvent::Unpaused);
        Ok(())
    }

    /// Change the shared cooldown
    pub fn set_cooldown_secs(&mut self, caller: &ActorId, cooldown_secs: u64) -> LedgerResult<()> {
        self.access.ensure_owner(caller)?;
        self.limiter.set_cooldown_secs(cooldown_secs)?;
        self.events
            .emit(LedgerEvent::CooldownChanged { cooldown_secs });
        Ok(())
    }

    /// Open a new batch and make it the contribution target.
    /// Returns the new batch id.
    pub fn open_new_batch(&mut self, caller: &ActorId) -> LedgerResult<u64> {
        self.access.ensure_owner(caller)?;
        self.access.ensure_not_paused()?;
        let batch_id = self.batches.open_new_batch();
        self.events.emit(LedgerEvent::BatchOpened { batch_id });
        Ok(batch_id)
    }

    /// Close the current batch, freezing its aggregate.
    /// Returns the closed batch id.
    pub fn close_current_batch(&mut self, caller: &ActorId) -> LedgerResult<u64> {
        self.access.ensure_owner(caller)?;
        self.access.ensure_not_paused()?;
        let batch_id = self.batches.close_current_batch()?;
        self.events.emit(LedgerEvent::BatchClosed { batch_id });
        Ok(batch_id)
    }

    // ------------------------------------------------------------------
    // Provider operations
    // ------------------------------------------------------------------

    /// Merge an encrypted contribution into the current batch.
    /// Returns the batch id contributed to.
    pub fn submit_contribution(
        &mut self,
        caller: &ActorId,
        delta: &CiphertextHandle,
        now: u64,
    ) -> LedgerResult<u64> {
        self.access.ensure_provider(caller)?;
        self.access.ensure_not_paused()?;
        self.limiter.check(caller, ActionClass::Submission, now)?;

        let batch_id = self.batches.merge_contribution(self.engine.as_ref(), delta)?;

        self.limiter.record(caller, ActionClass::Submission, now);
        self.events.emit(LedgerEvent::ContributionAdded {
            batch_id,
            provider: *caller,
        });
        Ok(batch_id)
    }

    // ------------------------------------------------------------------
    // Decryption protocol
    // ------------------------------------------------------------------

    /// Request a one-time decryption of a closed batch's aggregate.
    /// Any actor may call this. Returns the engine-assigned request id.
    pub fn request_batch_decryption(
        &mut self,
        caller: &ActorId,
        batch_id: u64,
        now: u64,
    ) -> LedgerResult<RequestId> {
        // Only a frozen aggregate is meaningful to decrypt: id 0, unknown
        // ids, and still-open batches are all invalid targets.
        let batch = match self.batches.batch(batch_id) {
            Some(batch) if batch_id != 0 && batch.closed => batch,
            _ => return Err(LedgerError::InvalidBatchId(batch_id)),
        };
        self.limiter
            .check(caller, ActionClass::DecryptionRequest, now)?;

        let request_id = self.oracle.issue(self.engine.as_ref(), batch)?;

        self.limiter
            .record(caller, ActionClass::DecryptionRequest, now);
        self.events.emit(LedgerEvent::DecryptionRequested {
            request_id,
            batch_id,
        });
        Ok(request_id)
    }

    /// Accept a decryption result from the external engine.
    ///
    /// Invoked by the engine's delivery path, not by ordinary actors. A
    /// request is consumed at most once; redelivery fails `ReplayAttempt`.
    pub fn on_decryption_callback(
        &mut self,
        request_id: RequestId,
        cleartext: u64,
        proof: &DecryptionProof,
    ) -> LedgerResult<()> {
        let batch_id = self.oracle.consume(
            self.engine.as_ref(),
            &self.batches,
            request_id,
            cleartext,
            proof,
        )?;
        self.events.emit(LedgerEvent::DecryptionCompleted {
            request_id,
            batch_id,
            cleartext,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Current owner
    pub fn owner(&self) -> ActorId {
        self.access.owner()
    }

    /// Whether the actor is a registered provider
    pub fn is_provider(&self, actor: &ActorId) -> bool {
        self.access.is_provider(actor)
    }

    /// Whether the ledger is paused
    pub fn is_paused(&self) -> bool {
        self.access.is_paused()
    }

    /// Shared cooldown in seconds
    pub fn cooldown_secs(&self) -> u64 {
        self.limiter.cooldown_secs()
    }

    /// Id of the current contribution target, if any
    pub fn current_batch_id(&self) -> Option<u64> {
        self.batches.current_id()
    }

    /// Number of batches ever opened
    pub fn batch_count(&self) -> usize {
        self.batches.count()
    }

    /// Summary of a batch
    pub fn batch_info(&self, batch_id: u64) -> Option<BatchInfo> {
        self.batches.info(batch_id)
    }

    /// Look up a decryption request
    pub fn request_info(&self, request_id: RequestId) -> Option<&DecryptionRequest> {
        self.oracle.request(request_id)
    }

    /// Identity mixed into every fingerprint
    pub fn instance_id(&self) -> &[u8; 32] {
        self.oracle.instance_id()
    }

    /// All events in order
    pub fn events(&self) -> &[RecordedEvent] {
        self.events.entries()
    }

    /// Events with sequence number >= `from_seq`
    pub fn events_since(&self, from_seq: u64) -> &[RecordedEvent] {
        self.events.since(from_seq)
    }
}

impl std::fmt::Debug for AggregationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationLedger")
            .field("instance_id", &hex::encode(&self.instance_id[..8]))
            .field("owner", &self.access.owner())
            .field("paused", &self.access.is_paused())
            .field("batches", &self.batches.count())
            .field("events", &self.events.len())
            .finish()
    }
}
