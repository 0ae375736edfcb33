//! Decryption oracle protocol
//!
//! A two-phase protocol guarding against stale-state decryption and replay.
//! Issuance snapshots a fingerprint of the aggregate's canonical ciphertext
//! bytes bound to the ledger instance; consumption re-derives the
//! fingerprint from the ciphertext stored *now* and rejects on drift, so a
//! result is only ever accepted for the exact state it was requested
//! against. Request records are never deleted: a processed record is the
//! permanent replay guard.

use std::collections::HashMap;

use ciphersum_fhe::{DecryptionProof, FheEngine, RequestId};
use serde::{Deserialize, Serialize};

use crate::batch::{Batch, BatchLedger};
use crate::errors::{LedgerError, LedgerResult};

/// Domain separation tag for aggregate fingerprints
const FINGERPRINT_DST: &[u8] = b"ciphersum_aggregate_fingerprint_v1";

/// Hash binding a ciphertext state to a ledger instance
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute over canonical ciphertext bytes and the instance identity
    pub fn compute(serialized: &[u8], instance_id: &[u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(FINGERPRINT_DST);
        hasher.update(&(serialized.len() as u64).to_le_bytes());
        hasher.update(serialized);
        hasher.update(instance_id);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0[..8]))
    }
}

/// A pending or consumed decryption request
#[derive(Clone, Debug)]
pub struct DecryptionRequest {
    /// Id assigned by the external engine at issuance
    pub request_id: RequestId,
    /// Batch whose aggregate the request targets
    pub batch_id: u64,
    /// Ciphertext state snapshot taken at issuance
    pub fingerprint: Fingerprint,
    /// Flipped exactly once when the callback is accepted
    pub processed: bool,
}

/// Request store and callback validator
#[derive(Clone, Debug)]
pub struct OracleProtocol {
    instance_id: [u8; 32],
    requests: HashMap<RequestId, DecryptionRequest>,
}

impl OracleProtocol {
    /// Create for the given ledger instance identity
    pub fn new(instance_id: [u8; 32]) -> Self {
        Self {
            instance_id,
            requests: HashMap::new(),
        }
    }

    /// Instance identity mixed into every fingerprint
    pub fn instance_id(&self) -> &[u8; 32] {
        &self.instance_id
    }

    /// Look up a request by id
    pub fn request(&self, request_id: RequestId) -> Option<&DecryptionRequest> {
        self.requests.get(&request_id)
    }

    /// Number of requests ever issued
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Issue a decryption request against a closed batch.
    ///
    /// The caller has already validated the batch lifecycle; this checks
    /// the aggregate is initialized, snapshots the fingerprint, and hands
    /// the serialized ciphertext to the engine. An engine-assigned id that
    /// collides with a stored request is rejected rather than overwritten.
    pub fn issue(&mut self, engine: &dyn FheEngine, batch: &Batch) -> LedgerResult<RequestId> {
        let handle = batch
            .aggregate
            .handle()
            .ok_or(LedgerError::UninitializedAggregate(batch.id))?;

        let serialized = engine.serialize(handle)?;
        let fingerprint = Fingerprint::compute(&serialized, &self.instance_id);
        let request_id = engine.request_decryption(&[serialized])?;

        if self.requests.contains_key(&request_id) {
            return Err(LedgerError::ReplayAttempt(request_id));
        }
        self.requests.insert(
            request_id,
            DecryptionRequest {
                request_id,
                batch_id: batch.id,
                fingerprint,
                processed: false,
            },
        );
        Ok(request_id)
    }

    /// Validate and consume a decryption callback. Returns the batch id
    /// the result belongs to.
    ///
    /// Order matters: replay, then state drift, then proof. Only after all
    /// three pass is the request marked processed — a proof rejection
    /// leaves it pending so the engine may redeliver.
    pub fn consume(
        &mut self,
        engine: &dyn FheEngine,
        batches: &BatchLedger,
        request_id: RequestId,
        cleartext: u64,
        proof: &DecryptionProof,
    ) -> LedgerResult<u64> {
        let (batch_id, expected) = match self.requests.get(&request_id) {
            Some(request) if !request.processed => (request.batch_id, request.fingerprint),
            _ => return Err(LedgerError::ReplayAttempt(request_id)),
        };

        // Re-derive the fingerprint from the ciphertext stored now. A
        // closed batch cannot legally change, so a mismatch means an
        // out-of-band mutation and the result must not be delivered.
        let current = batches
            .batch(batch_id)
            .and_then(|batch| batch.aggregate.handle())
            .ok_or(LedgerError::StateMismatch(request_id))?;
        let serialized = engine.serialize(current)?;
        if Fingerprint::compute(&serialized, &self.instance_id) != expected {
            return Err(LedgerError::StateMismatch(request_id));
        }

        engine
            .verify_decryption_proof(request_id, cleartext, proof)
            .map_err(|e| LedgerError::ProofRejected(e.to_string()))?;

        if let Some(request) = self.requests.get_mut(&request_id) {
            request.processed = true;
        }
        Ok(batch_id)
    }
}
