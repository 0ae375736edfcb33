//! TFHE-rs backed engine
//!
//! Holds the client key, so it can act as its own decryption oracle: each
//! request is decrypted on the spot and the outcome queued on the delivery
//! channel, standing in for the network round trip of a production oracle.
//! Proofs are keyed blake3 MACs over `(request_id, cleartext)` that only
//! this engine can mint and verify.

use parking_lot::Mutex;
use rand::RngCore;
use tfhe::prelude::*;
use tfhe::{generate_keys, set_server_key, ClientKey, ConfigBuilder, FheUint64, ServerKey};
use tokio::sync::mpsc;

use crate::engine::{DecryptionDelivery, DecryptionOutcome, DecryptionProof, FheEngine, RequestId};
use crate::errors::FheError;
use crate::{CiphertextHandle, FheResult};

/// Domain separation tag for decryption proofs
const PROOF_DST: &[u8] = b"ciphersum_decryption_proof_v1";

/// FHE engine backed by TFHE-rs
pub struct LocalFheEngine {
    /// Client key for encryption and oracle-side decryption
    client_key: ClientKey,
    /// Server key for homomorphic operations
    server_key: ServerKey,
    /// MAC key for decryption proofs
    proof_key: [u8; 32],
    /// Next request id to assign
    next_request_id: Mutex<RequestId>,
    /// Outcome delivery channel
    outcome_tx: mpsc::UnboundedSender<DecryptionOutcome>,
    outcome_rx: Mutex<Option<mpsc::UnboundedReceiver<DecryptionOutcome>>>,
}

impl LocalFheEngine {
    /// Create a new engine.
    ///
    /// WARNING: key generation is slow (tens of seconds).
    pub fn new() -> FheResult<Self> {
        let config = ConfigBuilder::default().build();
        let (client_key, server_key) = generate_keys(config);
        set_server_key(server_key.clone());

        let mut proof_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut proof_key);

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Ok(Self {
            client_key,
            server_key,
            proof_key,
            next_request_id: Mutex::new(1),
            outcome_tx,
            outcome_rx: Mutex::new(Some(outcome_rx)),
        })
    }

    fn decode(data: &[u8]) -> FheResult<FheUint64> {
        bincode::deserialize(data).map_err(|e| FheError::SerializationError(e.to_string()))
    }

    fn encode(value: &FheUint64, op_count: u32) -> FheResult<CiphertextHandle> {
        let data =
            bincode::serialize(value).map_err(|e| FheError::SerializationError(e.to_string()))?;
        Ok(CiphertextHandle::with_op_count(data, op_count))
    }

    fn prove(&self, request_id: RequestId, cleartext: u64) -> DecryptionProof {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(PROOF_DST);
        hasher.update(&request_id.to_le_bytes());
        hasher.update(&cleartext.to_le_bytes());
        DecryptionProof::new(*hasher.finalize().as_bytes())
    }
}

impl std::fmt::Debug for LocalFheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFheEngine")
            .field("next_request_id", &*self.next_request_id.lock())
            .finish()
    }
}

impl FheEngine for LocalFheEngine {
    fn zero(&self) -> FheResult<CiphertextHandle> {
        self.encrypt(0)
    }

    fn encrypt(&self, value: u64) -> FheResult<CiphertextHandle> {
        let encrypted = FheUint64::encrypt(value, &self.client_key);
        Self::encode(&encrypted, 0)
    }

    fn add(&self, a: &CiphertextHandle, b: &CiphertextHandle) -> FheResult<CiphertextHandle> {
        set_server_key(self.server_key.clone());

        let lhs = Self::decode(a.data())?;
        let rhs = Self::decode(b.data())?;
        let sum = &lhs + &rhs;

        let ops = a
            .op_count()
            .saturating_add(b.op_count())
            .saturating_add(1);
        Self::encode(&sum, ops)
    }

    fn is_initialized(&self, handle: &CiphertextHandle) -> bool {
        !handle.data().is_empty()
    }

    fn serialize(&self, handle: &CiphertextHandle) -> FheResult<Vec<u8>> {
        if handle.data().is_empty() {
            return Err(FheError::InvalidCiphertext("empty handle".into()));
        }
        Ok(handle.data().to_vec())
    }

    fn request_decryption(&self, handles: &[Vec<u8>]) -> FheResult<RequestId> {
        let first = handles
            .first()
            .ok_or_else(|| FheError::InvalidCiphertext("no handles in request".into()))?;
        let ciphertext = Self::decode(first)?;
        let cleartext: u64 = ciphertext.decrypt(&self.client_key);

        let request_id = {
            let mut next = self.next_request_id.lock();
            let id = *next;
            *next += 1;
            id
        };

        let proof = self.prove(request_id, cleartext);
        // Nobody listening means the outcome is dropped; the request record
        // on the ledger side stays pending, which the protocol permits.
        let _ = self.outcome_tx.send(DecryptionOutcome {
            request_id,
            cleartext,
            proof,
        });

        Ok(request_id)
    }

    fn verify_decryption_proof(
        &self,
        request_id: RequestId,
        cleartext: u64,
        proof: &DecryptionProof,
    ) -> FheResult<()> {
        if self.prove(request_id, cleartext) == *proof {
            Ok(())
        } else {
            Err(FheError::ProofVerificationFailed)
        }
    }
}

impl DecryptionDelivery for LocalFheEngine {
    fn take_outcome_stream(&self) -> Option<mpsc::UnboundedReceiver<DecryptionOutcome>> {
        self.outcome_rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_request_delivers_sum() {
        let engine = LocalFheEngine::new().unwrap();

        let a = engine.encrypt(5).unwrap();
        let b = engine.encrypt(3).unwrap();
        let sum = engine.add(&a, &b).unwrap();

        let serialized = engine.serialize(&sum).unwrap();
        let request_id = engine.request_decryption(&[serialized]).unwrap();

        let mut stream = engine.take_outcome_stream().unwrap();
        let outcome = stream.try_recv().unwrap();

        assert_eq!(outcome.request_id, request_id);
        assert_eq!(outcome.cleartext, 8);
        engine
            .verify_decryption_proof(outcome.request_id, outcome.cleartext, &outcome.proof)
            .unwrap();
    }

    #[test]
    fn test_tampered_proof_is_rejected() {
        let engine = LocalFheEngine::new().unwrap();

        let value = engine.encrypt(42).unwrap();
        let serialized = engine.serialize(&value).unwrap();
        let request_id = engine.request_decryption(&[serialized]).unwrap();

        let mut stream = engine.take_outcome_stream().unwrap();
        let outcome = stream.try_recv().unwrap();

        // Wrong cleartext under a valid proof
        assert!(matches!(
            engine.verify_decryption_proof(request_id, outcome.cleartext + 1, &outcome.proof),
            Err(FheError::ProofVerificationFailed)
        ));

        // Forged proof under the right cleartext
        let forged = DecryptionProof::new([0u8; 32]);
        assert!(matches!(
            engine.verify_decryption_proof(request_id, outcome.cleartext, &forged),
            Err(FheError::ProofVerificationFailed)
        ));
    }
}
