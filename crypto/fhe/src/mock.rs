//! Deterministic engine double
//!
//! Handles embed the plaintext in their canonical bytes, so homomorphic add
//! is plain addition and oracle-side decryption is a parse. Ledger tests use
//! this engine; the protocol under test cannot tell the difference because
//! it only ever sees the capability contract.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::engine::{DecryptionDelivery, DecryptionOutcome, DecryptionProof, FheEngine, RequestId};
use crate::errors::FheError;
use crate::{CiphertextHandle, FheResult};

/// Tag prefixing every mock ciphertext
const MOCK_TAG: &[u8; 8] = b"mockct01";

/// Domain separation tag for mock decryption proofs
const PROOF_DST: &[u8] = b"ciphersum_mock_decryption_proof_v1";

/// Plaintext-tracking FHE engine for tests and local development
pub struct MockFheEngine {
    proof_key: [u8; 32],
    next_request_id: Mutex<RequestId>,
    outcome_tx: mpsc::UnboundedSender<DecryptionOutcome>,
    outcome_rx: Mutex<Option<mpsc::UnboundedReceiver<DecryptionOutcome>>>,
}

impl MockFheEngine {
    /// Create a new mock engine
    pub fn new() -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            proof_key: *blake3::hash(b"ciphersum_mock_proof_key").as_bytes(),
            next_request_id: Mutex::new(1),
            outcome_tx,
            outcome_rx: Mutex::new(Some(outcome_rx)),
        }
    }

    fn decode(data: &[u8]) -> FheResult<u64> {
        if data.len() != MOCK_TAG.len() + 8 || &data[..MOCK_TAG.len()] != MOCK_TAG {
            return Err(FheError::InvalidCiphertext(
                "not a mock ciphertext".into(),
            ));
        }
        let mut value = [0u8; 8];
        value.copy_from_slice(&data[MOCK_TAG.len()..]);
        Ok(u64::from_le_bytes(value))
    }

    fn encode(value: u64, op_count: u32) -> CiphertextHandle {
        let mut data = Vec::with_capacity(MOCK_TAG.len() + 8);
        data.extend_from_slice(MOCK_TAG);
        data.extend_from_slice(&value.to_le_bytes());
        CiphertextHandle::with_op_count(data, op_count)
    }

    fn prove(&self, request_id: RequestId, cleartext: u64) -> DecryptionProof {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(PROOF_DST);
        hasher.update(&request_id.to_le_bytes());
        hasher.update(&cleartext.to_le_bytes());
        DecryptionProof::new(*hasher.finalize().as_bytes())
    }
}

impl Default for MockFheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockFheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFheEngine")
            .field("next_request_id", &*self.next_request_id.lock())
            .finish()
    }
}

impl FheEngine for MockFheEngine {
    fn zero(&self) -> FheResult<CiphertextHandle> {
        self.encrypt(0)
    }

    fn encrypt(&self, value: u64) -> FheResult<CiphertextHandle> {
        Ok(Self::encode(value, 0))
    }

    fn add(&self, a: &CiphertextHandle, b: &CiphertextHandle) -> FheResult<CiphertextHandle> {
        let lhs = Self::decode(a.data())?;
        let rhs = Self::decode(b.data())?;
        let sum = lhs.checked_add(rhs).ok_or(FheError::Overflow)?;

        let ops = a
            .op_count()
            .saturating_add(b.op_count())
            .saturating_add(1);
        Ok(Self::encode(sum, ops))
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
        let cleartext = Self::decode(first)?;

        let request_id = {
            let mut next = self.next_request_id.lock();
            let id = *next;
            *next += 1;
            id
        };

        let proof = self.prove(request_id, cleartext);
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

impl DecryptionDelivery for MockFheEngine {
    fn take_outcome_stream(&self) -> Option<mpsc::UnboundedReceiver<DecryptionOutcome>> {
        self.outcome_rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_plain_addition() {
        let engine = MockFheEngine::new();
        let a = engine.encrypt(5).unwrap();
        let b = engine.encrypt(3).unwrap();
        let sum = engine.add(&a, &b).unwrap();

        assert_eq!(MockFheEngine::decode(sum.data()).unwrap(), 8);
        assert_eq!(sum.op_count(), 1);
    }

    #[test]
    fn test_add_overflow_fails() {
        let engine = MockFheEngine::new();
        let a = engine.encrypt(u64::MAX).unwrap();
        let b = engine.encrypt(1).unwrap();

        assert!(matches!(engine.add(&a, &b), Err(FheError::Overflow)));
    }

    #[test]
    fn test_request_ids_are_sequential() {
        let engine = MockFheEngine::new();
        let value = engine.encrypt(7).unwrap();
        let serialized = engine.serialize(&value).unwrap();

        let first = engine.request_decryption(&[serialized.clone()]).unwrap();
        let second = engine.request_decryption(&[serialized]).unwrap();

        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_outcome_stream_delivers_in_order() {
        let engine = MockFheEngine::new();
        let a = engine.serialize(&engine.encrypt(11).unwrap()).unwrap();
        let b = engine.serialize(&engine.encrypt(22).unwrap()).unwrap();

        engine.request_decryption(&[a]).unwrap();
        engine.request_decryption(&[b]).unwrap();

        let mut stream = engine.take_outcome_stream().unwrap();
        assert_eq!(stream.try_recv().unwrap().cleartext, 11);
        assert_eq!(stream.try_recv().unwrap().cleartext, 22);
        assert!(engine.take_outcome_stream().is_none());
    }

    #[test]
    fn test_foreign_bytes_are_rejected() {
        let engine = MockFheEngine::new();
        let garbage = CiphertextHandle::new(vec![9; 16]);
        let zero = engine.zero().unwrap();

        assert!(engine.add(&zero, &garbage).is_err());
    }

    #[test]
    fn test_proof_roundtrip() {
        let engine = MockFheEngine::new();
        let serialized = engine.serialize(&engine.encrypt(99).unwrap()).unwrap();
        let request_id = engine.request_decryption(&[serialized]).unwrap();

        let outcome = engine
            .take_outcome_stream()
            .unwrap()
            .try_recv()
            .unwrap();

        engine
            .verify_decryption_proof(request_id, 99, &outcome.proof)
            .unwrap();
        assert!(engine
            .verify_decryption_proof(request_id, 100, &outcome.proof)
            .is_err());
    }
}
