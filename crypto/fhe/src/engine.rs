//! The FHE engine capability contract
//!
//! The aggregation ledger consumes the engine through this trait and never
//! learns how homomorphic add or decryption work. Decryption is a two-phase
//! protocol: `request_decryption` returns a request id immediately, and the
//! cleartext arrives later as a [`DecryptionOutcome`] on the delivery
//! stream, accompanied by a proof the ledger hands back to
//! `verify_decryption_proof`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{CiphertextHandle, FheResult};

/// Identifier the engine assigns to a pending decryption request
pub type RequestId = u64;

/// Proof that a cleartext matches the ciphertext a request was issued for
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    mac: [u8; 32],
}

impl DecryptionProof {
    /// Create a proof from raw bytes
    pub fn new(mac: [u8; 32]) -> Self {
        Self { mac }
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.mac
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.mac)
    }
}

impl std::fmt::Debug for DecryptionProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionProof")
            .field("mac", &hex::encode(&self.mac[..8]))
            .finish()
    }
}

/// A decryption result delivered asynchronously by the engine
#[derive(Clone, Debug)]
pub struct DecryptionOutcome {
    /// The request this result answers
    pub request_id: RequestId,
    /// Decrypted aggregate value
    pub cleartext: u64,
    /// Proof binding the cleartext to the request
    pub proof: DecryptionProof,
}

/// Capability contract provided by an external FHE engine.
///
/// Implementations must be shareable across threads; the ledger holds the
/// engine behind an `Arc<dyn FheEngine>`.
pub trait FheEngine: Send + Sync {
    /// Zero-valued ciphertext, used for lazy aggregate initialization
    fn zero(&self) -> FheResult<CiphertextHandle>;

    /// Encrypt a contribution value (client-side helper)
    fn encrypt(&self, value: u64) -> FheResult<CiphertextHandle>;

    /// Homomorphic addition of two ciphertexts
    fn add(&self, a: &CiphertextHandle, b: &CiphertextHandle) -> FheResult<CiphertextHandle>;

    /// Whether the handle refers to a real ciphertext
    fn is_initialized(&self, handle: &CiphertextHandle) -> bool;

    /// Canonical byte representation of a handle, used for fingerprinting
    fn serialize(&self, handle: &CiphertextHandle) -> FheResult<Vec<u8>>;

    /// Begin an asynchronous decryption of the given serialized handles.
    ///
    /// The cleartext is never a return value: it arrives later as a
    /// [`DecryptionOutcome`] through the engine's delivery stream.
    fn request_decryption(&self, handles: &[Vec<u8>]) -> FheResult<RequestId>;

    /// Verify the proof carried by a decryption callback
    fn verify_decryption_proof(
        &self,
        request_id: RequestId,
        cleartext: u64,
        proof: &DecryptionProof,
    ) -> FheResult<()>;
}

/// Outcome-stream handoff for engines that deliver their own callbacks.
///
/// Delivery is at least once: transports may duplicate, and consumers must
/// treat the processed flag on their side as the source of truth.
pub trait DecryptionDelivery {
    /// Take the outcome receiver. Returns `None` once taken.
    fn take_outcome_stream(&self) -> Option<mpsc::UnboundedReceiver<DecryptionOutcome>>;
}
