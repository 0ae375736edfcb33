//! Opaque ciphertext handles
//!
//! A handle carries the canonical serialized form of an encrypted value.
//! The aggregation core treats it as a black box: the canonical bytes are
//! what the oracle fingerprint is computed over.

use serde::{Deserialize, Serialize};

/// Opaque handle to an encrypted contribution or aggregate
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextHandle {
    /// Canonical serialized ciphertext bytes
    data: Vec<u8>,
    /// Homomorphic operation count (noise proxy)
    op_count: u32,
}

impl CiphertextHandle {
    /// Create a handle from canonical ciphertext bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, op_count: 0 }
    }

    /// Create a handle carrying an operation count
    pub fn with_op_count(data: Vec<u8>, op_count: u32) -> Self {
        Self { data, op_count }
    }

    /// Get the canonical ciphertext bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the operation count
    pub fn op_count(&self) -> u32 {
        self.op_count
    }
}

impl std::fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiphertextHandle")
            .field("size", &self.data.len())
            .field("ops", &self.op_count)
            .finish()
    }
}
