//! FHE engine error types

use thiserror::Error;

/// Errors that can occur inside an FHE engine
#[derive(Error, Debug)]
pub enum FheError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid ciphertext
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Homomorphic operation failed
    #[error("Homomorphic operation failed: {0}")]
    OperationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Overflow during computation
    #[error("Overflow during computation")]
    Overflow,

    /// Decryption proof did not verify
    #[error("Decryption proof verification failed")]
    ProofVerificationFailed,
}
