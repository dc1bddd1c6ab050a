//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key has the wrong length or a malformed encoding.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The requested algorithm or key size is not available.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A caller-supplied parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Cipher initialization or finalization failed, or the input is corrupted.
    #[error("crypto operation failed: {0}")]
    OperationFailed(String),
}
