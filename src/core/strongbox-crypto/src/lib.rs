//! # Strongbox Crypto
//!
//! Core cryptographic primitives for Strongbox.
//!
//! This crate provides stateless, one-shot operations:
//! - Key material generation (AES keys, RSA key pairs)
//! - Symmetric encryption (AES in CBC, GCM or legacy ECB mode)
//! - Asymmetric encryption (RSA PKCS#1 v1.5 with block chunking)
//! - Secure random generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod asymmetric;
pub mod error;
pub mod keys;
pub mod random;
pub mod symmetric;

pub use error::CryptoError;
pub use keys::{AesKeySize, RsaKeyPair, SymmetricKey};
pub use symmetric::CipherMode;
