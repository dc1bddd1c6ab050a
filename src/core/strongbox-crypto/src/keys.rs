//! Key material generation and validation.
//!
//! Symmetric keys are raw AES key bytes with no derivation step. RSA key pairs
//! are handed out as DER encodings: the public key as X.509
//! `SubjectPublicKeyInfo`, the private key as PKCS#8. Secret bytes are wiped
//! from memory on drop.

use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::RsaPrivateKey;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CryptoError;
use crate::random::generate_key_bytes;

/// Default RSA modulus size in bits.
pub const DEFAULT_RSA_BITS: usize = 512;

/// Smallest accepted RSA modulus size in bits.
pub const MIN_RSA_BITS: usize = 512;

/// Largest RSA modulus size in bits accepted as a parameter.
pub const MAX_RSA_BITS: usize = 65536;

/// Largest modulus the RSA backend can generate and re-parse.
pub const BACKEND_MAX_RSA_BITS: usize = 4096;

/// Supported AES key strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AesKeySize {
    /// 128-bit key (16 bytes).
    Aes128,
    /// 192-bit key (24 bytes).
    Aes192,
    /// 256-bit key (32 bytes).
    #[default]
    Aes256,
}

impl AesKeySize {
    /// Key length in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Maps a key length in bytes to its AES variant.
    pub fn from_len(len: usize) -> Result<Self, CryptoError> {
        match len {
            16 => Ok(Self::Aes128),
            24 => Ok(Self::Aes192),
            32 => Ok(Self::Aes256),
            other => Err(CryptoError::InvalidKey(format!(
                "expected 16, 24 or 32 bytes, got {other}"
            ))),
        }
    }

    /// Maps a key strength in bits to its AES variant.
    pub fn from_bits(bits: usize) -> Result<Self, CryptoError> {
        match bits {
            128 => Ok(Self::Aes128),
            192 => Ok(Self::Aes192),
            256 => Ok(Self::Aes256),
            other => Err(CryptoError::InvalidParameter(format!(
                "AES key size must be 128, 192 or 256 bits, got {other}"
            ))),
        }
    }
}

/// An AES key with automatic zeroization.
///
/// The length is always one of 16, 24 or 32 bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

impl SymmetricKey {
    /// Generates a new random key of the default strength (AES-256).
    pub fn generate() -> Self {
        Self::generate_of(AesKeySize::default())
    }

    /// Generates a new random key of the given strength.
    pub fn generate_of(size: AesKeySize) -> Self {
        let key = generate_key_bytes(size.byte_len());
        Self {
            bytes: key.to_vec(),
        }
    }

    /// Creates a symmetric key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not 16, 24 or 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        AesKeySize::from_len(bytes.len())?;
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the AES variant matching this key.
    pub fn size(&self) -> AesKeySize {
        match self.bytes.len() {
            16 => AesKeySize::Aes128,
            24 => AesKeySize::Aes192,
            _ => AesKeySize::Aes256,
        }
    }

    /// Returns the raw key bytes.
    ///
    /// Use with caution - the returned slice is not zeroized automatically.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("size", &self.size())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An RSA key pair in DER form.
///
/// Both halves share the same modulus.
#[derive(Clone)]
pub struct RsaKeyPair {
    /// X.509 `SubjectPublicKeyInfo` encoding of the public key.
    pub public_key: Vec<u8>,
    /// PKCS#8 encoding of the private key.
    pub private_key: Zeroizing<Vec<u8>>,
    bits: usize,
}

impl RsaKeyPair {
    /// Modulus size in bits.
    pub fn key_bits(&self) -> usize {
        self.bits
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.bits)
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Generates a fresh AES key of the default strength.
pub fn generate_symmetric_key() -> SymmetricKey {
    SymmetricKey::generate()
}

/// Generates a fresh AES key of an explicit strength.
pub fn generate_symmetric_key_of(size: AesKeySize) -> SymmetricKey {
    SymmetricKey::generate_of(size)
}

/// Checks that `bits` is a multiple of 64 within `[512, 65536]`.
pub fn validate_rsa_bits(bits: usize) -> Result<(), CryptoError> {
    if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) || bits % 64 != 0 {
        return Err(CryptoError::InvalidParameter(format!(
            "RSA key size must be a multiple of 64 in [{MIN_RSA_BITS}, {MAX_RSA_BITS}], got {bits}"
        )));
    }
    Ok(())
}

/// Generates an RSA key pair with the requested modulus size.
///
/// # Errors
///
/// - `InvalidParameter` if `bits` is out of range or not a multiple of 64
/// - `UnsupportedAlgorithm` if the backend cannot produce a key of that size
pub fn generate_key_pair(bits: usize) -> Result<RsaKeyPair, CryptoError> {
    validate_rsa_bits(bits)?;

    if bits > BACKEND_MAX_RSA_BITS {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "RSA-{bits} exceeds the backend limit of {BACKEND_MAX_RSA_BITS} bits"
        )));
    }

    debug!(bits, "generating RSA key pair");

    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;

    let public_key = private
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?
        .as_bytes()
        .to_vec();

    let private_doc = private
        .to_pkcs8_der()
        .map_err(|e| CryptoError::UnsupportedAlgorithm(e.to_string()))?;

    Ok(RsaKeyPair {
        public_key,
        private_key: Zeroizing::new(private_doc.as_bytes().to_vec()),
        bits,
    })
}

/// Generates an RSA key pair of the default size (512 bits).
pub fn generate_default_key_pair() -> Result<RsaKeyPair, CryptoError> {
    generate_key_pair(DEFAULT_RSA_BITS)
}
