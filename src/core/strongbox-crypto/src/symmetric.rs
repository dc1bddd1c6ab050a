//! AES symmetric encryption.
//!
//! Keys are raw 16, 24 or 32 byte AES keys. Three modes are available:
//!
//! | Mode | Framing | Notes |
//! |------|---------|-------|
//! | `Cbc` (default) | `iv (16) \|\| ciphertext` | PKCS#7 padding, fresh random IV per call |
//! | `Gcm` | `nonce (12) \|\| ciphertext \|\| tag (16)` | authenticated |
//! | `Ecb` | `ciphertext` | PKCS#7 padding, legacy only |
//!
//! ECB encrypts identical plaintext blocks to identical ciphertext blocks and
//! leaks message structure. It exists to read and write data produced by the
//! legacy raw `AES` utility and should not be chosen for new data.
//!
//! String helpers (`encode`/`decode`) wrap the byte operations with standard
//! Base64 (with padding).

use std::fmt;
use std::str::FromStr;

use aes::cipher::{
    block_padding::Pkcs7, BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::Aead;
use aes_gcm::AesGcm;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::AesKeySize;
use crate::random::{generate_iv, generate_nonce};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of a CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Size of a GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Block cipher mode used for AES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CipherMode {
    /// Electronic codebook. Weak, kept for legacy interoperability.
    Ecb,
    /// Cipher block chaining with an explicit random IV prefix.
    #[default]
    Cbc,
    /// Galois/counter mode with an explicit random nonce prefix.
    Gcm,
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ecb => write!(f, "ecb"),
            Self::Cbc => write!(f, "cbc"),
            Self::Gcm => write!(f, "gcm"),
        }
    }
}

impl FromStr for CipherMode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecb" => Ok(Self::Ecb),
            "cbc" => Ok(Self::Cbc),
            "gcm" => Ok(Self::Gcm),
            other => Err(CryptoError::UnsupportedAlgorithm(format!(
                "unknown AES mode: {other}"
            ))),
        }
    }
}

macro_rules! with_aes {
    ($size:expr, $func:ident ( $($arg:expr),* )) => {
        match $size {
            AesKeySize::Aes128 => $func::<Aes128>($($arg),*),
            AesKeySize::Aes192 => $func::<Aes192>($($arg),*),
            AesKeySize::Aes256 => $func::<Aes256>($($arg),*),
        }
    };
}

/// Encrypts bytes with the default mode (CBC).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt_with(CipherMode::default(), key, plaintext)
}

/// Decrypts bytes produced by [`encrypt`].
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    decrypt_with(CipherMode::default(), key, ciphertext)
}

/// Encrypts bytes with an explicit mode.
///
/// # Arguments
///
/// * `mode` - Block cipher mode
/// * `key` - 16, 24 or 32 byte AES key
/// * `plaintext` - Data to encrypt
///
/// # Returns
///
/// Ciphertext framed as described in the module documentation.
pub fn encrypt_with(
    mode: CipherMode,
    key: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let size = AesKeySize::from_len(key.len())?;
    debug!(%mode, ?size, len = plaintext.len(), "aes encrypt");

    match mode {
        CipherMode::Ecb => {
            warn!("AES-ECB leaks repeated plaintext blocks; use CBC or GCM for new data");
            with_aes!(size, ecb_encrypt(key, plaintext))
        }
        CipherMode::Cbc => {
            let iv = generate_iv();
            let body = with_aes!(size, cbc_encrypt(key, &iv, plaintext))?;

            let mut result = Vec::with_capacity(IV_SIZE + body.len());
            result.extend_from_slice(&iv);
            result.extend_from_slice(&body);
            Ok(result)
        }
        CipherMode::Gcm => with_aes!(size, gcm_encrypt(key, plaintext)),
    }
}

/// Decrypts bytes with an explicit mode.
///
/// The ciphertext must carry the framing produced by [`encrypt_with`] for the
/// same mode.
///
/// # Returns
///
/// Decrypted plaintext wrapped in `Zeroizing` for automatic memory cleanup.
pub fn decrypt_with(
    mode: CipherMode,
    key: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let size = AesKeySize::from_len(key.len())?;
    debug!(%mode, ?size, len = ciphertext.len(), "aes decrypt");

    let plaintext = match mode {
        CipherMode::Ecb => {
            check_block_aligned(ciphertext)?;
            with_aes!(size, ecb_decrypt(key, ciphertext))?
        }
        CipherMode::Cbc => {
            if ciphertext.len() < IV_SIZE + BLOCK_SIZE {
                return Err(CryptoError::OperationFailed(
                    "ciphertext too short".to_string(),
                ));
            }
            let (iv, body) = ciphertext.split_at(IV_SIZE);
            check_block_aligned(body)?;
            with_aes!(size, cbc_decrypt(key, iv, body))?
        }
        CipherMode::Gcm => {
            if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
                return Err(CryptoError::OperationFailed(
                    "ciphertext too short".to_string(),
                ));
            }
            with_aes!(size, gcm_decrypt(key, ciphertext))?
        }
    };

    Ok(Zeroizing::new(plaintext))
}

/// Encrypts a string with the default mode and returns Base64 text.
pub fn encode(key: &[u8], plaintext: &str) -> Result<String, CryptoError> {
    encode_with(CipherMode::default(), key, plaintext)
}

/// Decrypts Base64 text produced by [`encode`].
pub fn decode(key: &[u8], ciphertext: &str) -> Result<String, CryptoError> {
    decode_with(CipherMode::default(), key, ciphertext)
}

/// Encrypts a string with an explicit mode and returns Base64 text.
pub fn encode_with(mode: CipherMode, key: &[u8], plaintext: &str) -> Result<String, CryptoError> {
    let ciphertext = encrypt_with(mode, key, plaintext.as_bytes())?;
    Ok(BASE64.encode(ciphertext))
}

/// Decrypts Base64 text with an explicit mode.
///
/// # Errors
///
/// `OperationFailed` if the input is not valid Base64 or the recovered
/// plaintext is not UTF-8.
pub fn decode_with(mode: CipherMode, key: &[u8], ciphertext: &str) -> Result<String, CryptoError> {
    AesKeySize::from_len(key.len())?;

    let raw = BASE64
        .decode(ciphertext.trim())
        .map_err(|e| CryptoError::OperationFailed(format!("invalid base64: {e}")))?;
    let plaintext = decrypt_with(mode, key, &raw)?;

    String::from_utf8(plaintext.to_vec())
        .map_err(|_| CryptoError::OperationFailed("plaintext is not valid UTF-8".to_string()))
}

fn check_block_aligned(data: &[u8]) -> Result<(), CryptoError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::OperationFailed(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            data.len()
        )));
    }
    Ok(())
}

fn ecb_encrypt<C>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = ecb::Encryptor::<C>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn ecb_decrypt<C>(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = ecb::Decryptor::<C>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::OperationFailed("invalid padding".to_string()))
}

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let encryptor = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let decryptor = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::OperationFailed("invalid padding".to_string()))
}

fn gcm_encrypt<C>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    AesGcm<C, U12>: Aead + KeyInit,
{
    let cipher = AesGcm::<C, U12>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::OperationFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn gcm_decrypt<C>(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    AesGcm<C, U12>: Aead + KeyInit,
{
    let cipher = AesGcm::<C, U12>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
    cipher
        .decrypt(GenericArray::from_slice(nonce), body)
        .map_err(|_| CryptoError::OperationFailed("authentication failed".to_string()))
}
