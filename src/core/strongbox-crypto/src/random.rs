//! Cryptographically secure random generation.
//!
//! Every helper draws from the operating system CSPRNG through `OsRng`, which
//! holds no state of its own and is safe to call from any number of threads.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

use crate::symmetric::{IV_SIZE, NONCE_SIZE};

/// Fills a buffer of `len` bytes with key material.
///
/// The buffer is wrapped in `Zeroizing` so it is cleared when dropped.
pub fn generate_key_bytes(len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(&mut key);
    key
}

/// Generates a random 16-byte IV for AES-CBC.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Generates a random 12-byte nonce for AES-GCM.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generates cryptographically secure random bytes.
///
/// # Arguments
///
/// * `len` - Number of random bytes to generate
pub fn generate_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generates a random token as a lowercase hex string.
///
/// Suitable as a shared OTP secret.
///
/// # Arguments
///
/// * `byte_len` - Number of random bytes (output string will be 2x this length)
pub fn generate_token(byte_len: usize) -> String {
    hex::encode(generate_bytes(byte_len))
}
