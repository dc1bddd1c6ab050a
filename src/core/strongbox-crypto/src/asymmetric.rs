//! RSA encryption with block chunking.
//!
//! PKCS#1 v1.5 padding limits a single RSA operation to `k - 11` bytes of
//! input, where `k` is the modulus length in bytes, and always produces `k`
//! bytes of output. Longer payloads are split into `k - 11` byte chunks that
//! are encrypted independently and concatenated; decryption walks the
//! ciphertext in `k` byte blocks.
//!
//! Both key directions are supported:
//! - public-key encryption / private-key decryption (confidentiality)
//! - private-key encryption / public-key decryption (signature-style, block type 1)
//!
//! Chunked RSA has no bulk throughput and is meant for small payloads such as
//! keys and tokens. Inputs above [`ADVISORY_PAYLOAD_LIMIT`] log a warning;
//! inputs above [`MAX_PAYLOAD`] are rejected. Use AES (see `symmetric`) for
//! anything larger and encrypt only the AES key with RSA.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Bytes of PKCS#1 v1.5 padding overhead per block.
pub const PADDING_OVERHEAD: usize = 11;

/// Payload size above which a hybrid scheme is recommended.
pub const ADVISORY_PAYLOAD_LIMIT: usize = 4 * 1024;

/// Largest payload accepted for chunked encryption.
pub const MAX_PAYLOAD: usize = 1024 * 1024;

/// Minimum number of 0xFF padding bytes in a type 1 block.
const MIN_PADDING_STRING: usize = 8;

/// Plaintext bytes carried by one encrypted block.
pub fn encode_block_size(key_size_bytes: usize) -> usize {
    key_size_bytes.saturating_sub(PADDING_OVERHEAD)
}

/// Ciphertext bytes consumed by one decrypted block.
pub fn decode_block_size(key_size_bytes: usize) -> usize {
    key_size_bytes
}

/// Largest ciphertext that [`MAX_PAYLOAD`] bytes of plaintext encrypt to.
pub fn max_ciphertext_len(key_size_bytes: usize) -> usize {
    match encode_block_size(key_size_bytes) {
        0 => 0,
        block => MAX_PAYLOAD.div_ceil(block) * decode_block_size(key_size_bytes),
    }
}

/// Encrypts with a PKCS#8 private key (block type 1 padding).
///
/// The result can be decrypted by anyone holding the public key.
pub fn encrypt_by_private_key(data: &[u8], private_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = parse_private_key(private_key)?;
    encrypt_blocks(data, key.size(), |chunk| {
        key.sign(Pkcs1v15Sign::new_unprefixed(), chunk)
            .map_err(|e| CryptoError::OperationFailed(e.to_string()))
    })
}

/// Encrypts with an X.509 public key (block type 2 padding).
pub fn encrypt_by_public_key(data: &[u8], public_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let key = parse_public_key(public_key)?;
    encrypt_blocks(data, key.size(), |chunk| {
        key.encrypt(&mut OsRng, Pkcs1v15Encrypt, chunk)
            .map_err(|e| CryptoError::OperationFailed(e.to_string()))
    })
}

/// Decrypts data produced by [`encrypt_by_public_key`].
pub fn decrypt_by_private_key(
    data: &[u8],
    private_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = parse_private_key(private_key)?;
    decrypt_blocks(data, key.size(), |block| {
        key.decrypt(Pkcs1v15Encrypt, block)
            .map_err(|_| CryptoError::OperationFailed("padding check failed".to_string()))
    })
}

/// Decrypts data produced by [`encrypt_by_private_key`].
pub fn decrypt_by_public_key(
    data: &[u8],
    public_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = parse_public_key(public_key)?;
    decrypt_blocks(data, key.size(), |block| recover_signed_block(&key, block))
}

fn parse_private_key(der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| CryptoError::InvalidKey(format!("malformed PKCS#8 private key: {e}")))
}

fn parse_public_key(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::InvalidKey(format!("malformed X.509 public key: {e}")))
}

fn check_payload_size(len: usize) -> Result<(), CryptoError> {
    if len > MAX_PAYLOAD {
        return Err(CryptoError::InvalidParameter(format!(
            "payload of {len} bytes exceeds the {MAX_PAYLOAD} byte limit for chunked RSA; \
             encrypt the data with AES and the AES key with RSA"
        )));
    }
    if len > ADVISORY_PAYLOAD_LIMIT {
        warn!(
            len,
            limit = ADVISORY_PAYLOAD_LIMIT,
            "large payload for chunked RSA; hybrid encryption is recommended"
        );
    }
    Ok(())
}

fn encrypt_blocks<F>(data: &[u8], key_size: usize, mut seal: F) -> Result<Vec<u8>, CryptoError>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>, CryptoError>,
{
    check_payload_size(data.len())?;

    let block = encode_block_size(key_size);
    if block == 0 {
        return Err(CryptoError::InvalidKey(format!(
            "modulus of {key_size} bytes is too small for PKCS#1 v1.5"
        )));
    }

    let chunks = data.len().div_ceil(block);
    debug!(len = data.len(), block, chunks, "rsa chunked encrypt");

    let mut out = Vec::with_capacity(chunks * key_size);
    for chunk in data.chunks(block) {
        let sealed = seal(chunk)?;
        if sealed.len() != key_size {
            return Err(CryptoError::OperationFailed(format!(
                "block encrypted to {} bytes, expected {key_size}",
                sealed.len()
            )));
        }
        out.extend_from_slice(&sealed);
    }
    Ok(out)
}

fn decrypt_blocks<F>(
    data: &[u8],
    key_size: usize,
    mut open: F,
) -> Result<Zeroizing<Vec<u8>>, CryptoError>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>, CryptoError>,
{
    if encode_block_size(key_size) == 0 {
        return Err(CryptoError::InvalidKey(format!(
            "modulus of {key_size} bytes is too small for PKCS#1 v1.5"
        )));
    }

    let block = decode_block_size(key_size);
    if data.len() % block != 0 {
        return Err(CryptoError::OperationFailed(format!(
            "ciphertext length {} is not a multiple of the {block} byte block size",
            data.len()
        )));
    }

    let limit = max_ciphertext_len(key_size);
    if data.len() > limit {
        return Err(CryptoError::OperationFailed(format!(
            "ciphertext of {} bytes is longer than any {MAX_PAYLOAD} byte payload encrypts to ({limit})",
            data.len()
        )));
    }

    debug!(len = data.len(), block, chunks = data.len() / block, "rsa chunked decrypt");

    let mut out = Zeroizing::new(Vec::with_capacity(data.len()));
    for chunk in data.chunks(block) {
        let opened = Zeroizing::new(open(chunk)?);
        out.extend_from_slice(&opened);
    }
    Ok(out)
}

/// Applies the public exponent and strips block type 1 padding:
/// `0x00 || 0x01 || 0xFF.. (>= 8) || 0x00 || message`.
fn recover_signed_block(key: &RsaPublicKey, block: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let k = key.size();
    let c = BigUint::from_bytes_be(block);
    if &c >= key.n() {
        return Err(CryptoError::OperationFailed(
            "ciphertext block out of range for modulus".to_string(),
        ));
    }

    let m = c.modpow(key.e(), key.n()).to_bytes_be();
    if m.len() > k {
        return Err(CryptoError::OperationFailed("decryption error".to_string()));
    }
    let mut em = vec![0u8; k - m.len()];
    em.extend_from_slice(&m);

    let invalid = || CryptoError::OperationFailed("padding check failed".to_string());

    if em.len() < PADDING_OVERHEAD || em[0] != 0x00 || em[1] != 0x01 {
        return Err(invalid());
    }
    let padding_len = em[2..].iter().take_while(|&&b| b == 0xFF).count();
    let separator = 2 + padding_len;
    if padding_len < MIN_PADDING_STRING || em.get(separator) != Some(&0x00) {
        return Err(invalid());
    }

    Ok(em[separator + 1..].to_vec())
}
