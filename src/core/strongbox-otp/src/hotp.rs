//! HMAC-based one-time password primitives (RFC 4226).
//!
//! `HOTP(K, C) = Truncate(HMAC(K, C)) mod 10^digits`

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::OtpError;

/// Smallest supported code length.
pub const MIN_DIGITS: u32 = 1;

/// Largest supported code length. `10^9` is the last power of ten below the
/// 31-bit truncated value range.
pub const MAX_DIGITS: u32 = 9;

/// HMAC hash function used to derive codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HmacAlgorithm {
    /// HMAC-SHA1, 20 byte digest.
    #[default]
    Sha1,
    /// HMAC-SHA256, 32 byte digest.
    Sha256,
    /// HMAC-SHA512, 64 byte digest.
    Sha512,
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

impl FromStr for HmacAlgorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(OtpError::InvalidParameter(format!(
                "unknown HMAC algorithm: {other}"
            ))),
        }
    }
}

/// Computes `HMAC(key, message)` with the chosen hash.
pub fn hmac(algorithm: HmacAlgorithm, key: &[u8], message: &[u8]) -> Result<Vec<u8>, OtpError> {
    fn compute<M>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, OtpError>
    where
        M: Mac + hmac::digest::KeyInit,
    {
        let mut mac = <M as Mac>::new_from_slice(key)
            .map_err(|e| OtpError::OperationFailed(e.to_string()))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    match algorithm {
        HmacAlgorithm::Sha1 => compute::<Hmac<Sha1>>(key, message),
        HmacAlgorithm::Sha256 => compute::<Hmac<Sha256>>(key, message),
        HmacAlgorithm::Sha512 => compute::<Hmac<Sha512>>(key, message),
    }
}

/// Dynamic truncation of an HMAC digest to a 31-bit integer.
///
/// The low nibble of the last byte selects a 4-byte window; the top bit of the
/// window is masked off so the value is never negative.
pub fn dynamic_truncate(digest: &[u8]) -> Result<u32, OtpError> {
    let last = digest
        .last()
        .ok_or_else(|| OtpError::OperationFailed("empty digest".to_string()))?;
    let offset = (last & 0x0F) as usize;

    let window = digest.get(offset..offset + 4).ok_or_else(|| {
        OtpError::OperationFailed(format!("digest of {} bytes is too short", digest.len()))
    })?;

    Ok(u32::from(window[0] & 0x7F) << 24
        | u32::from(window[1]) << 16
        | u32::from(window[2]) << 8
        | u32::from(window[3]))
}

/// Reduces a truncated value to `digits` decimal digits, left-padded with zeros.
pub fn format_code(value: u32, digits: u32) -> Result<String, OtpError> {
    validate_digits(digits)?;
    let code = value % 10u32.pow(digits);
    Ok(format!("{code:0width$}", width = digits as usize))
}

/// Checks that `digits` is within `[1, 9]`.
pub fn validate_digits(digits: u32) -> Result<(), OtpError> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(OtpError::InvalidParameter(format!(
            "digits must be in [{MIN_DIGITS}, {MAX_DIGITS}], got {digits}"
        )));
    }
    Ok(())
}

/// Derives a code from an arbitrary moving-factor message.
pub fn code_for_message(
    algorithm: HmacAlgorithm,
    secret: &[u8],
    message: &[u8],
    digits: u32,
) -> Result<String, OtpError> {
    let digest = hmac(algorithm, secret, message)?;
    format_code(dynamic_truncate(&digest)?, digits)
}

/// RFC 4226 HOTP with an 8-byte big-endian counter.
pub fn hotp(
    algorithm: HmacAlgorithm,
    secret: &[u8],
    counter: u64,
    digits: u32,
) -> Result<String, OtpError> {
    code_for_message(algorithm, secret, &counter.to_be_bytes(), digits)
}
