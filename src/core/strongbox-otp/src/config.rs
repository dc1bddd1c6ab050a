//! One-time password configuration.
//!
//! [`OtpSettings`] carries the non-secret knobs and can be deserialized from a
//! configuration file. [`OtpConfig`] binds those settings to a shared secret,
//! validates them once, and is immutable afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::OtpError;
use crate::hotp::{validate_digits, HmacAlgorithm};

/// Default time step in milliseconds.
pub const DEFAULT_STEP_MS: u64 = 30_000;

/// Default code length.
pub const DEFAULT_DIGITS: u32 = 6;

/// Default backward tolerance in milliseconds.
pub const DEFAULT_SKEW_MS: u64 = 5_000;

/// How the time-step counter is fed to the HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterEncoding {
    /// ASCII decimal digits of the counter, e.g. `"56666"`.
    #[default]
    Decimal,
    /// 8-byte big-endian integer, as in RFC 4226/6238 authenticator apps.
    BigEndian,
}

impl CounterEncoding {
    /// Encodes a counter value as the HMAC message.
    pub fn encode(self, counter: i64) -> Vec<u8> {
        match self {
            Self::Decimal => counter.to_string().into_bytes(),
            Self::BigEndian => counter.to_be_bytes().to_vec(),
        }
    }
}

impl fmt::Display for CounterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decimal => write!(f, "decimal"),
            Self::BigEndian => write!(f, "big-endian"),
        }
    }
}

impl FromStr for CounterEncoding {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "decimal" => Ok(Self::Decimal),
            "big-endian" | "big_endian" | "bigendian" => Ok(Self::BigEndian),
            other => Err(OtpError::InvalidParameter(format!(
                "unknown counter encoding: {other}"
            ))),
        }
    }
}

/// Non-secret OTP parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpSettings {
    /// Length of one time step in milliseconds. Must be non-zero.
    pub step_ms: u64,
    /// Number of decimal digits in a code, 1 to 9.
    pub digits: u32,
    /// Backward tolerance window in milliseconds.
    pub skew_ms: u64,
    /// Reference timestamp (Unix milliseconds) where step counting starts.
    pub epoch0_ms: i64,
    /// HMAC hash function.
    pub algorithm: HmacAlgorithm,
    /// Moving-factor encoding.
    pub encoding: CounterEncoding,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            step_ms: DEFAULT_STEP_MS,
            digits: DEFAULT_DIGITS,
            skew_ms: DEFAULT_SKEW_MS,
            epoch0_ms: 0,
            algorithm: HmacAlgorithm::default(),
            encoding: CounterEncoding::default(),
        }
    }
}

impl OtpSettings {
    /// Validates the settings.
    pub fn validate(&self) -> Result<(), OtpError> {
        if self.step_ms == 0 {
            return Err(OtpError::InvalidParameter("step cannot be 0".into()));
        }
        if self.step_ms > i64::MAX as u64 {
            return Err(OtpError::InvalidParameter("step is too large".into()));
        }
        if self.skew_ms > i64::MAX as u64 {
            return Err(OtpError::InvalidParameter("skew is too large".into()));
        }
        validate_digits(self.digits)
    }
}

/// Returns true if the input is empty or only ASCII whitespace.
pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Validated, immutable OTP configuration bound to a shared secret.
#[derive(Clone)]
pub struct OtpConfig {
    secret: Zeroizing<Vec<u8>>,
    settings: OtpSettings,
}

impl OtpConfig {
    /// Creates a configuration from a secret and explicit settings.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the secret is blank, `step_ms` is 0, or `digits`
    /// is outside `[1, 9]`.
    pub fn new(secret: impl AsRef<[u8]>, settings: OtpSettings) -> Result<Self, OtpError> {
        let secret = secret.as_ref();
        if is_blank(secret) {
            return Err(OtpError::InvalidParameter("secret cannot be blank".into()));
        }
        settings.validate()?;

        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            settings,
        })
    }

    /// Creates a configuration with the defaults: 30 s step, 6 digits,
    /// 5 s skew, epoch 0, HMAC-SHA1, decimal counter.
    pub fn with_defaults(secret: impl AsRef<[u8]>) -> Result<Self, OtpError> {
        Self::new(secret, OtpSettings::default())
    }

    /// Creates a configuration with a custom step and digit count.
    pub fn with_step(secret: impl AsRef<[u8]>, step_ms: u64, digits: u32) -> Result<Self, OtpError> {
        Self::new(
            secret,
            OtpSettings {
                step_ms,
                digits,
                ..OtpSettings::default()
            },
        )
    }

    /// Returns a configuration with the same settings and a different secret.
    pub(crate) fn with_secret(&self, secret: Vec<u8>) -> Result<Self, OtpError> {
        Self::new(Zeroizing::new(secret).as_slice(), self.settings.clone())
    }

    /// Shared secret bytes.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// Non-secret settings.
    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    /// Step length in milliseconds.
    pub fn step_ms(&self) -> u64 {
        self.settings.step_ms
    }

    /// Code length.
    pub fn digits(&self) -> u32 {
        self.settings.digits
    }

    /// Backward tolerance in milliseconds.
    pub fn skew_ms(&self) -> u64 {
        self.settings.skew_ms
    }

    /// Reference timestamp in milliseconds.
    pub fn epoch0_ms(&self) -> i64 {
        self.settings.epoch0_ms
    }
}

impl fmt::Debug for OtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpConfig")
            .field("secret", &"[REDACTED]")
            .field("settings", &self.settings)
            .finish()
    }
}
