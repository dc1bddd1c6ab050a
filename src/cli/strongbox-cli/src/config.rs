//! Configuration file handling.
//!
//! The file is read once at start-up and the resulting [`Config`] value is
//! passed to each command. Flags given on the command line take precedence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strongbox_crypto::keys::DEFAULT_RSA_BITS;
use strongbox_crypto::CipherMode;
use strongbox_otp::OtpSettings;

/// Location used when no `--config` flag or `STRONGBOX_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/strongbox.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aes: AesSection,
    pub rsa: RsaSection,
    pub otp: OtpSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AesSection {
    /// One of `cbc`, `gcm`, `ecb`.
    pub mode: String,
    /// Key strength used by `aes keygen`.
    pub bits: usize,
}

impl Default for AesSection {
    fn default() -> Self {
        Self {
            mode: CipherMode::default().to_string(),
            bits: 256,
        }
    }
}

impl AesSection {
    pub fn cipher_mode(&self) -> Result<CipherMode> {
        self.mode
            .parse()
            .with_context(|| format!("invalid [aes] mode in config: {}", self.mode))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsaSection {
    /// Modulus size used by `rsa keygen`.
    pub bits: usize,
}

impl Default for RsaSection {
    fn default() -> Self {
        Self {
            bits: DEFAULT_RSA_BITS,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the default path is tried and
    /// built-in defaults are used if it is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    tracing::debug!("No config at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        config
            .otp
            .validate()
            .with_context(|| format!("Invalid [otp] section in {}", path.display()))?;
        config.aes.cipher_mode()?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
