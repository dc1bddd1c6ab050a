//! Integration tests for Strongbox.
//!
//! These tests drive the crypto and OTP crates together the way an
//! application would: keys are generated, exchanged as DER/Base64, and used
//! across crate boundaries.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use strongbox_crypto::{asymmetric, symmetric, CipherMode, RsaKeyPair, SymmetricKey};
use strongbox_otp::{Clock, OtpConfig, OtpGenerator, OtpSettings};

// ============================================================================
// Envelope helpers
// ============================================================================

/// A payload sealed with a fresh AES key, the key itself RSA-encrypted.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Base64 RSA ciphertext of the AES key.
    pub wrapped_key: String,
    /// Base64 AES ciphertext of the payload.
    pub body: String,
}

/// Seals `plaintext` for the holder of the private half of `public_key`.
pub fn seal(public_key: &[u8], mode: CipherMode, plaintext: &str) -> Result<Envelope> {
    let key = SymmetricKey::generate();
    let wrapped = asymmetric::encrypt_by_public_key(key.as_bytes(), public_key)
        .context("Failed to wrap AES key")?;
    let body = symmetric::encode_with(mode, key.as_bytes(), plaintext)
        .context("Failed to encrypt body")?;

    Ok(Envelope {
        wrapped_key: BASE64.encode(wrapped),
        body,
    })
}

/// Opens an [`Envelope`] produced by [`seal`].
pub fn open(pair: &RsaKeyPair, mode: CipherMode, envelope: &Envelope) -> Result<String> {
    let wrapped = BASE64
        .decode(&envelope.wrapped_key)
        .context("Wrapped key is not Base64")?;
    let key = asymmetric::decrypt_by_private_key(&wrapped, &pair.private_key)
        .context("Failed to unwrap AES key")?;
    let text = symmetric::decode_with(mode, &key, &envelope.body)
        .context("Failed to decrypt body")?;
    Ok(text)
}

// ============================================================================
// Login helpers
// ============================================================================

/// A server-side OTP check shared by many users.
pub struct LoginGate<C: Clock> {
    otp: OtpGenerator<C>,
    suffix: String,
}

impl<C: Clock> LoginGate<C> {
    /// Creates a gate from a base secret, a per-deployment suffix and a clock.
    pub fn new(base_secret: &str, suffix: &str, settings: OtpSettings, clock: C) -> Result<Self> {
        let config = OtpConfig::new(base_secret, settings)?;
        Ok(Self {
            otp: OtpGenerator::with_clock(config, clock),
            suffix: suffix.to_string(),
        })
    }

    /// The code a user's authenticator would display right now.
    pub fn code_for(&self, user: &str) -> Result<String> {
        Ok(self.otp.for_identity(user, &self.suffix)?.generate()?)
    }

    /// Checks a submitted code.
    pub fn check(&self, user: &str, code: &str) -> Result<bool> {
        Ok(self.otp.verify_flexibly(user, &self.suffix, code)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, OnceLock};
    use std::thread;

    use strongbox_crypto::keys::{generate_default_key_pair, generate_key_pair};
    use strongbox_crypto::{AesKeySize, CryptoError};
    use strongbox_otp::{ManualClock, OtpError};

    fn key_pair() -> &'static RsaKeyPair {
        static PAIR: OnceLock<RsaKeyPair> = OnceLock::new();
        PAIR.get_or_init(|| generate_default_key_pair().unwrap())
    }

    #[test]
    fn test_envelope_roundtrip_each_mode() {
        let pair = key_pair();
        // A 32-byte AES key fits in a single 53-byte RSA block.
        for mode in [CipherMode::Cbc, CipherMode::Gcm, CipherMode::Ecb] {
            let envelope = seal(&pair.public_key, mode, "quarterly numbers").unwrap();
            assert_eq!(open(pair, mode, &envelope).unwrap(), "quarterly numbers");
        }
    }

    #[test]
    fn test_envelope_with_wrong_pair_fails() {
        let envelope = seal(&key_pair().public_key, CipherMode::Gcm, "hello").unwrap();
        let other = generate_key_pair(512).unwrap();
        assert!(open(&other, CipherMode::Gcm, &envelope).is_err());
    }

    #[test]
    fn test_rsa_signed_payload_spanning_blocks() {
        let pair = key_pair();
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        let sealed = asymmetric::encrypt_by_private_key(&payload, &pair.private_key).unwrap();
        assert_eq!(sealed.len() % (pair.key_bits() / 8), 0);

        let opened = asymmetric::decrypt_by_public_key(&sealed, &pair.public_key).unwrap();
        assert_eq!(opened.as_slice(), payload.as_slice());
    }

    #[test]
    fn test_rsa_keys_are_not_interchangeable() {
        let pair = key_pair();
        assert!(matches!(
            asymmetric::encrypt_by_public_key(b"x", &pair.private_key),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            asymmetric::encrypt_by_private_key(b"x", &pair.public_key),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_aes_key_sizes_across_modes() {
        for size in [AesKeySize::Aes128, AesKeySize::Aes192, AesKeySize::Aes256] {
            let key = SymmetricKey::generate_of(size);
            for mode in [CipherMode::Cbc, CipherMode::Gcm, CipherMode::Ecb] {
                let ct = symmetric::encrypt_with(mode, key.as_bytes(), b"payload").unwrap();
                let pt = symmetric::decrypt_with(mode, key.as_bytes(), &ct).unwrap();
                assert_eq!(pt.as_slice(), b"payload");
            }
        }
    }

    #[test]
    fn test_invalid_parameters_surface_typed_errors() {
        assert!(matches!(
            generate_key_pair(1000),
            Err(CryptoError::InvalidParameter(_))
        ));
        assert!(matches!(
            symmetric::encrypt(&[0u8; 7], b"x"),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            OtpConfig::with_step("secret", 0, 6),
            Err(OtpError::InvalidParameter(_))
        ));
        assert!(matches!(
            OtpConfig::with_step("secret", 30_000, 10),
            Err(OtpError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_login_accepts_code_within_skew() {
        let clock = ManualClock::new(1_700_000_000_000);
        let gate = LoginGate::new("base", "app", OtpSettings::default(), clock.clone()).unwrap();

        let code = gate.code_for("alice").unwrap();
        assert!(gate.check("alice", &code).unwrap());

        // Land just past the next step boundary, still inside the 5 s skew.
        let step = 30_000;
        let next_boundary = (1_700_000_000_000 / step + 1) * step;
        clock.set(next_boundary + 4_000);
        assert!(gate.check("alice", &code).unwrap());

        clock.set(next_boundary + 6_000);
        assert!(!gate.check("alice", &code).unwrap());
    }

    #[test]
    fn test_login_codes_are_per_user() {
        let clock = ManualClock::new(1_700_000_000_000);
        let gate = LoginGate::new("base", "app", OtpSettings::default(), clock).unwrap();

        let alice = gate.code_for("alice").unwrap();
        let bob = gate.code_for("bob").unwrap();
        assert!(gate.check("alice", &alice).unwrap());
        if alice != bob {
            assert!(!gate.check("bob", &alice).unwrap());
        }
    }

    #[test]
    fn test_login_blank_code_is_an_error() {
        let gate = LoginGate::new("base", "app", OtpSettings::default(), ManualClock::new(0))
            .unwrap();
        assert!(gate.check("alice", "").is_err());
        assert!(gate.check("alice", "   ").is_err());
    }

    #[test]
    fn test_login_gate_shared_across_threads() {
        let clock = ManualClock::new(1_700_000_000_000);
        let gate = Arc::new(LoginGate::new("base", "app", OtpSettings::default(), clock).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    let user = format!("user-{i}");
                    let code = gate.code_for(&user).unwrap();
                    gate.check(&user, &code).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
