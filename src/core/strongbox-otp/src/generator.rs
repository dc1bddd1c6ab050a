//! Time-based one-time password generator (RFC 6238 style).
//!
//! `T = floor((now - epoch0) / step)`, `TOTP = HOTP(K, T)`.
//!
//! A generator holds an immutable [`OtpConfig`] and a [`Clock`]. It can be
//! shared across threads and queried any number of times; two calls within the
//! same time step return the same code.

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::{is_blank, OtpConfig};
use crate::error::OtpError;
use crate::hotp::code_for_message;

/// TOTP generator bound to one configuration.
#[derive(Debug, Clone)]
pub struct OtpGenerator<C = SystemClock> {
    config: OtpConfig,
    clock: C,
}

impl OtpGenerator<SystemClock> {
    /// Creates a generator reading the system wall clock.
    pub fn new(config: OtpConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Creates a generator from a secret with the default settings.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, OtpError> {
        Ok(Self::new(OtpConfig::with_defaults(secret)?))
    }
}

impl<C: Clock> OtpGenerator<C> {
    /// Creates a generator reading time from `clock`.
    pub fn with_clock(config: OtpConfig, clock: C) -> Self {
        Self { config, clock }
    }

    /// The configuration this generator was built with.
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Number of whole steps between `epoch0` and `target_millis`, rounded
    /// towards negative infinity and saturated to the `i64` range.
    pub fn time_factor(&self, target_millis: i64) -> i64 {
        let elapsed = i128::from(target_millis) - i128::from(self.config.epoch0_ms());
        let step = i128::from(self.config.step_ms());
        let steps = elapsed.div_euclid(step);
        i64::try_from(steps).unwrap_or(if steps < 0 { i64::MIN } else { i64::MAX })
    }

    /// Code for the current time.
    pub fn generate(&self) -> Result<String, OtpError> {
        self.generate_at(self.clock.now_millis())
    }

    /// Code for the time step containing `millis`.
    pub fn generate_at(&self, millis: i64) -> Result<String, OtpError> {
        self.code_for_counter(self.time_factor(millis))
    }

    /// Code that was current `skew` milliseconds ago.
    pub fn generate_flexibly(&self) -> Result<String, OtpError> {
        self.generate_flexibly_at(self.clock.now_millis())
    }

    /// Code that was current `skew` milliseconds before `millis`.
    pub fn generate_flexibly_at(&self, millis: i64) -> Result<String, OtpError> {
        self.generate_at(millis.saturating_sub(self.skew_millis()))
    }

    /// Code for an explicit counter value, bypassing the clock.
    pub fn code_for_counter(&self, counter: i64) -> Result<String, OtpError> {
        let settings = self.config.settings();
        let message = settings.encoding.encode(counter);
        code_for_message(
            settings.algorithm,
            self.config.secret(),
            &message,
            settings.digits,
        )
    }

    /// Derives the generator for one identity.
    ///
    /// The derived secret is the plain concatenation
    /// `base_secret || identity || secret_suffix`. This is not a key
    /// derivation function; it is kept as-is because existing codes depend on
    /// it.
    pub fn for_identity(
        &self,
        identity: &str,
        secret_suffix: &str,
    ) -> Result<OtpGenerator<&C>, OtpError> {
        let base = self.config.secret();
        let mut secret = Vec::with_capacity(base.len() + identity.len() + secret_suffix.len());
        secret.extend_from_slice(base);
        secret.extend_from_slice(identity.as_bytes());
        secret.extend_from_slice(secret_suffix.as_bytes());

        Ok(OtpGenerator {
            config: self.config.with_secret(secret)?,
            clock: &self.clock,
        })
    }

    /// Verifies a code for an identity at the current time.
    ///
    /// Accepts the code if it matches either the current code or the code from
    /// `skew` milliseconds ago, computed with the per-identity secret (see
    /// [`for_identity`](Self::for_identity)).
    ///
    /// The window is measured in time steps, not from the moment a code was
    /// produced. A code from [`generate_flexibly`](Self::generate_flexibly)
    /// belongs to the step containing `t - skew`; once verification time
    /// passes the start of the next step plus `skew`, neither candidate is
    /// that step and the code is rejected, even if less than `skew` has
    /// elapsed since it was generated.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `code` is blank. Every other failure, including
    /// HMAC errors, yields `Ok(false)`.
    pub fn verify_flexibly(
        &self,
        identity: &str,
        secret_suffix: &str,
        code: &str,
    ) -> Result<bool, OtpError> {
        self.verify_flexibly_at(identity, secret_suffix, code, self.clock.now_millis())
    }

    /// Verifies a code for an identity as of `millis`.
    pub fn verify_flexibly_at(
        &self,
        identity: &str,
        secret_suffix: &str,
        code: &str,
        millis: i64,
    ) -> Result<bool, OtpError> {
        if is_blank(code.as_bytes()) {
            return Err(OtpError::InvalidParameter("code cannot be blank".into()));
        }

        let Ok(derived) = self.for_identity(identity, secret_suffix) else {
            debug!("otp verification rejected");
            return Ok(false);
        };

        let (Ok(flexible), Ok(current)) = (
            derived.generate_flexibly_at(millis),
            derived.generate_at(millis),
        ) else {
            debug!("otp verification rejected");
            return Ok(false);
        };

        let candidate = code.as_bytes();
        let accepted = flexible.as_bytes().ct_eq(candidate) | current.as_bytes().ct_eq(candidate);
        let accepted = bool::from(accepted);

        if !accepted {
            debug!("otp verification rejected");
        }
        Ok(accepted)
    }

    fn skew_millis(&self) -> i64 {
        i64::try_from(self.config.skew_ms()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CounterEncoding, OtpSettings};
    use crate::hotp::HmacAlgorithm;

    fn generator_at(millis: i64) -> (OtpGenerator<ManualClock>, ManualClock) {
        let clock = ManualClock::new(millis);
        let config = OtpConfig::with_defaults("base-secret").unwrap();
        (OtpGenerator::with_clock(config, clock.clone()), clock)
    }

    fn rfc6238(secret: &str, algorithm: HmacAlgorithm) -> OtpGenerator {
        let settings = OtpSettings {
            digits: 8,
            algorithm,
            encoding: CounterEncoding::BigEndian,
            ..OtpSettings::default()
        };
        OtpGenerator::new(OtpConfig::new(secret, settings).unwrap())
    }

    #[test]
    fn test_time_factor_floor() {
        let (otp, _) = generator_at(0);
        assert_eq!(otp.time_factor(0), 0);
        assert_eq!(otp.time_factor(29_999), 0);
        assert_eq!(otp.time_factor(30_000), 1);
        assert_eq!(otp.time_factor(-1), -1);
    }

    #[test]
    fn test_time_factor_honors_epoch0() {
        let settings = OtpSettings {
            epoch0_ms: 1_000_000,
            ..OtpSettings::default()
        };
        let otp = OtpGenerator::new(OtpConfig::new("secret", settings).unwrap());
        assert_eq!(otp.time_factor(1_000_000), 0);
        assert_eq!(otp.time_factor(1_059_999), 1);
    }

    #[test]
    fn test_decimal_counter_matches_manual_hmac() {
        let (otp, _) = generator_at(95_000);
        let expected = code_for_message(HmacAlgorithm::Sha1, b"base-secret", b"3", 6).unwrap();
        assert_eq!(otp.generate().unwrap(), expected);
    }

    #[test]
    fn test_generate_is_stable_within_step() {
        let (otp, clock) = generator_at(60_000);
        let first = otp.generate().unwrap();

        clock.set(89_999);
        assert_eq!(otp.generate().unwrap(), first);
    }

    #[test]
    fn test_generate_changes_across_steps() {
        let (otp, _) = generator_at(0);
        let codes: Vec<String> = (0..5)
            .map(|step| otp.generate_at(step * 30_000).unwrap())
            .collect();

        let distinct: std::collections::HashSet<_> = codes.iter().collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_output_length_equals_digits() {
        for digits in 1..=9 {
            let config = OtpConfig::with_step("length-check", 30_000, digits).unwrap();
            let otp = OtpGenerator::with_clock(config, ManualClock::new(0));
            for t in [0, 31_000, 1_234_567_890_000] {
                assert_eq!(otp.generate_at(t).unwrap().len(), digits as usize);
                assert_eq!(otp.generate_flexibly_at(t).unwrap().len(), digits as usize);
                assert!(otp.generate_at(t).unwrap().bytes().all(|b| b.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn test_generate_flexibly_looks_back_by_skew() {
        let (otp, _) = generator_at(0);
        assert_eq!(
            otp.generate_flexibly_at(32_000).unwrap(),
            otp.generate_at(27_000).unwrap()
        );
    }

    #[test]
    fn test_rfc6238_sha1_vectors() {
        let otp = rfc6238("12345678901234567890", HmacAlgorithm::Sha1);
        let vectors = [
            (59_000, "94287082"),
            (1_111_111_109_000, "07081804"),
            (1_111_111_111_000, "14050471"),
            (1_234_567_890_000, "89005924"),
            (2_000_000_000_000, "69279037"),
        ];
        for (millis, code) in vectors {
            assert_eq!(otp.generate_at(millis).unwrap(), code, "at {millis}");
        }
    }

    #[test]
    fn test_rfc6238_sha256_and_sha512_vectors() {
        let sha256 = rfc6238("12345678901234567890123456789012", HmacAlgorithm::Sha256);
        assert_eq!(sha256.generate_at(59_000).unwrap(), "46119246");

        let sha512 = rfc6238(
            "1234567890123456789012345678901234567890123456789012345678901234",
            HmacAlgorithm::Sha512,
        );
        assert_eq!(sha512.generate_at(59_000).unwrap(), "90693936");
    }

    #[test]
    fn test_verify_accepts_flexible_code_within_skew() {
        let (otp, _) = generator_at(0);
        let derived = otp.for_identity("alice", "login").unwrap();
        let code = derived.generate_flexibly_at(10_000).unwrap();

        for verify_at in [10_000, 12_500, 14_999] {
            assert!(otp.verify_flexibly_at("alice", "login", &code, verify_at).unwrap());
        }
    }

    #[test]
    fn test_verify_flexible_code_window_ends_at_step_boundary() {
        let (otp, _) = generator_at(0);
        let derived = otp.for_identity("alice", "login").unwrap();

        // t - skew = 29_999 lies in step 0.
        let code = derived.generate_flexibly_at(34_999).unwrap();
        assert_eq!(code, derived.code_for_counter(0).unwrap());
        assert!(otp.verify_flexibly_at("alice", "login", &code, 34_999).unwrap());

        // At 35_000 both candidates are step 1.
        if code != derived.code_for_counter(1).unwrap() {
            assert!(!otp.verify_flexibly_at("alice", "login", &code, 35_000).unwrap());
        }
    }

    #[test]
    fn test_time_factor_saturates() {
        let at_min = OtpSettings {
            step_ms: 1,
            epoch0_ms: i64::MIN,
            ..OtpSettings::default()
        };
        let otp = OtpGenerator::new(OtpConfig::new("secret", at_min).unwrap());
        assert_eq!(otp.time_factor(i64::MAX), i64::MAX);
        assert_eq!(otp.time_factor(i64::MIN), 0);

        let at_max = OtpSettings {
            step_ms: 1,
            epoch0_ms: i64::MAX,
            ..OtpSettings::default()
        };
        let otp = OtpGenerator::new(OtpConfig::new("secret", at_max).unwrap());
        assert_eq!(otp.time_factor(i64::MIN), i64::MIN);
        assert_eq!(otp.generate_at(i64::MIN).unwrap().len(), 6);
    }

    #[test]
    fn test_verify_accepts_current_code() {
        let (otp, clock) = generator_at(123_456);
        let code = otp.for_identity("bob", "2fa").unwrap().generate().unwrap();
        assert!(otp.verify_flexibly("bob", "2fa", &code).unwrap());

        clock.advance(1_000);
        assert!(otp.verify_flexibly("bob", "2fa", &code).unwrap());
    }

    #[test]
    fn test_verify_rejects_after_windows_pass() {
        let (otp, _) = generator_at(0);
        let code = otp
            .for_identity("alice", "login")
            .unwrap()
            .generate_flexibly_at(10_000)
            .unwrap();

        assert!(!otp.verify_flexibly_at("alice", "login", &code, 70_000).unwrap());
    }

    #[test]
    fn test_verify_rejects_other_identity_or_suffix() {
        let (otp, _) = generator_at(0);
        let code = otp.for_identity("alice", "login").unwrap().generate_at(1_000).unwrap();

        // "alic" + "elogin" concatenates to the same derived secret.
        assert!(otp.verify_flexibly_at("alic", "elogin", &code, 1_000).unwrap());
        let other = otp.for_identity("mallory", "login").unwrap().generate_at(1_000).unwrap();
        if other != code {
            assert!(!otp.verify_flexibly_at("mallory", "login", &code, 1_000).unwrap());
        }
    }

    #[test]
    fn test_verify_rejects_malformed_code() {
        let (otp, _) = generator_at(0);
        for code in ["12345", "1234567", "abcdef", "12 456"] {
            assert!(!otp.verify_flexibly_at("alice", "login", code, 0).unwrap());
        }
    }

    #[test]
    fn test_verify_blank_code_is_invalid_parameter() {
        let (otp, _) = generator_at(0);
        for code in ["", "   "] {
            let result = otp.verify_flexibly("alice", "login", code);
            assert!(matches!(result, Err(OtpError::InvalidParameter(_))));
        }
    }

    #[test]
    fn test_concurrent_generate_same_window() {
        let (otp, _) = generator_at(45_000);
        let codes: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| otp.generate().unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(codes.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_from_secret_uses_system_clock() {
        let otp = OtpGenerator::from_secret("system").unwrap();
        assert_eq!(otp.generate().unwrap().len(), 6);
        assert!(OtpGenerator::from_secret("").is_err());
    }
}
