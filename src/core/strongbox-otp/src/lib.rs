//! # Strongbox OTP
//!
//! HOTP/TOTP one-time passwords with a backward skew window.
//!
//! ```text
//! T    = floor((now - epoch0) / step)
//! code = Truncate(HMAC(secret, T)) mod 10^digits
//! ```
//!
//! Verification accepts the current code and the code that was current
//! `skew` milliseconds earlier, which absorbs clock drift and entry latency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod hotp;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CounterEncoding, OtpConfig, OtpSettings};
pub use error::OtpError;
pub use generator::OtpGenerator;
pub use hotp::HmacAlgorithm;
