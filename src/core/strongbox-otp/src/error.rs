//! One-time password error types.

use thiserror::Error;

/// Errors that can occur while configuring or computing one-time passwords.
#[derive(Debug, Error)]
pub enum OtpError {
    /// A configuration value or input is out of range or blank.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The HMAC primitive could not be initialized.
    #[error("otp operation failed: {0}")]
    OperationFailed(String),
}
