use thiserror::Error;

/// Errors from the pure auth building blocks.
///
/// Signature-verification failures are deliberately *not* represented here:
/// a cookie that fails to verify is a routine outcome and surfaces as
/// `None` from [`crate::token::verify`], never as an error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The system CSPRNG could not produce bytes.
    #[error("random generator unavailable: {0}")]
    Rng(String),

    /// The account response carried no usable identifier.
    #[error("account response carries no usable identifier")]
    Profile,
}
