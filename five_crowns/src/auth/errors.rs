//! Error surface of the auth layer.

use std::fmt;
use thiserror::Error;

/// Which unique signup column collided.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Username => "username",
            Self::Email => "e-mail address",
        };
        write!(f, "{repr}")
    }
}

/// Which single-use account token failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::EmailVerification => "verification",
            Self::PasswordReset => "password reset",
        };
        write!(f, "{repr}")
    }
}

/// What the auth layer can fail with.
///
/// Credential-shaped failures stay deliberately coarse: a caller learns
/// that authentication failed, not which half of the pair was wrong.
/// Signup rejections carry the reason so clients can surface it.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong username/password pair.
    #[error("authentication failed")]
    BadCredentials,

    /// A signup field was rejected before touching the database.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A unique signup column collided.
    #[error("that {0} is taken")]
    Taken(UniqueField),

    /// A single-use account token was unknown, spent, or past its expiry.
    #[error("{0} token is invalid or expired")]
    BadToken(TokenPurpose),

    /// The refresh token is unknown, already rotated away, or expired;
    /// the client needs a fresh login.
    #[error("session needs a fresh login")]
    StaleSession,

    /// A token verified but the account behind it no longer exists.
    #[error("account no longer exists")]
    AccountGone,

    /// The password hashing backend refused the input.
    #[error("password hashing failed")]
    Hashing,

    /// The session JWT could not be signed or decoded.
    #[error("session token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_name_their_purpose() {
        let err = AuthError::BadToken(TokenPurpose::PasswordReset);
        assert_eq!(err.to_string(), "password reset token is invalid or expired");
        let err = AuthError::Taken(UniqueField::Email);
        assert_eq!(err.to_string(), "that e-mail address is taken");
    }

    #[test]
    fn credential_failures_stay_coarse() {
        let err = AuthError::BadCredentials;
        assert!(!err.to_string().contains("password"));
        assert!(!err.to_string().contains("username"));
    }
}
