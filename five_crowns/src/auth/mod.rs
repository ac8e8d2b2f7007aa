//! Authentication module providing signup, login, and session management.
//!
//! This module implements the auth surface the hub and REST facade rely on:
//! - Argon2id password hashing
//! - Signed session tokens (default 7-day expiry)
//! - Rotating refresh tokens
//! - E-mail verification and password reset tokens (delivery is external)
//! - Media-room token minting, signed with a separate key

pub mod errors;
pub mod manager;
pub mod media;
pub mod models;

pub use errors::{AuthError, AuthResult, TokenPurpose, UniqueField};
pub use manager::AuthManager;
pub use media::{MediaConfig, MediaTokenMinter};
pub use models::{
    LoginRequest, PasswordResetConfirm, SessionClaims, SessionTokens, SignupRequest, User, UserId,
};
