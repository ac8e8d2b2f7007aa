//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult, TokenPurpose, UniqueField},
    models::{SessionClaims, SessionTokens, User, UserId},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// How long a password reset token stays valid.
const RESET_TOKEN_TTL_HOURS: i64 = 2;

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    pool: PgPool,
    session_secret: String,
    session_duration: Duration,
    refresh_duration: Duration,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `session_secret` - Secret key for session token signing
    /// * `session_ttl_days` - Lifetime of a session token
    pub fn new(pool: PgPool, session_secret: String, session_ttl_days: i64) -> Self {
        Self {
            pool,
            session_secret,
            session_duration: Duration::days(session_ttl_days),
            refresh_duration: Duration::days(session_ttl_days * 4),
        }
    }

    /// Register a new user.
    ///
    /// Returns the created user together with the e-mail verification token
    /// the caller hands to the mailer.
    ///
    /// # Errors
    ///
    /// * `AuthError::Taken` - the username or e-mail is already registered
    /// * `AuthError::InvalidField` - the username or password failed validation
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AuthResult<(User, String)> {
        self.validate_username(username)?;
        self.validate_password(password)?;

        let existing_user = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if existing_user.is_some() {
            return Err(AuthError::Taken(UniqueField::Username));
        }

        let existing_email = sqlx::query("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        if existing_email.is_some() {
            return Err(AuthError::Taken(UniqueField::Email));
        }

        let password_hash = self.hash_password(password)?;
        let verification_token = Uuid::new_v4().to_string();

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, verification_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, email_verified, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(&verification_token)
        .fetch_one(&self.pool)
        .await?;

        Ok((row_to_user(&row), verification_token))
    }

    /// Confirm an e-mail address with its verification token.
    pub async fn verify_email(&self, token: &str) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, verification_token = NULL
            WHERE verification_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::BadToken(TokenPurpose::EmailVerification));
        }
        Ok(())
    }

    /// Login a user by username and password.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(User, SessionTokens)> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, email_verified, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::BadCredentials)?;

        let password_hash: String = row.get("password_hash");
        self.verify_password(password, &password_hash)?;

        let user = row_to_user(&row);
        let tokens = self.create_session(user.id).await?;
        Ok((user, tokens))
    }

    /// Create a session: a signed bearer token plus a stored refresh token.
    async fn create_session(&self, user_id: UserId) -> AuthResult<SessionTokens> {
        let session_token = self.generate_session_token(user_id)?;
        let refresh_token = Uuid::new_v4().to_string();

        let expires_at = Utc::now() + self.refresh_duration;
        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&refresh_token)
        .bind(user_id)
        .bind(expires_at.naive_utc())
        .execute(&self.pool)
        .await?;

        Ok(SessionTokens {
            session_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for fresh session tokens. The old refresh
    /// token is deleted (rotation).
    ///
    /// # Errors
    ///
    /// * `AuthError::StaleSession` - the refresh token is unknown or expired
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<SessionTokens> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = $1")
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::StaleSession)?;

        let expires_at: DateTime<Utc> = row.get::<chrono::NaiveDateTime, _>("expires_at").and_utc();
        let user_id: UserId = row.get("user_id");

        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;

        if expires_at < Utc::now() {
            return Err(AuthError::StaleSession);
        }

        self.create_session(user_id).await
    }

    /// Logout by invalidating a refresh token.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Issue a password reset token for the account behind `email`.
    ///
    /// Returns `None` when no account matches; callers respond identically
    /// either way so the endpoint does not leak which addresses exist.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<Option<(User, String)>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, email_verified, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = row_to_user(&row);

        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $1, reset_token_expires_at = $2
            WHERE id = $3
            "#,
        )
        .bind(&token)
        .bind(expires_at.naive_utc())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        Ok(Some((user, token)))
    }

    /// Set a new password using a reset token. The token is single-use and
    /// every open session of the account is invalidated.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<()> {
        self.validate_password(new_password)?;

        let row = sqlx::query("SELECT id, reset_token_expires_at FROM users WHERE reset_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::BadToken(TokenPurpose::PasswordReset))?;

        let user_id: UserId = row.get("id");
        let expires_at = row
            .get::<Option<chrono::NaiveDateTime>, _>("reset_token_expires_at")
            .map(|dt| dt.and_utc());
        if expires_at.is_none_or(|at| at < Utc::now()) {
            return Err(AuthError::BadToken(TokenPurpose::PasswordReset));
        }

        let password_hash = self.hash_password(new_password)?;
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, reset_token = NULL, reset_token_expires_at = NULL
            WHERE id = $2
            "#,
        )
        .bind(&password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Verify a session token's signature and expiry.
    pub fn verify_session_token(&self, token: &str) -> AuthResult<SessionClaims> {
        let token_data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.session_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Full authentication as performed on every socket `hello`: signature,
    /// expiry, and existence of the user behind the claims.
    pub async fn authenticate(&self, token: &str) -> AuthResult<User> {
        let claims = self.verify_session_token(token)?;
        self.find_user(claims.sub)
            .await?
            .ok_or(AuthError::AccountGone)
    }

    /// Look up a user by id.
    pub async fn find_user(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, email_verified, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    /// Hash password with Argon2id
    fn hash_password(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        Ok(argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AuthError::Hashing)?
            .to_string())
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> AuthResult<()> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::BadCredentials)?;
        let argon2 = Argon2::default();
        argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::BadCredentials)
    }

    /// Generate the signed session token
    fn generate_session_token(&self, user_id: UserId) -> AuthResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            exp: (now + self.session_duration).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Validate username format
    fn validate_username(&self, username: &str) -> AuthResult<()> {
        let len = username.len();
        if !(3..=20).contains(&len) {
            return Err(AuthError::InvalidField {
                field: "username",
                reason: "must be 3-20 characters".to_string(),
            });
        }
        if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(AuthError::InvalidField {
                field: "username",
                reason: "only letters, numbers, and underscores are allowed".to_string(),
            });
        }
        Ok(())
    }

    /// Validate password strength
    fn validate_password(&self, password: &str) -> AuthResult<()> {
        if password.len() < 8 {
            return Err(AuthError::InvalidField {
                field: "password",
                reason: "must be at least 8 characters".to_string(),
            });
        }

        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
        let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

        if !has_digit || !has_uppercase || !has_lowercase {
            return Err(AuthError::InvalidField {
                field: "password",
                reason: "needs at least one number, one uppercase and one lowercase letter"
                    .to_string(),
            });
        }
        Ok(())
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}
