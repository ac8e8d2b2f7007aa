//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use five_crowns::auth::MediaConfig;
use five_crowns::db::DatabaseConfig;
use std::net::SocketAddr;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Outbound e-mail coordinates
    pub smtp: SmtpConfig,
    /// Media-room token service coordinates
    pub media: MediaConfig,
    /// Public base URL used in e-mailed links
    pub public_base_url: String,
    /// Optional Prometheus exporter bind address
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Session-signing secret (required)
    pub session_secret: String,
    /// Session token lifetime in days
    pub session_ttl_days: i64,
}

/// SMTP coordinates for the mailer. Delivery itself is an external
/// collaborator; the server only builds and hands off messages.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or_else(|| {
                "127.0.0.1:8080"
                    .parse()
                    .expect("Default bind address is valid")
            });

        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| "postgres://postgres@localhost/fivecrowns_db".to_string());

        let database = DatabaseConfig::new(database_url).with_env_overrides();

        // Security configuration (REQUIRED)
        let session_secret =
            std::env::var("SESSION_SECRET").map_err(|_| ConfigError::MissingRequired {
                var: "SESSION_SECRET".to_string(),
                hint: "Generate with: openssl rand -hex 32".to_string(),
            })?;

        let security = SecurityConfig {
            session_secret,
            session_ttl_days: parse_env_or("SESSION_TTL_DAYS", 7),
        };

        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_env_or("SMTP_PORT", 587),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "no-reply@fivecrowns.local".to_string()),
        };

        // Media service coordinates (REQUIRED; the secret signs room tokens)
        let media = MediaConfig {
            url: std::env::var("MEDIA_URL").map_err(|_| ConfigError::MissingRequired {
                var: "MEDIA_URL".to_string(),
                hint: "WebSocket URL of the media service, e.g. wss://media.example.com"
                    .to_string(),
            })?,
            api_key: std::env::var("MEDIA_API_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "MEDIA_API_KEY".to_string(),
                hint: "API key issued by the media service".to_string(),
            })?,
            api_secret: std::env::var("MEDIA_API_SECRET").map_err(|_| {
                ConfigError::MissingRequired {
                    var: "MEDIA_API_SECRET".to_string(),
                    hint: "Shared signing secret issued by the media service".to_string(),
                }
            })?,
        };

        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| format!("http://{bind}"));

        let metrics_bind = std::env::var("METRICS_BIND")
            .ok()
            .and_then(|s| s.parse().ok());

        let config = ServerConfig {
            bind,
            database,
            security,
            smtp,
            media,
            public_base_url,
            metrics_bind,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.session_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "SESSION_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.session_ttl_days < 1 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_DAYS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.smtp.port == 0 {
            return Err(ConfigError::Invalid {
                var: "SMTP_PORT".to_string(),
                reason: "Must be a valid port".to_string(),
            });
        }

        if self.media.api_secret.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "MEDIA_API_SECRET".to_string(),
                reason: "Must be at least 16 characters".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: DatabaseConfig::new("postgres://postgres@localhost/fivecrowns_db"),
            security: SecurityConfig {
                session_secret: "a".repeat(32),
                session_ttl_days: 7,
            },
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 587,
                username: None,
                password: None,
                from_address: "no-reply@fivecrowns.local".to_string(),
            },
            media: MediaConfig {
                url: "wss://media.example.com".to_string(),
                api_key: "key".to_string(),
                api_secret: "b".repeat(16),
            },
            public_base_url: "http://localhost:8080".to_string(),
            metrics_bind: None,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "SESSION_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SESSION_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_session_secret_rejected() {
        let mut config = valid_config();
        config.security.session_secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = valid_config();
        config.security.session_ttl_days = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_short_media_secret_rejected() {
        let mut config = valid_config();
        config.media.api_secret = "tiny".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
