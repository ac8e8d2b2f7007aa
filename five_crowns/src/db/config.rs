//! Connection settings for the PostgreSQL pool.

use std::env;
use std::time::Duration;

/// How this process talks to PostgreSQL: the connection URL plus pool
/// tuning. The URL is always supplied by the caller; tuning starts from
/// [`PoolTuning::default`] and deployments layer `DB_*` variables on top
/// via [`DatabaseConfig::with_env_overrides`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub pool: PoolTuning,
}

/// Pool sizing and connection lifetimes.
#[derive(Debug, Clone)]
pub struct PoolTuning {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolTuning {
    fn default() -> Self {
        // Game actors write one event per command and the REST facade is
        // read-mostly. A small pool with a short acquire timeout surfaces
        // a wedged database quickly instead of silently queueing commands.
        Self {
            max_connections: 16,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(120),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool: PoolTuning::default(),
        }
    }

    /// Layer pool overrides from the environment: `DB_POOL_MAX`,
    /// `DB_POOL_MIN`, `DB_ACQUIRE_TIMEOUT_SECS`, `DB_IDLE_TIMEOUT_SECS`,
    /// and `DB_MAX_LIFETIME_SECS`. Unset or unparsable variables keep
    /// their defaults.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_parse("DB_POOL_MAX") {
            self.pool.max_connections = n;
        }
        if let Some(n) = env_parse("DB_POOL_MIN") {
            self.pool.min_connections = n;
        }
        if let Some(secs) = env_parse("DB_ACQUIRE_TIMEOUT_SECS") {
            self.pool.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("DB_IDLE_TIMEOUT_SECS") {
            self.pool.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("DB_MAX_LIFETIME_SECS") {
            self.pool.max_lifetime = Duration::from_secs(secs);
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_coherent() {
        let tuning = PoolTuning::default();
        assert!(tuning.min_connections <= tuning.max_connections);
        assert!(tuning.acquire_timeout < tuning.idle_timeout);
        assert!(tuning.idle_timeout < tuning.max_lifetime);
    }

    #[test]
    fn new_starts_from_default_tuning() {
        let config = DatabaseConfig::new("postgres://localhost/fc");
        assert_eq!(config.database_url, "postgres://localhost/fc");
        assert_eq!(
            config.pool.max_connections,
            PoolTuning::default().max_connections
        );
    }
}
