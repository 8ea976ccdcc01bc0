//! Connection configuration.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::{Error, Result};
use crate::isolation::IsolationLevel;

/// Default database URL.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/postgres";

/// Default maximum pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default time to wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL connection configuration.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Connection URL.
    pub database_url: String,

    /// Maximum number of pooled connections.
    pub max_connections: u32,

    /// Time to wait for a pooled connection.
    pub acquire_timeout: Duration,

    /// Isolation level for transactions started with [`crate::begin`].
    pub isolation_level: IsolationLevel,
}

impl PostgresConfig {
    /// Create a configuration for the given URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            isolation_level: IsolationLevel::default(),
        }
    }

    /// Read configuration from the environment.
    ///
    /// - `DATABASE_URL`
    /// - `ROWKEEPER_MAX_CONNECTIONS`
    /// - `ROWKEEPER_ISOLATION_LEVEL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(max) = lookup("ROWKEEPER_MAX_CONNECTIONS") {
            config.max_connections = max.trim().parse().map_err(|_| {
                Error::Config(format!("ROWKEEPER_MAX_CONNECTIONS must be a number, got {max:?}"))
            })?;
        }
        if let Some(level) = lookup("ROWKEEPER_ISOLATION_LEVEL") {
            config.isolation_level = level.parse()?;
        }
        Ok(config)
    }

    /// Set the maximum pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the connection acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the transaction isolation level.
    pub fn with_isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Open a connection pool.
    pub async fn connect(&self) -> Result<PgPool> {
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await?;
        info!(max_connections = self.max_connections, "connected to PostgreSQL");
        Ok(pool)
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}
