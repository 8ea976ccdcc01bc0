//! PostgreSQL transaction handle for rowkeeper.
//!
//! Wraps a sqlx transaction so the lifecycle engines can run their
//! statements against a live database.
//!
//! ```ignore
//! let config = PostgresConfig::from_env()?;
//! let pool = config.connect().await?;
//! let mut trx = begin(&pool, config.isolation_level).await?;
//! engine.save(&mut trx, &mut row, false).await?;
//! trx.commit().await?;
//! ```

pub mod config;
pub mod error;
pub mod isolation;
pub mod transaction;

pub use config::PostgresConfig;
pub use error::{Error, Result};
pub use isolation::IsolationLevel;
pub use transaction::{begin, PgTransaction};
