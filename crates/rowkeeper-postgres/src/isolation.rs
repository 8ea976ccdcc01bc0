//! Transaction isolation levels.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Isolation level applied when a transaction begins.
///
/// The lifecycle engines read a snapshot and write in separate statements,
/// so anything weaker than [`IsolationLevel::Serializable`] can lose updates
/// under concurrent writers to the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// `SERIALIZABLE`.
    #[default]
    Serializable,
    /// `REPEATABLE READ`.
    RepeatableRead,
    /// `READ COMMITTED`.
    ReadCommitted,
    /// `READ UNCOMMITTED`.
    ReadUncommitted,
}

impl IsolationLevel {
    /// SQL spelling of the level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            _ => Err(Error::Config(format!("unknown isolation level: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serializable() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::Serializable);
    }

    #[test]
    fn test_parse_spellings() {
        assert_eq!(
            "repeatable_read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "READ COMMITTED".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert_eq!(
            "read-uncommitted".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadUncommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for level in [
            IsolationLevel::Serializable,
            IsolationLevel::RepeatableRead,
            IsolationLevel::ReadCommitted,
            IsolationLevel::ReadUncommitted,
        ] {
            assert_eq!(level.to_string().parse::<IsolationLevel>().unwrap(), level);
        }
    }
}
