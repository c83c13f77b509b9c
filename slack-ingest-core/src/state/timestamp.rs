//! Slack message timestamps.

use compact_str::CompactString;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The timestamp string could not be read as a decimal number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid slack timestamp: {0:?}")]
pub struct InvalidTimestamp(pub CompactString);

/// A Slack `ts` value such as `"1700000000.000100"`.
///
/// Compared numerically with exact decimal arithmetic; the original string
/// is kept for output and persistence.
#[derive(Debug, Clone)]
pub struct SlackTs {
    raw: CompactString,
    value: Decimal,
}

impl SlackTs {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Build a timestamp from unix seconds (used as a polling floor).
    pub fn from_unix(seconds: i64) -> Self {
        let value = Decimal::from(seconds);
        Self {
            raw: compact_str::format_compact!("{seconds}.000000"),
            value,
        }
    }
}

impl FromStr for SlackTs {
    type Err = InvalidTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed).map_err(|_| InvalidTimestamp(s.into()))?;
        if value.is_sign_negative() {
            return Err(InvalidTimestamp(s.into()));
        }
        Ok(Self {
            raw: trimmed.into(),
            value,
        })
    }
}

impl PartialEq for SlackTs {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SlackTs {}

impl PartialOrd for SlackTs {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SlackTs {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for SlackTs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ts(s: &str) -> SlackTs {
        s.parse().unwrap()
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(ts("100.1") > ts("50.0"));
        assert!(ts("1700000000.000100") > ts("1700000000.000099"));
        // Lexical comparison would get this one wrong.
        assert!(ts("99.9") < ts("100.0"));
        assert_eq!(ts("100.10"), ts("100.1"));
    }

    #[test]
    fn test_keeps_original_string() {
        assert_eq!(ts(" 1700000000.000100 ").as_str(), "1700000000.000100");
        assert_eq!(SlackTs::from_unix(42).as_str(), "42.000000");
        assert_eq!(SlackTs::from_unix(42), ts("42"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<SlackTs>().is_err());
        assert!("abc".parse::<SlackTs>().is_err());
        assert!("-1.5".parse::<SlackTs>().is_err());
    }
}
