//! Shared value types used by events.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp with millisecond precision at the boundaries.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Origin systems usually hand over epoch milliseconds, so the
/// conversions in both directions live here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Creates a [`Timestamp`] from milliseconds since the Unix epoch.
    ///
    /// Returns `None` if the value is outside the representable range.
    pub fn from_epoch_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Returns milliseconds since the Unix epoch.
    pub fn as_epoch_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Trust
// ---------------------------------------------------------------------------

/// Whether a piece of event data has been verified by its transport.
///
/// `Untrusted` data is a rumour: it tells a source where to look, never what to
/// believe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trust {
    /// Verified by an authenticated transport.
    Trusted,
    /// Unverified; must be confirmed against the source before acting on it.
    #[default]
    Untrusted,
}

impl Trust {
    /// Returns `true` for [`Trust::Trusted`].
    pub fn is_trusted(self) -> bool {
        matches!(self, Self::Trusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_round_trip_preserves_origin_value() {
        let ts = Timestamp::from_epoch_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.as_epoch_millis(), 1_700_000_000_123);
    }

    #[test]
    fn trust_defaults_to_untrusted() {
        assert_eq!(Trust::default(), Trust::Untrusted);
        assert!(!Trust::default().is_trusted());
    }
}
