//! Shared value types for the lifecycle domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (delays are bounded and non-negative, an
//! empty pipeline name is "no pipeline") and participate in the engine's
//! computations.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DelayParseError;
use crate::IssueRef;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
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

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// `true` when strictly more than `delay` separates `earlier` from `self`.
    pub fn is_later_than(self, earlier: Timestamp, delay: Delay) -> bool {
        self.0.signed_duration_since(earlier.0) > delay.as_time_delta()
    }

    /// `true` when less than `delay` separates `earlier` from `self`.
    pub fn is_within(self, earlier: Timestamp, delay: Delay) -> bool {
        self.0.signed_duration_since(earlier.0) < delay.as_time_delta()
    }

    /// Moves this timestamp forward by `delay`, saturating at the maximum
    /// representable time.
    pub fn plus(self, delay: Delay) -> Self {
        Self(
            self.0
                .checked_add_signed(delay.as_time_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    /// Moves this timestamp back by `delay`, saturating at the minimum
    /// representable time.
    pub fn minus(self, delay: Delay) -> Self {
        Self(
            self.0
                .checked_sub_signed(delay.as_time_delta())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        )
    }

    /// Calendar date in `YYYY-MM-DD` form, as used in bot comments.
    pub fn date_string(self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------

/// A policy threshold: a non-negative span of wall-clock time.
///
/// Written in configuration as a compact string of `<n><unit>` groups where
/// the unit is one of `d`, `h`, `m`, `s`; for example `"30d"`, `"36h"` or
/// `"1d12h"`. The bare string `"0"` is the zero delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delay(u64);

impl Delay {
    /// The zero delay.
    pub const ZERO: Delay = Delay(0);

    /// Upper bound on any configured delay (100 years).
    pub const MAX_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

    pub const fn days(days: u32) -> Self {
        Self(days as u64 * 24 * 60 * 60)
    }

    pub const fn hours(hours: u32) -> Self {
        Self(hours as u64 * 60 * 60)
    }

    pub const fn seconds(seconds: u32) -> Self {
        Self(seconds as u64)
    }

    /// Returns the delay in whole seconds.
    pub fn as_secs(self) -> u64 {
        self.0
    }

    fn as_time_delta(self) -> chrono::TimeDelta {
        // Bounded by MAX_SECONDS, so the conversion cannot overflow.
        chrono::TimeDelta::seconds(self.0.min(Self::MAX_SECONDS) as i64)
    }
}

impl FromStr for Delay {
    type Err = DelayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(DelayParseError::Empty);
        }
        if input == "0" {
            return Ok(Delay::ZERO);
        }

        let mut total: u64 = 0;
        let mut digits = String::new();
        for c in input.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }

            let unit_seconds = match c {
                'd' => 24 * 60 * 60,
                'h' => 60 * 60,
                'm' => 60,
                's' => 1,
                other => {
                    return Err(DelayParseError::UnknownUnit {
                        input: s.to_string(),
                        unit: other,
                    })
                }
            };
            if digits.is_empty() {
                return Err(DelayParseError::MissingValue(s.to_string()));
            }
            let value: u64 = digits
                .parse()
                .map_err(|_| DelayParseError::TooLarge(s.to_string()))?;
            digits.clear();

            total = value
                .checked_mul(unit_seconds)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| DelayParseError::TooLarge(s.to_string()))?;
        }

        if !digits.is_empty() {
            return Err(DelayParseError::MissingUnit(s.to_string()));
        }
        if total > Self::MAX_SECONDS {
            return Err(DelayParseError::TooLarge(s.to_string()));
        }

        Ok(Delay(total))
    }
}

impl TryFrom<String> for Delay {
    type Error = DelayParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Delay> for String {
    fn from(value: Delay) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Delay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return write!(f, "0");
        }

        let mut rest = self.0;
        for (unit, seconds) in [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)] {
            if rest >= seconds {
                write!(f, "{}{}", rest / seconds, unit)?;
                rest %= seconds;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// A Kanban-board classification attached to an issue (a ZenHub pipeline).
///
/// Construction rejects the empty string, so "absent" and "empty" collapse
/// into `Option::<Pipeline>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pipeline(String);

impl Pipeline {
    /// Board column holding issues nobody has looked at yet.
    pub const NEW_ISSUES: &'static str = "New Issues";

    /// Columns whose issues must get a maintainer response quickly.
    pub const HIGH_PRIORITY: [&'static str; 2] = ["P0", "Release Blocker"];

    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the incoming column that still needs a human to classify it.
    pub fn is_untriaged(&self) -> bool {
        self.0 == Self::NEW_ISSUES
    }

    pub fn is_high_priority(&self) -> bool {
        Self::HIGH_PRIORITY.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Open/closed state of an issue or pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

/// Immutable view of an issue or pull request at decision time.
///
/// Built fresh from the issue source for every evaluation and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    /// Repository and number.
    pub reference: IssueRef,

    /// `true` for pull requests. GitHub reports both through the issues API.
    pub is_pull_request: bool,

    pub created_at: Timestamp,

    pub state: IssueState,

    /// Names of the labels currently on the item.
    pub labels: Vec<String>,

    /// Free-text body.
    pub body: String,
}

impl IssueSnapshot {
    pub fn has_label(&self, label: &str) -> bool {
        !label.is_empty() && self.labels.iter().any(|l| l == label)
    }
}

/// Member-activity and priority signals for one issue.
///
/// `None` timestamps mean the event never happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySignals {
    /// Newest comment (or review) written by a member of the owning organization.
    pub latest_member_comment: Option<Timestamp>,

    /// Newest event of any kind caused by an organization member.
    pub latest_member_activity: Option<Timestamp>,

    /// Board classification, if the issue has one.
    pub pipeline: Option<Pipeline>,
}
