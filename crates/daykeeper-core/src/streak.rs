//! Habit streak computation.
//!
//! This module implements the streak engine: a pure function over a
//! completion record and a repetition cadence that derives the current
//! consecutive-completion streak and the most recent completion date.
//! The reference date (`today`) is injected by the caller, so results
//! are deterministic and testable without touching the wall clock.
//!
//! Two algorithms are used depending on cadence:
//! - **Daily** (cadence = 1): walk backward day by day from yesterday;
//!   the first missing day zeroes the streak.
//! - **Windowed** (cadence = N > 1): partition time backward from today
//!   into N-day windows and count consecutive windows containing at
//!   least one completion.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Expected repetition interval for a habit, in days. Always >= 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct Cadence(u32);

impl Cadence {
    /// The daily cadence (once every day).
    pub const DAILY: Cadence = Cadence(1);

    /// Create a cadence of `days` days. Zero is rejected.
    pub fn new(days: u32) -> Result<Self, ValidationError> {
        if days == 0 {
            return Err(ValidationError::InvalidCadence { value: 0 });
        }
        Ok(Cadence(days))
    }

    /// Interval length in days.
    pub fn days(self) -> u32 {
        self.0
    }

    /// Whether this is the daily cadence.
    pub fn is_daily(self) -> bool {
        self.0 == 1
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::DAILY
    }
}

impl TryFrom<u32> for Cadence {
    type Error = ValidationError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Cadence::new(days)
    }
}

impl TryFrom<i64> for Cadence {
    type Error = ValidationError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        let days = u32::try_from(days)
            .map_err(|_| ValidationError::InvalidCadence { value: days })?;
        Cadence::new(days).map_err(|_| ValidationError::InvalidCadence { value: 0 })
    }
}

impl From<Cadence> for u32 {
    fn from(cadence: Cadence) -> u32 {
        cadence.0
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sparse map of calendar date to completion flag.
///
/// A date missing from the record and a date present with `false` are
/// treated identically by the engine (both mean "not completed"), but
/// explicit `false` entries survive deserialization from raw input.
///
/// Serializes as a JSON/TOML map of `"YYYY-MM-DD"` keys to booleans,
/// matching the on-disk column format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionRecord {
    entries: BTreeMap<NaiveDate, bool>,
}

impl CompletionRecord {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from raw `"YYYY-MM-DD" -> bool` input, validating
    /// every key. The first key that fails strict date parsing rejects
    /// the whole input; nothing is partially constructed.
    pub fn from_raw<I, K>(raw: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for (key, completed) in raw {
            let date = parse_date(key.as_ref())?;
            entries.insert(date, completed);
        }
        Ok(Self { entries })
    }

    /// Toggle one date. `true` inserts the key, `false` removes it, so a
    /// mark/unmark round trip restores the record byte for byte.
    pub fn set(&mut self, date: NaiveDate, completed: bool) {
        if completed {
            self.entries.insert(date, true);
        } else {
            self.entries.remove(&date);
        }
    }

    /// Whether `date` is marked completed.
    pub fn is_completed(&self, date: NaiveDate) -> bool {
        self.entries.get(&date).copied().unwrap_or(false)
    }

    /// Truthy dates in ascending order.
    pub fn completed_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries
            .iter()
            .filter(|(_, &completed)| completed)
            .map(|(&date, _)| date)
    }

    /// Number of entries, including explicit `false` ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a strict `YYYY-MM-DD` date string.
pub fn parse_date(key: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").map_err(|_| ValidationError::MalformedDate {
        key: key.to_string(),
    })
}

/// Derived streak state for a habit.
///
/// This is a cache, not independent truth: it must be recomputed via
/// [`compute`] whenever the completion record or cadence changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakResult {
    /// Consecutive completed days (or cadence windows) counting backward
    /// from the present.
    pub current_streak: u32,

    /// Most recent completed date, regardless of streak outcome.
    pub last_completed: Option<NaiveDate>,
}

/// Compute the current streak for `record` under `cadence`, as seen from
/// `today`.
///
/// Pure and side-effect free. `today` itself is excluded from the daily
/// backward walk: the streak counts completed days up to and including
/// yesterday, and whether today's own completion extends the displayed
/// streak is a caller policy.
pub fn compute(record: &CompletionRecord, cadence: Cadence, today: NaiveDate) -> StreakResult {
    let completed: Vec<NaiveDate> = record.completed_dates().collect();
    let (Some(&earliest), Some(&latest)) = (completed.first(), completed.last()) else {
        return StreakResult::default();
    };

    let current_streak = if cadence.is_daily() {
        daily_streak(record, earliest, today)
    } else {
        windowed_streak(&completed, cadence, earliest, today)
    };

    StreakResult {
        current_streak,
        last_completed: Some(latest),
    }
}

/// Walk backward from yesterday; consecutive completed days count, the
/// first missing day zeroes the streak and stops the walk.
fn daily_streak(record: &CompletionRecord, earliest: NaiveDate, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut expected = today - Duration::days(1);

    while expected >= earliest {
        if record.is_completed(expected) {
            streak += 1;
            expected = expected - Duration::days(1);
        } else {
            streak = 0;
            break;
        }
    }
    streak
}

/// Count consecutive cadence-length windows, anchored to `today` and
/// walking backward, that each contain at least one completion.
fn windowed_streak(
    completed: &[NaiveDate],
    cadence: Cadence,
    earliest: NaiveDate,
    today: NaiveDate,
) -> u32 {
    let span = Duration::days(i64::from(cadence.days()) - 1);
    let mut window_end = today;
    let mut window_start = today - span;
    let mut streak = 0;

    loop {
        // Once the window lies entirely before the earliest completion,
        // no further window can contain one.
        if window_end < earliest {
            break;
        }
        let hit = completed
            .iter()
            .any(|&date| date >= window_start && date <= window_end);
        if !hit {
            break;
        }
        streak += 1;
        window_end = window_start - Duration::days(1);
        window_start = window_end - span;
    }
    streak
}
