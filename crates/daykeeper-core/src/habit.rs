//! Habit entity and its mutation entry points.
//!
//! A habit owns a completion record and caches the derived streak state.
//! Recomputation is explicit: every mutation entry point refreshes the
//! cache through the streak engine and bumps `updated_at` so the change
//! feed can detect the update. There are no hidden persistence hooks.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::streak::{self, Cadence, CompletionRecord, StreakResult};

/// Maximum habit name length.
pub const MAX_NAME_LEN: usize = 50;

/// A tracked habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    /// Stable identifier.
    pub id: Uuid,

    /// Owning user.
    pub owner: Uuid,

    /// Display name, unique per owner.
    pub name: String,

    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,

    /// Optional `#RRGGBB` display colour.
    #[serde(default)]
    pub colour: Option<String>,

    /// Expected repetition interval.
    pub cadence: Cadence,

    /// Sparse date -> completed map.
    #[serde(default)]
    pub completions: CompletionRecord,

    /// Cached current streak. Derived, never authoritative.
    #[serde(default)]
    pub streak: u32,

    /// Cached most recent completion date.
    #[serde(default)]
    pub last_completed: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,

    /// Bumped on every mutation; the change feed keys off this.
    pub updated_at: DateTime<Utc>,

    /// Optional accountability partner granted read access.
    #[serde(default)]
    pub partner: Option<Uuid>,
}

impl Habit {
    /// Create a habit with an empty completion record.
    pub fn new(owner: Uuid, name: &str, cadence: Cadence) -> Result<Self, ValidationError> {
        let name = validate_name(name)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            name,
            description: None,
            colour: None,
            cadence,
            completions: CompletionRecord::new(),
            streak: 0,
            last_completed: None,
            created_at: now,
            updated_at: now,
            partner: None,
        })
    }

    /// Mark one date as completed or uncompleted, then refresh the cached
    /// streak as seen from `today`.
    ///
    /// Idempotent: marking an already-marked date, or unmarking an absent
    /// one, is a no-op apart from the `updated_at` bump. Unmarking removes
    /// the key, so a false/true round trip restores the prior record.
    pub fn mark_completed(&mut self, date: NaiveDate, completed: bool, today: NaiveDate) {
        self.completions.set(date, completed);
        self.refresh_streak(today);
    }

    /// Recompute the cached streak from the record and cadence.
    ///
    /// Must be called after any external mutation of `completions` or
    /// `cadence` before the habit is persisted.
    pub fn refresh_streak(&mut self, today: NaiveDate) {
        let result = streak::compute(&self.completions, self.cadence, today);
        self.streak = result.current_streak;
        self.last_completed = result.last_completed;
        self.touch();
    }

    /// Current cached streak state as a value.
    pub fn streak_result(&self) -> StreakResult {
        StreakResult {
            current_streak: self.streak,
            last_completed: self.last_completed,
        }
    }

    /// Change the cadence and refresh the cache.
    pub fn set_cadence(&mut self, cadence: Cadence, today: NaiveDate) {
        self.cadence = cadence;
        self.refresh_streak(today);
    }

    /// Assign or clear the accountability partner. A user cannot be their
    /// own partner.
    pub fn set_partner(&mut self, partner: Option<Uuid>) -> Result<(), ValidationError> {
        if partner == Some(self.owner) {
            return Err(ValidationError::SelfPartner);
        }
        self.partner = partner;
        self.touch();
        Ok(())
    }

    /// Set the display colour, validating the hex format.
    pub fn set_colour(&mut self, colour: Option<&str>) -> Result<(), ValidationError> {
        self.colour = match colour {
            None => None,
            Some(c) => Some(validate_colour(c)?),
        };
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong { max: MAX_NAME_LEN });
    }
    Ok(name.to_string())
}

fn validate_colour(colour: &str) -> Result<String, ValidationError> {
    let valid = colour.len() == 7
        && colour.starts_with('#')
        && colour[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidColour {
            value: colour.to_string(),
        });
    }
    Ok(colour.to_ascii_lowercase())
}
