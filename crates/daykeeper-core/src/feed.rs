//! Change feed for accountability updates.
//!
//! The original push channel is recast as an explicit poll: every habit
//! and partnership mutation bumps an `updated_at` timestamp, and the
//! feed compares those against the instant of the previous poll. The
//! event vocabulary (initial partner list, partner updates, habit
//! updates grouped by partner, heartbeats) is unchanged.
//!
//! Consumers poll via [`ChangeFeed::poll`] or run the async [`watch`]
//! loop, which polls at a configured cadence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::CoreError;
use crate::habit::Habit;
use crate::storage::{Database, FeedConfig};
use crate::streak::Cadence;

/// A habit as reported on the feed. Streak state only; the completion
/// record itself is not broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitSummary {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub cadence: Cadence,
    pub streak: u32,
    pub last_completed: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Habit> for HabitSummary {
    fn from(habit: &Habit) -> Self {
        Self {
            id: habit.id,
            owner: habit.owner,
            name: habit.name.clone(),
            cadence: habit.cadence,
            streak: habit.streak,
            last_completed: habit.last_completed,
            updated_at: habit.updated_at,
        }
    }
}

/// Events emitted by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// Sent once when a watcher connects: the current partner set.
    InitialPartners {
        partners: Vec<Uuid>,
        at: DateTime<Utc>,
    },
    /// The partner set changed; carries the complete current set.
    PartnersUpdate {
        partners: Vec<Uuid>,
        at: DateTime<Utc>,
    },
    /// Habits shared through a partnership changed, grouped by the
    /// counterpart user.
    HabitUpdate {
        changes: HashMap<Uuid, Vec<HabitSummary>>,
        at: DateTime<Utc>,
    },
    /// Keep-alive for quiet polls.
    Heartbeat { at: DateTime<Utc> },
}

/// Stateful poller tracking the instant of the previous poll.
pub struct ChangeFeed {
    user: Uuid,
    last_check: DateTime<Utc>,
}

impl ChangeFeed {
    /// Feed for `user`, reporting changes from now on.
    pub fn new(user: Uuid) -> Self {
        Self::starting_from(user, Utc::now())
    }

    /// Feed for `user` reporting changes after `since`.
    pub fn starting_from(user: Uuid, since: DateTime<Utc>) -> Self {
        Self {
            user,
            last_check: since,
        }
    }

    /// The one-off connection event carrying the current partner set.
    pub fn initial(&self, db: &Database) -> Result<FeedEvent, CoreError> {
        Ok(FeedEvent::InitialPartners {
            partners: self.current_partners(db)?,
            at: Utc::now(),
        })
    }

    /// Collect events for everything that changed since the last poll.
    pub fn poll(&mut self, db: &Database) -> Result<Vec<FeedEvent>, CoreError> {
        let now = Utc::now();
        let mut events = Vec::new();

        // Partnership churn is reported as the complete current set, so
        // consumers never have to reconcile deltas.
        let pairings = db.partnerships_changed_since(self.user, self.last_check)?;
        if !pairings.is_empty() {
            events.push(FeedEvent::PartnersUpdate {
                partners: self.current_partners(db)?,
                at: now,
            });
        }

        let habits = db.habits_changed_since(self.user, self.last_check)?;
        let changes = group_by_counterpart(self.user, &habits);
        if !changes.is_empty() {
            events.push(FeedEvent::HabitUpdate { changes, at: now });
        }

        self.last_check = now;
        Ok(events)
    }

    fn current_partners(&self, db: &Database) -> Result<Vec<Uuid>, CoreError> {
        Ok(db
            .partners_of(self.user)?
            .iter()
            .filter_map(|pairing| pairing.counterpart(self.user))
            .collect())
    }
}

/// Group changed habits by the partnership counterpart: habits the user
/// owns go under their partner, habits the user oversees go under the
/// owner. Habits with no partner involved are not broadcast.
fn group_by_counterpart(user: Uuid, habits: &[Habit]) -> HashMap<Uuid, Vec<HabitSummary>> {
    let mut changes: HashMap<Uuid, Vec<HabitSummary>> = HashMap::new();
    for habit in habits {
        let key = if habit.owner == user {
            match habit.partner {
                Some(partner) => partner,
                None => continue,
            }
        } else if habit.partner == Some(user) {
            habit.owner
        } else {
            continue;
        };
        changes.entry(key).or_default().push(habit.into());
    }
    changes
}

/// Poll the feed at the configured cadence, forwarding each event to
/// `on_event`. Returning `false` from the callback stops the loop.
///
/// Emits the initial partner set first, then a heartbeat on every quiet
/// poll when enabled.
pub async fn watch<F>(
    db: &Database,
    user: Uuid,
    config: &FeedConfig,
    mut on_event: F,
) -> Result<(), CoreError>
where
    F: FnMut(&FeedEvent) -> bool,
{
    let mut feed = ChangeFeed::new(user);
    if !on_event(&feed.initial(db)?) {
        return Ok(());
    }

    let interval = std::time::Duration::from_secs(config.poll_interval_secs.max(1));
    loop {
        tokio::time::sleep(interval).await;
        let events = feed.poll(db)?;
        if events.is_empty() {
            if config.heartbeat && !on_event(&FeedEvent::Heartbeat { at: Utc::now() }) {
                return Ok(());
            }
            continue;
        }
        for event in &events {
            if !on_event(event) {
                return Ok(());
            }
        }
    }
}
