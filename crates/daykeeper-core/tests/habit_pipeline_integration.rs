//! End-to-end tests for the mark -> recompute -> persist -> feed pipeline.
//!
//! Exercises the full path a mutation takes: a completion toggle on a
//! stored habit recomputes the streak inside the storage transaction,
//! bumps the modification watermark, and surfaces on the change feed of
//! both partnership members.

use chrono::{Duration, Utc};
use uuid::Uuid;

use daykeeper_core::streak::parse_date;
use daykeeper_core::{Cadence, ChangeFeed, Database, FeedEvent, Habit};

#[test]
fn daily_habit_lifecycle() {
    let mut db = Database::open_memory().unwrap();
    let owner = Uuid::new_v4();
    let habit = Habit::new(owner, "Morning run", Cadence::DAILY).unwrap();
    db.insert_habit(&habit).unwrap();

    let today = parse_date("2024-01-04").unwrap();
    for day in ["2024-01-01", "2024-01-02", "2024-01-03"] {
        db.mark_completion(habit.id, parse_date(day).unwrap(), true, today)
            .unwrap();
    }

    let stored = db.get_habit(habit.id).unwrap();
    assert_eq!(stored.streak, 3);
    assert_eq!(stored.last_completed, Some(parse_date("2024-01-03").unwrap()));

    // Unmark the middle day: contiguity breaks, streak zeroes, but the
    // most recent completion date is untouched.
    let updated = db
        .mark_completion(habit.id, parse_date("2024-01-02").unwrap(), false, today)
        .unwrap();
    assert_eq!(updated.streak, 0);
    assert_eq!(updated.last_completed, Some(parse_date("2024-01-03").unwrap()));

    // Re-marking restores the exact prior result.
    let restored = db
        .mark_completion(habit.id, parse_date("2024-01-02").unwrap(), true, today)
        .unwrap();
    assert_eq!(restored.streak_result(), stored.streak_result());
}

#[test]
fn weekly_habit_counts_windows() {
    let mut db = Database::open_memory().unwrap();
    let owner = Uuid::new_v4();
    let habit = Habit::new(owner, "Review goals", Cadence::new(7).unwrap()).unwrap();
    db.insert_habit(&habit).unwrap();

    let today = parse_date("2024-01-09").unwrap();
    db.mark_completion(habit.id, parse_date("2024-01-01").unwrap(), true, today)
        .unwrap();
    let updated = db
        .mark_completion(habit.id, parse_date("2024-01-08").unwrap(), true, today)
        .unwrap();
    assert_eq!(updated.streak, 2);
}

#[test]
fn partnered_mutation_flows_to_the_feed() {
    let mut db = Database::open_memory().unwrap();
    let (owner, partner) = (Uuid::new_v4(), Uuid::new_v4());
    db.pair(owner, partner).unwrap();

    let mut habit = Habit::new(owner, "Meditate", Cadence::DAILY).unwrap();
    habit.set_partner(Some(partner)).unwrap();
    db.insert_habit(&habit).unwrap();

    let since = Utc::now() - Duration::seconds(1);
    let mut feed = ChangeFeed::starting_from(partner, since);

    // Connection event carries the current partner set.
    match feed.initial(&db).unwrap() {
        FeedEvent::InitialPartners { partners, .. } => assert_eq!(partners, vec![owner]),
        other => panic!("unexpected event: {other:?}"),
    }

    db.mark_completion(
        habit.id,
        parse_date("2024-01-03").unwrap(),
        true,
        parse_date("2024-01-04").unwrap(),
    )
    .unwrap();

    let events = feed.poll(&db).unwrap();
    let update = events
        .iter()
        .find_map(|e| match e {
            FeedEvent::HabitUpdate { changes, .. } => Some(changes),
            _ => None,
        })
        .expect("habit update event");
    let summaries = &update[&owner];
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].streak, 1);
    assert_eq!(
        summaries[0].last_completed,
        Some(parse_date("2024-01-03").unwrap())
    );

    // The watermark advanced; a second poll is quiet.
    assert!(feed.poll(&db).unwrap().is_empty());
}

#[test]
fn cadence_change_repairs_a_broken_daily_streak() {
    let mut db = Database::open_memory().unwrap();
    let owner = Uuid::new_v4();
    let habit = Habit::new(owner, "Deep clean", Cadence::DAILY).unwrap();
    db.insert_habit(&habit).unwrap();

    let today = parse_date("2024-01-09").unwrap();
    db.mark_completion(habit.id, parse_date("2024-01-01").unwrap(), true, today)
        .unwrap();
    let daily = db
        .mark_completion(habit.id, parse_date("2024-01-08").unwrap(), true, today)
        .unwrap();
    assert_eq!(daily.streak, 0);

    let mut weekly = db.get_habit(habit.id).unwrap();
    weekly.set_cadence(Cadence::new(7).unwrap(), today);
    db.update_habit(&weekly).unwrap();

    assert_eq!(db.get_habit(habit.id).unwrap().streak, 2);
}

#[test]
fn invalid_input_never_mutates_stored_state() {
    let mut db = Database::open_memory().unwrap();
    let owner = Uuid::new_v4();
    let habit = Habit::new(owner, "Hydrate", Cadence::DAILY).unwrap();
    db.insert_habit(&habit).unwrap();

    // Malformed date keys are rejected before any record is built.
    assert!(daykeeper_core::CompletionRecord::from_raw([("2024-13-40", true)]).is_err());

    // Self-partnering is rejected and leaves the stored habit unchanged.
    let mut copy = db.get_habit(habit.id).unwrap();
    assert!(copy.set_partner(Some(owner)).is_err());
    assert_eq!(db.get_habit(habit.id).unwrap(), habit);

    // A habit marked through the database still exists untouched after a
    // rejected pairing.
    assert!(db.pair(owner, owner).is_err());
    let today = parse_date("2024-01-04").unwrap();
    let updated = db
        .mark_completion(habit.id, parse_date("2024-01-03").unwrap(), true, today)
        .unwrap();
    assert_eq!(updated.streak, 1);
}
