//! SQLite-based habit and partnership storage.
//!
//! Provides persistent storage for:
//! - Habits, with the completion record stored as a JSON text column
//!   of `{"YYYY-MM-DD": true}` entries
//! - Accountability partnerships
//! - Changed-since queries backing the change feed
//!
//! `mark_completion` is the unit of atomicity for habit mutation: the
//! read-modify-write of the completion record, the streak recomputation
//! and the persistence of the result happen inside one transaction, so
//! concurrent markers of the same habit cannot lose an update.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::data_dir;
use crate::error::{CoreError, DatabaseError};
use crate::habit::Habit;
use crate::partner::Partnership;
use crate::streak::{parse_date, Cadence};

/// SQLite database for habit storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/daykeeper/daykeeper.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        Self::open_at(data_dir()?.join("daykeeper.db"))
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: impl Into<std::path::PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let conn = Connection::open(&path).map_err(|source| DatabaseError::OpenFailed {
            path,
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS habits (
                    id             TEXT PRIMARY KEY,
                    owner          TEXT NOT NULL,
                    name           TEXT NOT NULL,
                    description    TEXT,
                    colour         TEXT,
                    cadence_days   INTEGER NOT NULL DEFAULT 1,
                    completions    TEXT NOT NULL DEFAULT '{}',
                    streak         INTEGER NOT NULL DEFAULT 0,
                    last_completed TEXT,
                    created_at     TEXT NOT NULL,
                    updated_at     TEXT NOT NULL,
                    partner        TEXT,
                    UNIQUE (owner, name)
                );

                CREATE TABLE IF NOT EXISTS partnerships (
                    special_key TEXT PRIMARY KEY,
                    user        TEXT NOT NULL,
                    partner     TEXT NOT NULL,
                    started_at  TEXT NOT NULL,
                    is_active   INTEGER NOT NULL DEFAULT 1,
                    updated_at  TEXT NOT NULL,
                    UNIQUE (user, partner)
                );

                -- Create indexes for common query patterns
                CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner);
                CREATE INDEX IF NOT EXISTS idx_habits_partner ON habits(partner);
                CREATE INDEX IF NOT EXISTS idx_habits_updated_at ON habits(updated_at);
                CREATE INDEX IF NOT EXISTS idx_partnerships_user ON partnerships(user);
                CREATE INDEX IF NOT EXISTS idx_partnerships_partner ON partnerships(partner);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ----- habits -----

    /// Insert a new habit.
    ///
    /// # Errors
    /// Returns `Conflict` if the owner already has a habit of this name.
    pub fn insert_habit(&self, habit: &Habit) -> Result<(), CoreError> {
        self.conn.execute(
            "INSERT INTO habits (id, owner, name, description, colour, cadence_days,
                                 completions, streak, last_completed, created_at, updated_at, partner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            habit_params(habit)?,
        )?;
        Ok(())
    }

    /// Persist every field of an existing habit.
    pub fn update_habit(&self, habit: &Habit) -> Result<(), CoreError> {
        let changed = self.conn.execute(
            "UPDATE habits SET owner = ?2, name = ?3, description = ?4, colour = ?5,
                               cadence_days = ?6, completions = ?7, streak = ?8,
                               last_completed = ?9, created_at = ?10, updated_at = ?11,
                               partner = ?12
             WHERE id = ?1",
            habit_params(habit)?,
        )?;
        if changed == 0 {
            return Err(not_found("habit", habit.id).into());
        }
        Ok(())
    }

    /// Fetch a habit by id.
    pub fn get_habit(&self, id: Uuid) -> Result<Habit, CoreError> {
        self.conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![id.to_string()],
                habit_from_row,
            )
            .map_err(|e| map_not_found(e, "habit", id))
    }

    /// Fetch a habit by owner and name.
    pub fn habit_by_name(&self, owner: Uuid, name: &str) -> Result<Habit, CoreError> {
        self.conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE owner = ?1 AND name = ?2"),
                params![owner.to_string(), name],
                habit_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CoreError::Database(DatabaseError::NotFound {
                    entity: "habit",
                    id: name.to_string(),
                }),
                other => other.into(),
            })
    }

    /// All habits of one owner, newest first.
    pub fn list_habits(&self, owner: Uuid) -> Result<Vec<Habit>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE owner = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![owner.to_string()], habit_from_row)?;
        collect_rows(rows)
    }

    /// Habits shared with `partner` by other users.
    pub fn habits_shared_with(&self, partner: Uuid) -> Result<Vec<Habit>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE partner = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![partner.to_string()], habit_from_row)?;
        collect_rows(rows)
    }

    /// Delete a habit.
    pub fn delete_habit(&self, id: Uuid) -> Result<(), CoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM habits WHERE id = ?1", params![id.to_string()])?;
        if changed == 0 {
            return Err(not_found("habit", id).into());
        }
        Ok(())
    }

    /// Toggle one completion date and persist the recomputed streak,
    /// atomically with respect to other writers of the same habit.
    ///
    /// Returns the updated habit.
    pub fn mark_completion(
        &mut self,
        id: Uuid,
        date: NaiveDate,
        completed: bool,
        today: NaiveDate,
    ) -> Result<Habit, CoreError> {
        let tx = self.conn.transaction().map_err(DatabaseError::from)?;

        let mut habit = tx
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![id.to_string()],
                habit_from_row,
            )
            .map_err(|e| map_not_found(e, "habit", id))?;

        habit.mark_completed(date, completed, today);

        tx.execute(
            "UPDATE habits SET completions = ?2, streak = ?3, last_completed = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                habit.id.to_string(),
                serde_json::to_string(&habit.completions)?,
                habit.streak,
                habit.last_completed.map(|d| d.to_string()),
                habit.updated_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::from)?;

        tx.commit().map_err(DatabaseError::from)?;
        Ok(habit)
    }

    /// Habits visible to `user` (as owner or partner) modified after `since`.
    pub fn habits_changed_since(
        &self,
        user: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Habit>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits
             WHERE (owner = ?1 OR partner = ?1) AND updated_at > ?2
             ORDER BY updated_at"
        ))?;
        let rows = stmt.query_map(
            params![user.to_string(), since.to_rfc3339()],
            habit_from_row,
        )?;
        collect_rows(rows)
    }

    // ----- partnerships -----

    /// Pair `user` with `partner`, reactivating an earlier pairing of the
    /// same two users if one exists.
    pub fn pair(&self, user: Uuid, partner: Uuid) -> Result<Partnership, CoreError> {
        if let Some(mut existing) = self.partnership(user, partner)? {
            existing.reactivate();
            self.conn.execute(
                "UPDATE partnerships SET is_active = 1, updated_at = ?2 WHERE special_key = ?1",
                params![
                    existing.special_key.to_string(),
                    existing.updated_at.to_rfc3339()
                ],
            )?;
            return Ok(existing);
        }

        let pairing = Partnership::new(user, partner)?;
        self.conn.execute(
            "INSERT INTO partnerships (special_key, user, partner, started_at, is_active, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pairing.special_key.to_string(),
                pairing.user.to_string(),
                pairing.partner.to_string(),
                pairing.started_at.to_rfc3339(),
                pairing.is_active,
                pairing.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(pairing)
    }

    /// Deactivate the pairing between `user` and `partner`.
    pub fn unpair(&self, user: Uuid, partner: Uuid) -> Result<(), CoreError> {
        let changed = self.conn.execute(
            "UPDATE partnerships SET is_active = 0, updated_at = ?3
             WHERE user = ?1 AND partner = ?2",
            params![
                user.to_string(),
                partner.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        if changed == 0 {
            return Err(not_found("partnership", partner).into());
        }
        Ok(())
    }

    /// The pairing created by `user` toward `partner`, active or not.
    pub fn partnership(&self, user: Uuid, partner: Uuid) -> Result<Option<Partnership>, CoreError> {
        let result = self.conn.query_row(
            &format!("SELECT {PARTNERSHIP_COLUMNS} FROM partnerships WHERE user = ?1 AND partner = ?2"),
            params![user.to_string(), partner.to_string()],
            partnership_from_row,
        );
        match result {
            Ok(pairing) => Ok(Some(pairing)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Active pairings involving `user`, in either direction.
    pub fn partners_of(&self, user: Uuid) -> Result<Vec<Partnership>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PARTNERSHIP_COLUMNS} FROM partnerships
             WHERE (user = ?1 OR partner = ?1) AND is_active = 1
             ORDER BY started_at"
        ))?;
        let rows = stmt.query_map(params![user.to_string()], partnership_from_row)?;
        collect_rows(rows)
    }

    /// Pairings involving `user` modified after `since`, active or not.
    pub fn partnerships_changed_since(
        &self,
        user: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Partnership>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PARTNERSHIP_COLUMNS} FROM partnerships
             WHERE (user = ?1 OR partner = ?1) AND updated_at > ?2
             ORDER BY updated_at"
        ))?;
        let rows = stmt.query_map(
            params![user.to_string(), since.to_rfc3339()],
            partnership_from_row,
        )?;
        collect_rows(rows)
    }
}

const HABIT_COLUMNS: &str = "id, owner, name, description, colour, cadence_days, completions, \
                             streak, last_completed, created_at, updated_at, partner";

const PARTNERSHIP_COLUMNS: &str = "special_key, user, partner, started_at, is_active, updated_at";

fn habit_params(habit: &Habit) -> Result<[Box<dyn rusqlite::ToSql>; 12], CoreError> {
    Ok([
        Box::new(habit.id.to_string()),
        Box::new(habit.owner.to_string()),
        Box::new(habit.name.clone()),
        Box::new(habit.description.clone()),
        Box::new(habit.colour.clone()),
        Box::new(habit.cadence.days()),
        Box::new(serde_json::to_string(&habit.completions)?),
        Box::new(habit.streak),
        Box::new(habit.last_completed.map(|d| d.to_string())),
        Box::new(habit.created_at.to_rfc3339()),
        Box::new(habit.updated_at.to_rfc3339()),
        Box::new(habit.partner.map(|p| p.to_string())),
    ])
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    let completions_json: String = row.get(6)?;
    let last_completed: Option<String> = row.get(8)?;
    Ok(Habit {
        id: parse_uuid(row.get::<_, String>(0)?, 0)?,
        owner: parse_uuid(row.get::<_, String>(1)?, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        colour: row.get(4)?,
        cadence: Cadence::try_from(row.get::<_, u32>(5)?)
            .map_err(|e| conversion_err(5, e))?,
        completions: serde_json::from_str(&completions_json)
            .map_err(|e| conversion_err(6, e))?,
        streak: row.get(7)?,
        last_completed: last_completed
            .map(|s| parse_date(&s).map_err(|e| conversion_err(8, e)))
            .transpose()?,
        created_at: parse_timestamp(row.get::<_, String>(9)?, 9)?,
        updated_at: parse_timestamp(row.get::<_, String>(10)?, 10)?,
        partner: row
            .get::<_, Option<String>>(11)?
            .map(|s| parse_uuid(s, 11))
            .transpose()?,
    })
}

fn partnership_from_row(row: &Row<'_>) -> rusqlite::Result<Partnership> {
    Ok(Partnership {
        special_key: parse_uuid(row.get::<_, String>(0)?, 0)?,
        user: parse_uuid(row.get::<_, String>(1)?, 1)?,
        partner: parse_uuid(row.get::<_, String>(2)?, 2)?,
        started_at: parse_timestamp(row.get::<_, String>(3)?, 3)?,
        is_active: row.get(4)?,
        updated_at: parse_timestamp(row.get::<_, String>(5)?, 5)?,
    })
}

fn parse_uuid(value: String, idx: usize) -> rusqlite::Result<Uuid> {
    value.parse().map_err(|e| conversion_err(idx, e))
}

fn parse_timestamp(value: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, CoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(DatabaseError::from)?);
    }
    Ok(out)
}

fn not_found(entity: &'static str, id: Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn map_not_found(e: rusqlite::Error, entity: &'static str, id: Uuid) -> CoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => not_found(entity, id).into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, Habit) {
        let db = Database::open_memory().unwrap();
        let habit = Habit::new(Uuid::new_v4(), "Read", Cadence::DAILY).unwrap();
        db.insert_habit(&habit).unwrap();
        (db, habit)
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (db, habit) = seeded();
        let loaded = db.get_habit(habit.id).unwrap();
        assert_eq!(loaded, habit);
    }

    #[test]
    fn duplicate_name_per_owner_conflicts() {
        let (db, habit) = seeded();
        let dup = Habit::new(habit.owner, "Read", Cadence::DAILY).unwrap();
        let err = db.insert_habit(&dup).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::Conflict(_))
        ));

        // Same name under a different owner is fine.
        let other = Habit::new(Uuid::new_v4(), "Read", Cadence::DAILY).unwrap();
        db.insert_habit(&other).unwrap();
    }

    #[test]
    fn get_missing_habit_is_not_found() {
        let db = Database::open_memory().unwrap();
        let err = db.get_habit(Uuid::new_v4()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::NotFound { entity: "habit", .. })
        ));
    }

    #[test]
    fn mark_completion_persists_recomputed_streak() {
        let (mut db, habit) = seeded();
        let today = parse_date("2024-01-04").unwrap();

        db.mark_completion(habit.id, parse_date("2024-01-02").unwrap(), true, today)
            .unwrap();
        let updated = db
            .mark_completion(habit.id, parse_date("2024-01-03").unwrap(), true, today)
            .unwrap();
        assert_eq!(updated.streak, 2);

        let loaded = db.get_habit(habit.id).unwrap();
        assert_eq!(loaded.streak, 2);
        assert_eq!(loaded.last_completed, Some(parse_date("2024-01-03").unwrap()));
        assert!(loaded.updated_at > habit.updated_at);
    }

    #[test]
    fn mark_completion_round_trip_restores_streak() {
        let (mut db, habit) = seeded();
        let today = parse_date("2024-01-04").unwrap();
        for day in ["2024-01-01", "2024-01-02", "2024-01-03"] {
            db.mark_completion(habit.id, parse_date(day).unwrap(), true, today)
                .unwrap();
        }
        let before = db.get_habit(habit.id).unwrap();

        let middle = parse_date("2024-01-02").unwrap();
        let off = db.mark_completion(habit.id, middle, false, today).unwrap();
        assert_eq!(off.streak, 0);
        let on = db.mark_completion(habit.id, middle, true, today).unwrap();
        assert_eq!(on.streak_result(), before.streak_result());
        assert_eq!(on.completions, before.completions);
    }

    #[test]
    fn changed_since_sees_marked_habits() {
        let (mut db, habit) = seeded();
        let before = Utc::now() - chrono::Duration::seconds(1);

        db.mark_completion(
            habit.id,
            parse_date("2024-01-03").unwrap(),
            true,
            parse_date("2024-01-04").unwrap(),
        )
        .unwrap();

        let changed = db.habits_changed_since(habit.owner, before).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, habit.id);

        let quiet = db
            .habits_changed_since(habit.owner, Utc::now() + chrono::Duration::seconds(5))
            .unwrap();
        assert!(quiet.is_empty());
    }

    #[test]
    fn partner_sees_shared_habit_changes() {
        let (mut db, mut habit) = seeded();
        let partner = Uuid::new_v4();
        habit.set_partner(Some(partner)).unwrap();
        db.update_habit(&habit).unwrap();

        let before = Utc::now() - chrono::Duration::seconds(1);
        db.mark_completion(
            habit.id,
            parse_date("2024-01-03").unwrap(),
            true,
            parse_date("2024-01-04").unwrap(),
        )
        .unwrap();

        let seen = db.habits_changed_since(partner, before).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(db.habits_shared_with(partner).unwrap().len(), 1);
    }

    #[test]
    fn file_backed_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daykeeper.db");

        let habit = Habit::new(Uuid::new_v4(), "Read", Cadence::DAILY).unwrap();
        {
            let mut db = Database::open_at(&path).unwrap();
            db.insert_habit(&habit).unwrap();
            db.mark_completion(
                habit.id,
                parse_date("2024-01-03").unwrap(),
                true,
                parse_date("2024-01-04").unwrap(),
            )
            .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let loaded = db.get_habit(habit.id).unwrap();
        assert_eq!(loaded.streak, 1);
        assert_eq!(loaded.last_completed, Some(parse_date("2024-01-03").unwrap()));
    }

    #[test]
    fn pairing_toggles_and_reactivates() {
        let db = Database::open_memory().unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let pairing = db.pair(a, b).unwrap();
        assert!(pairing.is_active);
        assert_eq!(db.partners_of(a).unwrap().len(), 1);
        assert_eq!(db.partners_of(b).unwrap().len(), 1);

        db.unpair(a, b).unwrap();
        assert!(db.partners_of(a).unwrap().is_empty());

        let again = db.pair(a, b).unwrap();
        assert_eq!(again.special_key, pairing.special_key);
        assert!(again.is_active);
    }

    #[test]
    fn pair_rejects_self() {
        let db = Database::open_memory().unwrap();
        let user = Uuid::new_v4();
        assert!(matches!(
            db.pair(user, user).unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[test]
    fn partnerships_changed_since_reports_unpair() {
        let db = Database::open_memory().unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        db.pair(a, b).unwrap();

        let before = Utc::now() - chrono::Duration::seconds(1);
        db.unpair(a, b).unwrap();

        let changed = db.partnerships_changed_since(b, before).unwrap();
        assert_eq!(changed.len(), 1);
        assert!(!changed[0].is_active);
    }
}
