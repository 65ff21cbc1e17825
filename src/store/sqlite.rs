//! SQLite store
//!
//! Tables: users, habits, logs, models, pet_states, diary_entries, social_groups and
//! group_memberships. Timestamps are stored as UTC nanoseconds so every record
//! reads back exactly as it was written. Model parameters are stored as JSON
//! text; a row whose JSON no longer decodes is reported as an absent model.

use super::{new_id, Store};
use crate::error::StoreError;
use crate::pet::PetState;
use crate::types::{
    DiaryDraft, DiaryEntry, EventRecord, Group, GroupMembership, Habit, ModelRecord,
    NormalizationParams, SeparatorParams, User,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            style TEXT NOT NULL DEFAULT 'encourager',
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            target_per_day INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_habits_user_id ON habits(user_id);

        CREATE TABLE IF NOT EXISTS logs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            habit_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            success INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
            FOREIGN KEY (habit_id) REFERENCES habits (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_logs_user_habit_ts ON logs(user_id, habit_id, timestamp);

        CREATE TABLE IF NOT EXISTS models (
            user_id TEXT PRIMARY KEY,
            scaler_params TEXT NOT NULL,
            model_params TEXT NOT NULL,
            last_trained INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS pet_states (
            user_id TEXT PRIMARY KEY,
            mood TEXT,
            hunger INTEGER NOT NULL DEFAULT 50,
            energy INTEGER NOT NULL DEFAULT 50,
            affection INTEGER NOT NULL DEFAULT 50,
            last_updated INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS diary_entries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT,
            text TEXT,
            mood TEXT,
            audio_path TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_diary_user_created ON diary_entries(user_id, created_at);

        CREATE TABLE IF NOT EXISTS social_groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS group_memberships (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            joined_at INTEGER NOT NULL,
            UNIQUE (group_id, user_id),
            FOREIGN KEY (group_id) REFERENCES social_groups (id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_memberships_user ON group_memberships(user_id);",
    )?;
    Ok(())
}

/// Timestamp as stored: nanoseconds since the Unix epoch
fn nanos(at: &DateTime<Utc>) -> Result<i64, StoreError> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::TimestampOutOfRange(at.to_rfc3339()))
}

/// Read a nanosecond timestamp column
fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ns: i64 = row.get(idx)?;
    Ok(DateTime::<Utc>::from_timestamp_nanos(ns))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        style: row.get(2)?,
        created_at: ts(row, 3)?,
    })
}

fn habit_from_row(row: &Row<'_>) -> rusqlite::Result<Habit> {
    Ok(Habit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        target_per_day: row.get(3)?,
        created_at: ts(row, 4)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        timestamp: ts(row, 0)?,
        success: row.get::<_, i64>(1)? != 0,
    })
}

fn diary_from_row(row: &Row<'_>) -> rusqlite::Result<DiaryEntry> {
    Ok(DiaryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        text: row.get(3)?,
        mood: row.get(4)?,
        audio_path: row.get(5)?,
        created_at: ts(row, 6)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: ts(row, 3)?,
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<GroupMembership> {
    Ok(GroupMembership {
        id: row.get(0)?,
        group_id: row.get(1)?,
        user_id: row.get(2)?,
        joined_at: ts(row, 3)?,
    })
}

impl Store for SqliteStore {
    fn create_user(&self, name: &str, style: &str) -> Result<User, StoreError> {
        let user = User {
            id: new_id(),
            name: name.to_string(),
            style: style.to_string(),
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO users (id, name, style, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.name, user.style, nanos(&user.created_at)?],
        )?;
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, name, style, created_at FROM users WHERE id = ?1",
                [user_id],
                user_from_row,
            )
            .optional()?)
    }

    fn update_style(&self, user_id: &str, style: &str) -> Result<Option<User>, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE users SET style = ?1 WHERE id = ?2",
            params![style, user_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_user(user_id)
    }

    fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM users WHERE id = ?1", [user_id])?;
        Ok(deleted > 0)
    }

    fn add_habit(
        &self,
        user_id: &str,
        name: &str,
        target_per_day: u32,
    ) -> Result<Habit, StoreError> {
        let habit = Habit {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            target_per_day,
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO habits (id, user_id, name, target_per_day, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                habit.id,
                habit.user_id,
                habit.name,
                habit.target_per_day,
                nanos(&habit.created_at)?
            ],
        )?;
        Ok(habit)
    }

    fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, user_id, name, target_per_day, created_at FROM habits WHERE id = ?1",
                [habit_id],
                habit_from_row,
            )
            .optional()?)
    }

    fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, target_per_day, created_at
             FROM habits WHERE user_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let habits = stmt
            .query_map([user_id], habit_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    fn append_event(
        &self,
        user_id: &str,
        habit_id: &str,
        event: EventRecord,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let owned: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM habits WHERE id = ?1 AND user_id = ?2)",
            params![habit_id, user_id],
            |row| row.get(0),
        )?;
        if !owned {
            return Err(StoreError::NotFound(format!("habit {habit_id}")));
        }
        conn.execute(
            "INSERT INTO logs (id, user_id, habit_id, timestamp, success)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new_id(),
                user_id,
                habit_id,
                nanos(&event.timestamp)?,
                event.success as i64
            ],
        )?;
        Ok(())
    }

    fn get_events(&self, user_id: &str, habit_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, success FROM logs
             WHERE user_id = ?1 AND habit_id = ?2
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let events = stmt
            .query_map([user_id, habit_id], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn recent_events(
        &self,
        user_id: &str,
        habit_id: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, success FROM logs
             WHERE user_id = ?1 AND habit_id = ?2
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut events = stmt
            .query_map(params![user_id, habit_id, limit], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        events.reverse();
        Ok(events)
    }

    fn get_model(&self, user_id: &str) -> Result<Option<ModelRecord>, StoreError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT scaler_params, model_params, last_trained FROM models WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        ts(row, 2)?,
                    ))
                },
            )
            .optional()?;

        let Some((scaler, model, trained_at)) = row else {
            return Ok(None);
        };

        let decoded = serde_json::from_str::<NormalizationParams>(&scaler).and_then(|n| {
            serde_json::from_str::<SeparatorParams>(&model).map(|s| (n, s))
        });
        match decoded {
            Ok((normalization, separator)) => Ok(Some(ModelRecord {
                user_id: user_id.to_string(),
                normalization,
                separator,
                trained_at,
            })),
            Err(e) => {
                log::warn!("stored model for user {user_id} does not decode: {e}");
                Ok(None)
            }
        }
    }

    fn put_model(&self, record: &ModelRecord) -> Result<(), StoreError> {
        let scaler = serde_json::to_string(&record.normalization)?;
        let model = serde_json::to_string(&record.separator)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO models (user_id, scaler_params, model_params, last_trained)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.user_id,
                scaler,
                model,
                nanos(&record.trained_at)?
            ],
        )?;
        Ok(())
    }

    fn get_pet_state(&self, user_id: &str) -> Result<Option<PetState>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT user_id, mood, hunger, energy, affection, last_updated
                 FROM pet_states WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(PetState {
                        user_id: row.get(0)?,
                        mood: row.get(1)?,
                        hunger: row.get(2)?,
                        energy: row.get(3)?,
                        affection: row.get(4)?,
                        last_updated: ts(row, 5)?,
                    })
                },
            )
            .optional()?)
    }

    fn put_pet_state(&self, state: &PetState) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO pet_states
                (user_id, mood, hunger, energy, affection, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                state.user_id,
                state.mood,
                state.hunger,
                state.energy,
                state.affection,
                nanos(&state.last_updated)?
            ],
        )?;
        Ok(())
    }

    fn add_diary_entry(
        &self,
        user_id: &str,
        draft: &DiaryDraft,
    ) -> Result<DiaryEntry, StoreError> {
        let conn = self.conn()?;
        let user_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            [user_id],
            |row| row.get(0),
        )?;
        if !user_exists {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }

        let entry = DiaryEntry {
            id: new_id(),
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            text: draft.text.clone(),
            mood: draft.mood.clone(),
            audio_path: draft.audio_path.clone(),
            created_at: draft.created_at.unwrap_or_else(Utc::now),
        };
        conn.execute(
            "INSERT INTO diary_entries (id, user_id, title, text, mood, audio_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.user_id,
                entry.title,
                entry.text,
                entry.mood,
                entry.audio_path,
                nanos(&entry.created_at)?
            ],
        )?;
        Ok(entry)
    }

    fn list_diary_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, text, mood, audio_path, created_at
             FROM diary_entries WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![user_id, limit], diary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group, StoreError> {
        let group = Group {
            id: new_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO social_groups (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id,
                group.name,
                group.description,
                nanos(&group.created_at)?
            ],
        )?;
        Ok(group)
    }

    fn get_group(&self, group_id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, name, description, created_at FROM social_groups WHERE id = ?1",
                [group_id],
                group_from_row,
            )
            .optional()?)
    }

    fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at FROM social_groups
             ORDER BY created_at DESC, id ASC",
        )?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn join_group(&self, user_id: &str, group_id: &str) -> Result<GroupMembership, StoreError> {
        let conn = self.conn()?;
        let (user_exists, group_exists): (bool, bool) = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1),
                    EXISTS(SELECT 1 FROM social_groups WHERE id = ?2)",
            params![user_id, group_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if !user_exists {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        if !group_exists {
            return Err(StoreError::NotFound(format!("group {group_id}")));
        }

        // A repeated join keeps the original membership row
        conn.execute(
            "INSERT OR IGNORE INTO group_memberships (id, group_id, user_id, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), group_id, user_id, nanos(&Utc::now())?],
        )?;
        Ok(conn.query_row(
            "SELECT id, group_id, user_id, joined_at FROM group_memberships
             WHERE group_id = ?1 AND user_id = ?2",
            params![group_id, user_id],
            membership_from_row,
        )?)
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT g.id, g.name, g.description, g.created_at
             FROM group_memberships m JOIN social_groups g ON g.id = m.group_id
             WHERE m.user_id = ?1
             ORDER BY m.joined_at ASC, m.rowid ASC",
        )?;
        let groups = stmt
            .query_map([user_id], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}
