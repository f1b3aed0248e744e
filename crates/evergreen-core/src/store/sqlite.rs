//! SQLite-backed session and account storage.
//!
//! Provides persistent storage for:
//! - Focus session records (the local write path for the ledger)
//! - Local user accounts
//! - Key-value store for application state (machine snapshots, tokens)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{migrations, SessionStore};
use crate::error::StoreError;
use crate::ledger::{FocusSession, SessionOutcome};

/// Raw account row. AuthService converts these into public profiles;
/// password material never leaves this layer otherwise.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub password_salt: Option<String>,
    pub password_hash: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

/// SQLite database for sessions, users, and app state.
///
/// The connection sits behind a mutex so the store can be shared across
/// the ledger, the auth service, and the tick task.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `~/.config/evergreen-focus/evergreen.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = super::data_dir()
            .map_err(|e| StoreError::QueryFailed(format!("data dir: {e}")))?
            .join("evergreen.db");
        Self::open_at(&path)
    }

    /// Open the database at a specific path (used by tests and tooling).
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        migrations::migrate(&conn)
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests, ephemeral runs).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        migrations::migrate(&conn)
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Locked)
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── User accounts ────────────────────────────────────────────────

    pub fn insert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO users (id, email, display_name, photo_url, password_salt,
                                password_hash, is_anonymous, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.email,
                user.display_name,
                user.photo_url,
                user.password_salt,
                user.password_hash,
                user.is_anonymous,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.query_user("SELECT id, email, display_name, photo_url, password_salt,
                                password_hash, is_anonymous, created_at
                         FROM users WHERE id = ?1", id)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.query_user("SELECT id, email, display_name, photo_url, password_salt,
                                password_hash, is_anonymous, created_at
                         FROM users WHERE email = ?1", email)
    }

    fn query_user(&self, sql: &str, arg: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let result = stmt.query_row(params![arg], row_to_user);
        match result {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn update_user_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE users SET display_name = ?2, photo_url = ?3 WHERE id = ?1",
            params![id, display_name, photo_url],
        )?;
        Ok(())
    }

    pub fn update_user_password(
        &self,
        id: &str,
        salt: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE users SET password_salt = ?2, password_hash = ?3 WHERE id = ?1",
            params![id, salt, hash],
        )?;
        Ok(())
    }

    pub fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

impl SessionStore for SqliteStore {
    fn insert_session(&self, session: &FocusSession) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO sessions
                (id, owner_id, outcome, duration_min, recorded_at, time_planted_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.owner_id,
                session.outcome.as_str(),
                session.duration_min,
                session.recorded_at.to_rfc3339(),
                session.time_planted_secs,
            ],
        )?;
        Ok(())
    }

    fn delete_session(&self, owner_id: &str, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "DELETE FROM sessions WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(changed > 0)
    }

    fn sessions_for_owner(&self, owner_id: &str) -> Result<Vec<FocusSession>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, outcome, duration_min, recorded_at, time_planted_secs
             FROM sessions
             WHERE owner_id = ?1
             ORDER BY recorded_at DESC",
        )?;
        let rows = stmt.query_map(params![owner_id], row_to_session)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    fn delete_sessions_for_owner(&self, owner_id: &str) -> Result<u64, StoreError> {
        let changed = self.conn()?.execute(
            "DELETE FROM sessions WHERE owner_id = ?1",
            params![owner_id],
        )?;
        Ok(changed as u64)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<FocusSession> {
    let outcome_str: String = row.get(2)?;
    let outcome = SessionOutcome::parse(&outcome_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown outcome '{outcome_str}'").into(),
        )
    })?;
    Ok(FocusSession {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        outcome,
        duration_min: row.get(3)?,
        recorded_at: parse_timestamp(&row.get::<_, String>(4)?, 4)?,
        time_planted_secs: row.get(5)?,
    })
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        photo_url: row.get(3)?,
        password_salt: row.get(4)?,
        password_hash: row.get(5)?,
        is_anonymous: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?, 7)?,
    })
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
