//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const TARGET_COLUMNS: &str = "id, url, active, created_at";
const RESULT_COLUMNS: &str =
    "target_id, status_code, html_size, link_count, response_time_ms, checked_at, error";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Target CRUD ---

    /// Add a new target and return its ID. URLs are unique.
    pub fn add_target(&self, target: &mut Target) -> Result<i64, DbError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO targets (url, active, created_at) VALUES (?1, ?2, ?3)",
            params![target.url, target.active, format_db_time(target.created_at)],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(DbError::Conflict(format!("url already tracked: {}", target.url)));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        target.id = id;
        Ok(id)
    }

    /// Update the url and active flag of an existing target.
    pub fn update_target(&self, target: &Target) -> Result<(), DbError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE targets SET url = ?1, active = ?2 WHERE id = ?3",
            params![target.url, target.active, target.id],
        );

        match changed {
            Ok(0) => Err(DbError::NotFound),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::Conflict(format!("url already tracked: {}", target.url)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get all targets.
    pub fn get_targets(&self) -> Result<Vec<Target>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {TARGET_COLUMNS} FROM targets ORDER BY id"))?;
        let targets = stmt
            .query_map([], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(targets)
    }

    /// Get all targets the scheduler should consider.
    pub fn get_active_targets(&self) -> Result<Vec<Target>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TARGET_COLUMNS} FROM targets WHERE active = 1 ORDER BY id"
        ))?;
        let targets = stmt
            .query_map([], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(targets)
    }

    /// Get a target by ID.
    pub fn get_target(&self, id: i64) -> Result<Target, DbError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {TARGET_COLUMNS} FROM targets WHERE id = ?1"),
            params![id],
            target_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete a target and its results.
    pub fn delete_target(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM check_results WHERE target_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM targets WHERE id = ?1", params![id])?;
        tx.commit()?;

        if removed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- Check result history ---

    /// Append one result to the history table.
    pub fn append_check_result(&self, result: &CheckResult) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO check_results ({RESULT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                result.target_id,
                result.status_code,
                result.html_size as i64,
                result.link_count as i64,
                result.response_time_ms as i64,
                format_db_time(result.checked_at),
                result.error,
            ],
        )?;
        Ok(())
    }

    /// Most recent history row for a target.
    pub fn latest_check_result(&self, target_id: i64) -> Result<Option<CheckResult>, DbError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!(
                    "SELECT {RESULT_COLUMNS} FROM check_results
                     WHERE target_id = ?1 ORDER BY checked_at DESC, id DESC LIMIT 1"
                ),
                params![target_id],
                result_from_row,
            )
            .optional()?;
        Ok(result)
    }

    /// History rows for a target, newest first.
    pub fn get_check_results(&self, target_id: i64, limit: u32) -> Result<Vec<CheckResult>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESULT_COLUMNS} FROM check_results
             WHERE target_id = ?1 ORDER BY checked_at DESC, id DESC LIMIT ?2"
        ))?;
        let results = stmt
            .query_map(params![target_id, limit], result_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(results)
    }

    // --- Inline latest result ---

    /// Overwrite the latest-result fields stored on the target row.
    pub fn update_latest_check(&self, result: &CheckResult) -> Result<(), DbError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE targets SET last_status_code = ?1, last_html_size = ?2, last_link_count = ?3,
             last_response_time_ms = ?4, last_checked_at = ?5, last_error = ?6 WHERE id = ?7",
            params![
                result.status_code,
                result.html_size as i64,
                result.link_count as i64,
                result.response_time_ms as i64,
                format_db_time(result.checked_at),
                result.error,
                result.target_id,
            ],
        )?;

        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Latest-result fields stored on the target row, if it was ever checked.
    pub fn get_inline_latest(&self, target_id: i64) -> Result<Option<CheckResult>, DbError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, last_status_code, last_html_size, last_link_count,
                 last_response_time_ms, last_checked_at, last_error
                 FROM targets WHERE id = ?1",
                params![target_id],
                |row| {
                    let checked_at: Option<String> = row.get(5)?;
                    let Some(checked_at) = checked_at else {
                        return Ok(None);
                    };
                    let checked_at = parse_checked_at(5, &checked_at)?;
                    Ok(Some(CheckResult {
                        target_id: row.get(0)?,
                        status_code: row.get::<_, Option<i64>>(1)?.unwrap_or(0) as u16,
                        html_size: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                        link_count: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                        response_time_ms: row.get::<_, Option<i64>>(4)?.unwrap_or(0) as u64,
                        checked_at,
                        error: row.get(6)?,
                    }))
                },
            )
            .optional()?;

        row.ok_or(DbError::NotFound)
    }
}

fn target_from_row(row: &Row<'_>) -> SqlResult<Target> {
    let created_at: String = row.get(3)?;
    Ok(Target {
        id: row.get(0)?,
        url: row.get(1)?,
        active: row.get(2)?,
        created_at: parse_db_time(&created_at).unwrap_or_else(Utc::now),
    })
}

fn result_from_row(row: &Row<'_>) -> SqlResult<CheckResult> {
    let checked_at: String = row.get(5)?;
    Ok(CheckResult {
        target_id: row.get(0)?,
        status_code: row.get::<_, i64>(1)? as u16,
        html_size: row.get::<_, i64>(2)? as u64,
        link_count: row.get::<_, i64>(3)? as u64,
        response_time_ms: row.get::<_, i64>(4)? as u64,
        checked_at: parse_checked_at(5, &checked_at)?,
        error: row.get(6)?,
    })
}

/// Result timestamps drive due checks, so an unreadable one is an error
/// rather than a guess.
fn parse_checked_at(idx: usize, s: &str) -> SqlResult<DateTime<Utc>> {
    parse_db_time(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid checked_at timestamp: {:?}", s).into(),
        )
    })
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        TIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}
