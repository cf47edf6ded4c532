//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod backup;
pub mod bans;
pub mod bootstrap;
pub mod identities;
pub mod messages;
pub mod pool;
pub mod privilege_keys;
pub mod rooms;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};
use sprechraum_core::types::Rolle;
use sqlx::Row;

use crate::error::DbError;
use crate::repository::DbResult;

// ---------------------------------------------------------------------------
// Zeilen-Hilfsfunktionen
// ---------------------------------------------------------------------------

pub(crate) fn parse_datetime(row: &sqlx::sqlite::SqliteRow, col: &str) -> DbResult<DateTime<Utc>> {
    let s: String = row.try_get(col)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige DateTime in '{col}': {e}")))
}

pub(crate) fn parse_opt_datetime(
    row: &sqlx::sqlite::SqliteRow,
    col: &str,
) -> DbResult<Option<DateTime<Utc>>> {
    let s: Option<String> = row.try_get(col)?;
    s.as_deref()
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::intern(format!("Ungueltige DateTime in '{col}': {e}")))
        })
        .transpose()
}

pub(crate) fn parse_uuid(row: &sqlx::sqlite::SqliteRow, col: &str) -> DbResult<uuid::Uuid> {
    let s: String = row.try_get(col)?;
    uuid::Uuid::parse_str(&s)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID in '{col}': {e}")))
}

pub(crate) fn parse_rolle(row: &sqlx::sqlite::SqliteRow, col: &str) -> DbResult<Rolle> {
    let s: String = row.try_get(col)?;
    s.parse()
        .map_err(|e: sprechraum_core::SprechraumError| DbError::UngueltigeDaten(e.to_string()))
}
