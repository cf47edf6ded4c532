//! SQLite-Implementierung des BanRepository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::models::BanRecord;
use crate::repository::{BanRepository, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_datetime, parse_uuid};

#[async_trait]
impl BanRepository for SqliteDb {
    async fn record_ban(
        &self,
        uid: &str,
        reason: &str,
        banned_by: Option<&str>,
    ) -> DbResult<BanRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO bans (id, uid, reason, banned_by, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(uid)
        .bind(reason)
        .bind(banned_by)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(BanRecord {
            id,
            uid: uid.to_string(),
            reason: reason.to_string(),
            banned_by: banned_by.map(str::to_string),
            created_at: now,
        })
    }

    async fn is_banned(&self, uid: &str) -> DbResult<Option<BanRecord>> {
        let row = sqlx::query(
            "SELECT id, uid, reason, banned_by, created_at
             FROM bans WHERE uid = ?
             ORDER BY rowid DESC LIMIT 1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_ban(&r)).transpose()
    }
}

fn row_to_ban(row: &sqlx::sqlite::SqliteRow) -> DbResult<BanRecord> {
    Ok(BanRecord {
        id: parse_uuid(row, "id")?,
        uid: row.try_get("uid")?,
        reason: row.try_get("reason")?,
        banned_by: row.try_get("banned_by")?,
        created_at: parse_datetime(row, "created_at")?,
    })
}
