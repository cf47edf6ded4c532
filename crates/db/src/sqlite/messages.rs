//! SQLite-Implementierung des MessageRepository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use crate::models::NachrichtRecord;
use crate::repository::{DbResult, MessageRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_datetime, parse_uuid};

#[async_trait]
impl MessageRepository for SqliteDb {
    async fn record_message(&self, room: &str, uid: &str, text: &str) -> DbResult<NachrichtRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query("INSERT INTO messages (id, room, uid, text, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(room)
            .bind(uid)
            .bind(text)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(NachrichtRecord {
            id,
            room: room.to_string(),
            uid: uid.to_string(),
            text: text.to_string(),
            created_at: now,
        })
    }

    async fn recent_messages(&self, room: &str, limit: u32) -> DbResult<Vec<NachrichtRecord>> {
        // rowid haelt die Einfuegereihenfolge auch bei gleichem Zeitstempel
        let rows = sqlx::query(
            "SELECT id, room, uid, text, created_at FROM (
                 SELECT rowid AS r, id, room, uid, text, created_at
                 FROM messages WHERE room = ?
                 ORDER BY rowid DESC LIMIT ?
             ) ORDER BY r ASC",
        )
        .bind(room)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_nachricht).collect()
    }
}

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    Ok(NachrichtRecord {
        id: parse_uuid(row, "id")?,
        room: row.try_get("room")?,
        uid: row.try_get("uid")?,
        text: row.try_get("text")?,
        created_at: parse_datetime(row, "created_at")?,
    })
}
