//! SQLite-Implementierung des RoomRepository
//!
//! Mitgliederlisten werden als JSON-Array von UIDs gespeichert.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::RaumRecord;
use crate::repository::{DbResult, RoomRepository};
use crate::sqlite::parse_datetime;
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl RoomRepository for SqliteDb {
    async fn load_rooms(&self) -> DbResult<Vec<RaumRecord>> {
        let rows = sqlx::query("SELECT name, password, members, created_at FROM rooms ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_raum).collect()
    }

    async fn create_room(&self, name: &str, password: Option<&str>) -> DbResult<RaumRecord> {
        let now = Utc::now();

        sqlx::query("INSERT INTO rooms (name, password, members, created_at) VALUES (?, ?, '[]', ?)")
            .bind(name)
            .bind(password)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::Eindeutigkeit(format!("Raum '{name}' existiert bereits"))
                }
                other => DbError::Sqlx(other),
            })?;

        Ok(RaumRecord {
            name: name.to_string(),
            password: password.map(str::to_string),
            members: Vec::new(),
            created_at: now,
        })
    }

    async fn ensure_room(&self, name: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO rooms (name, password, members, created_at) VALUES (?, NULL, '[]', ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_room_password(&self, name: &str, password: Option<&str>) -> DbResult<()> {
        let affected = sqlx::query("UPDATE rooms SET password = ? WHERE name = ?")
            .bind(password)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Raum '{name}'")));
        }
        Ok(())
    }

    async fn delete_room(&self, name: &str) -> DbResult<()> {
        let affected = sqlx::query("DELETE FROM rooms WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Raum '{name}'")));
        }
        Ok(())
    }

    async fn persist_room_membership(&self, name: &str, members: &[String]) -> DbResult<()> {
        let json = serde_json::to_string(members)?;
        let affected = sqlx::query("UPDATE rooms SET members = ? WHERE name = ?")
            .bind(json)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Raum '{name}'")));
        }
        Ok(())
    }

    async fn clear_room_memberships(&self) -> DbResult<u64> {
        let affected = sqlx::query("UPDATE rooms SET members = '[]' WHERE members != '[]'")
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

fn row_to_raum(row: &sqlx::sqlite::SqliteRow) -> DbResult<RaumRecord> {
    let members_json: String = row.try_get("members")?;
    let members: Vec<String> = serde_json::from_str(&members_json)?;

    Ok(RaumRecord {
        name: row.try_get("name")?,
        password: row.try_get("password")?,
        members,
        created_at: parse_datetime(row, "created_at")?,
    })
}
