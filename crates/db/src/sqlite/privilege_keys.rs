//! SQLite-Implementierung des PrivilegeKeyRepository

use async_trait::async_trait;
use chrono::Utc;
use sprechraum_core::types::Rolle;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use crate::models::PrivilegeKeyRecord;
use crate::repository::{DbResult, PrivilegeKeyRepository};
use crate::sqlite::parse_rolle;
use crate::sqlite::pool::SqliteDb;

#[async_trait]
impl PrivilegeKeyRepository for SqliteDb {
    async fn create_privilege_key(
        &self,
        role: Rolle,
        single_use: bool,
    ) -> DbResult<PrivilegeKeyRecord> {
        let key = Uuid::new_v4().simple().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO privilege_keys (key, role, single_use, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&key)
        .bind(role.als_str())
        .bind(single_use)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(PrivilegeKeyRecord {
            key,
            role,
            single_use,
            used_by: None,
            used_at: None,
            created_at: now,
        })
    }

    async fn resolve_privilege_key(&self, key: &str, uid: &str) -> DbResult<Option<Rolle>> {
        let row = sqlx::query("SELECT role, single_use FROM privilege_keys WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role = parse_rolle(&row, "role")?;
        let single_use: bool = row.try_get("single_use")?;
        let now_str = Utc::now().to_rfc3339();

        if single_use {
            // Bedingtes Update: nur eine von mehreren gleichzeitigen Einloesungen gewinnt
            let affected = sqlx::query(
                "UPDATE privilege_keys SET used_by = ?, used_at = ?
                 WHERE key = ? AND used_by IS NULL",
            )
            .bind(uid)
            .bind(&now_str)
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if affected == 0 {
                debug!(uid = %uid, "Privilege-Key bereits verbraucht");
                return Ok(None);
            }
        } else {
            sqlx::query("UPDATE privilege_keys SET used_by = ?, used_at = ? WHERE key = ?")
                .bind(uid)
                .bind(&now_str)
                .bind(key)
                .execute(&self.pool)
                .await?;
        }

        Ok(Some(role))
    }
}
