//! SQLite-Implementierung des IdentityRepository

use async_trait::async_trait;
use chrono::Utc;
use sprechraum_core::types::Rolle;
use sqlx::Row;

use crate::error::DbError;
use crate::models::IdentitaetRecord;
use crate::repository::{DbResult, IdentityRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{parse_datetime, parse_rolle};

#[async_trait]
impl IdentityRepository for SqliteDb {
    async fn get_or_create_identity(
        &self,
        uid: &str,
        display_name: &str,
    ) -> DbResult<IdentitaetRecord> {
        let now_str = Utc::now().to_rfc3339();

        // Neue Identitaet anlegen oder nur den Anzeigenamen nachziehen
        sqlx::query(
            "INSERT INTO identities (uid, display_name, role, is_superadmin, created_at)
             VALUES (?, ?, 'user', 0, ?)
             ON CONFLICT(uid) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(uid)
        .bind(display_name)
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT uid, display_name, credential, role, is_superadmin, created_at
             FROM identities WHERE uid = ?",
        )
        .bind(uid)
        .fetch_one(&self.pool)
        .await?;

        row_to_identitaet(&row)
    }

    async fn find_identity_by_name(
        &self,
        display_name: &str,
    ) -> DbResult<Option<IdentitaetRecord>> {
        let row = sqlx::query(
            "SELECT uid, display_name, credential, role, is_superadmin, created_at
             FROM identities WHERE display_name = ?
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_identitaet(&r)).transpose()
    }

    async fn get_role(&self, uid: &str) -> DbResult<Rolle> {
        let row = sqlx::query("SELECT role FROM identities WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::nicht_gefunden(format!("Identitaet '{uid}'")))?;

        parse_rolle(&row, "role")
    }

    async fn set_role(&self, uid: &str, role: Rolle) -> DbResult<()> {
        let affected = sqlx::query("UPDATE identities SET role = ? WHERE uid = ?")
            .bind(role.als_str())
            .bind(uid)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Identitaet '{uid}'")));
        }
        Ok(())
    }
}

pub(crate) fn row_to_identitaet(row: &sqlx::sqlite::SqliteRow) -> DbResult<IdentitaetRecord> {
    let is_superadmin: i64 = row.try_get("is_superadmin")?;
    Ok(IdentitaetRecord {
        uid: row.try_get("uid")?,
        display_name: row.try_get("display_name")?,
        credential: row.try_get("credential")?,
        role: parse_rolle(row, "role")?,
        is_superadmin: is_superadmin != 0,
        created_at: parse_datetime(row, "created_at")?,
    })
}
