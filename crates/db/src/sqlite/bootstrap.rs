//! Idempotenter Start-Bootstrap
//!
//! Stellt sicher dass Standardraum, Superadmin-Identitaet und
//! Superadmin-Privilege-Key existieren. Mehrfaches Ausfuehren legt nichts
//! doppelt an; auch ein bereits eingeloester Superadmin-Key zaehlt als
//! vorhanden.

use chrono::Utc;
use sprechraum_core::types::Rolle;
use tracing::info;
use uuid::Uuid;

use crate::models::{BootstrapErgebnis, BootstrapOptionen};
use crate::repository::DbResult;
use crate::sqlite::pool::SqliteDb;

impl SqliteDb {
    /// Fuehrt den Bootstrap in einer einzigen Transaktion aus
    pub async fn bootstrap(&self, optionen: &BootstrapOptionen) -> DbResult<BootstrapErgebnis> {
        let mut tx = self.pool.begin().await?;
        let now_str = Utc::now().to_rfc3339();
        let mut ergebnis = BootstrapErgebnis::default();

        // Standardraum
        let raum = sqlx::query(
            "INSERT INTO rooms (name, password, members, created_at) VALUES (?, ?, '[]', ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&optionen.standard_raum)
        .bind(optionen.standard_raum_passwort.as_deref())
        .bind(&now_str)
        .execute(&mut *tx)
        .await?;
        ergebnis.standard_raum_erstellt = raum.rows_affected() > 0;

        // Superadmin-Identitaet
        let superadmins: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE is_superadmin = 1")
                .fetch_one(&mut *tx)
                .await?;
        if superadmins == 0 {
            sqlx::query(
                "INSERT INTO identities (uid, display_name, role, is_superadmin, created_at)
                 VALUES (?, ?, ?, 1, ?)
                 ON CONFLICT(uid) DO UPDATE SET role = excluded.role, is_superadmin = 1",
            )
            .bind(&optionen.superadmin_uid)
            .bind(&optionen.superadmin_name)
            .bind(Rolle::Superadmin.als_str())
            .bind(&now_str)
            .execute(&mut *tx)
            .await?;
            ergebnis.superadmin_erstellt = true;
        }

        // Superadmin-Key (verbrauchte Keys zaehlen mit)
        let keys: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM privilege_keys WHERE role = ?")
            .bind(Rolle::Superadmin.als_str())
            .fetch_one(&mut *tx)
            .await?;
        if keys == 0 {
            let key = Uuid::new_v4().simple().to_string();
            sqlx::query(
                "INSERT INTO privilege_keys (key, role, single_use, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&key)
            .bind(Rolle::Superadmin.als_str())
            .bind(optionen.privilege_key_einmalig)
            .bind(&now_str)
            .execute(&mut *tx)
            .await?;
            ergebnis.superadmin_key = Some(key);
        }

        tx.commit().await?;

        if ergebnis.standard_raum_erstellt {
            info!(raum = %optionen.standard_raum, "Standardraum angelegt");
        }
        if ergebnis.superadmin_erstellt {
            info!(uid = %optionen.superadmin_uid, "Superadmin-Identitaet angelegt");
        }

        Ok(ergebnis)
    }
}
