//! Sicherungen der SQLite-Datenbank via `VACUUM INTO`
//!
//! `VACUUM INTO` schreibt eine konsistente Kopie waehrend der Pool
//! weiterlaeuft, auch im WAL-Modus.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::repository::DbResult;
use crate::sqlite::pool::SqliteDb;

impl SqliteDb {
    /// Schreibt eine Sicherung nach `verzeichnis/backup_<zeitstempel>.db`
    pub async fn sicherung_erstellen(&self, verzeichnis: &Path) -> DbResult<PathBuf> {
        tokio::fs::create_dir_all(verzeichnis).await?;

        let dateiname = format!("backup_{}.db", Utc::now().format("%Y%m%d%H%M%S%3f"));
        let ziel = verzeichnis.join(dateiname);

        sqlx::query("VACUUM INTO ?")
            .bind(ziel.to_string_lossy().into_owned())
            .execute(&self.pool)
            .await?;

        info!(datei = %ziel.display(), "Datenbank gesichert");
        Ok(ziel)
    }
}
