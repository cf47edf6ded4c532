//! Periodische Datenbank-Sicherung
//!
//! Laeuft als eigener Task neben dem Relay. Fehlschlaege werden geloggt,
//! der Server laeuft weiter.

use sprechraum_db::SqliteDb;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SicherungEinstellungen;

/// Startet den Sicherungs-Task, sofern aktiviert
pub fn starten(
    db: SqliteDb,
    einstellungen: &SicherungEinstellungen,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !einstellungen.aktiviert {
        tracing::info!("Periodische Sicherung deaktiviert");
        return None;
    }

    let intervall = Duration::from_secs(einstellungen.intervall_minuten.max(1) * 60);
    let verzeichnis = PathBuf::from(&einstellungen.verzeichnis);
    tracing::info!(
        intervall_minuten = einstellungen.intervall_minuten,
        verzeichnis = %verzeichnis.display(),
        "Periodische Sicherung aktiviert"
    );

    Some(tokio::spawn(sicherungs_schleife(
        db,
        intervall,
        verzeichnis,
        shutdown,
    )))
}

async fn sicherungs_schleife(
    db: SqliteDb,
    intervall: Duration,
    verzeichnis: PathBuf,
    shutdown: CancellationToken,
) {
    let mut takt = tokio::time::interval(intervall);
    // Der erste Tick kommt sofort
    takt.tick().await;

    loop {
        tokio::select! {
            _ = takt.tick() => {
                if let Err(e) = db.sicherung_erstellen(&verzeichnis).await {
                    tracing::error!(fehler = %e, "Datenbank-Sicherung fehlgeschlagen");
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    tracing::debug!("Sicherungs-Task beendet");
}
