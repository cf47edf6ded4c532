//! sprechraum-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod sicherung;
pub mod tls;

use anyhow::{Context, Result};
use config::ServerConfig;
use sprechraum_db::{RoomRepository, SqliteDb};
use sprechraum_relay::{RelayServer, RelayState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let shutdown = CancellationToken::new();

        let signal = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Signal-Handler fehlgeschlagen"),
            }
            signal.cancel();
        });

        let adresse = self.config.bind_adresse();
        let listener = TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf {adresse} fehlgeschlagen"))?;

        self.laufen(listener, shutdown).await
    }

    /// Betreibt den Server auf einem bereits gebundenen Listener bis `shutdown`
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen, Migrationen, Bootstrap
    /// 2. Mitgliederlisten aus dem letzten Lauf leeren
    /// 3. Raum-Verzeichnis laden
    /// 4. Sicherungs-Task und optional TLS
    /// 5. Accept-Loop bis zum Shutdown
    pub async fn laufen(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let config = self.config;
        let bind_addr = listener.local_addr()?;

        tracing::info!(
            server_name = %config.server.name,
            adresse = %bind_addr,
            "Server startet"
        );

        let db = SqliteDb::oeffnen(&config.datenbank_config())
            .await
            .with_context(|| format!("Datenbank '{}' nicht verfuegbar", config.datenbank.url))?;

        let ergebnis = db
            .bootstrap(&config.bootstrap_optionen())
            .await
            .context("Bootstrap fehlgeschlagen")?;
        // Einzige Stelle, an der der Key ausgegeben wird
        if let Some(key) = &ergebnis.superadmin_key {
            tracing::warn!(
                key = %key,
                einmalig = config.bootstrap.privilege_key_einmalig,
                "Superadmin-Privilege-Key erzeugt. Mit 'use_privilege_key' einloesen."
            );
        }

        let geleert = db
            .clear_room_memberships()
            .await
            .context("Mitgliederlisten konnten nicht zurueckgesetzt werden")?;
        tracing::debug!(raeume = geleert, "Persistierte Mitgliederlisten geleert");

        let state = RelayState::neu(config.relay_config(), Arc::new(db.clone()));
        state
            .raeume_laden()
            .await
            .context("Raeume konnten nicht geladen werden")?;

        let sicherung = sicherung::starten(db.clone(), &config.sicherung, shutdown.clone());

        let mut relay = RelayServer::neu(Arc::clone(&state), bind_addr);
        if config.sicherheit.tls_aktiviert {
            relay = relay.mit_tls(tls::acceptor_laden(&config.sicherheit)?);
        }

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        relay.annehmen(listener, shutdown.clone()).await?;

        // Falls die Accept-Loop aus anderem Grund endet
        shutdown.cancel();
        if let Some(task) = sicherung {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Sicherungs-Task abgebrochen");
            }
        }

        db.schliessen().await;
        tracing::info!(uptime_sek = state.uptime_sek(), "Server beendet");
        Ok(())
    }
}
