//! Sprechraum Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::{Context, Result};
use sprechraum_server::{config::ServerConfig, Server};
use std::fs::OpenOptions;
use std::sync::Mutex;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("SPRECHRAUM_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    // Logging initialisieren
    logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Sprechraum Server wird initialisiert"
    );

    // Server starten
    let server = Server::neu(config);
    server.starten().await?;

    Ok(())
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
///
/// Mit `logging.datei` wird an die Datei angehaengt statt auf stdout.
fn logging_initialisieren(logging: &sprechraum_server::config::LoggingEinstellungen) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let datei = match &logging.datei {
        Some(pfad) if !pfad.is_empty() => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(pfad)
                .with_context(|| format!("Log-Datei '{pfad}' nicht beschreibbar"))?,
        ),
        _ => None,
    };

    match (logging.format.as_str(), datei) {
        ("json", Some(datei)) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(Mutex::new(datei))
            .init(),
        ("json", None) => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init(),
        (_, Some(datei)) => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(false)
            .with_writer(Mutex::new(datei))
            .init(),
        (_, None) => fmt().with_env_filter(filter).with_target(true).init(),
    }

    Ok(())
}
