//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use sprechraum_db::models::BootstrapOptionen;
use sprechraum_db::DatabaseConfig;
use sprechraum_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use sprechraum_relay::RelayConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// TLS vor dem WebSocket-Handshake
    pub sicherheit: SicherheitEinstellungen,
    pub rate_limit: RateLimitEinstellungen,
    pub raeume: RaumEinstellungen,
    /// Periodische Sicherung der SQLite-Datei
    pub sicherung: SicherungEinstellungen,
    /// Erststart: Superadmin und Privilege-Key
    pub bootstrap: BootstrapEinstellungen,
    pub verbindung: VerbindungEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (erscheint in `room_list`)
    pub name: String,
    pub bind_adresse: String,
    pub port: u16,
    /// Server-Passwort (leer = kein Passwort)
    pub passwort: Option<String>,
    /// Erste Nachricht nach einem erfolgreichen Join
    pub willkommen: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Sprechraum Server".into(),
            bind_adresse: "0.0.0.0".into(),
            port: 8765,
            passwort: None,
            willkommen: "Welcome to the server! Enjoy your stay.".into(),
            max_clients: 100,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Journal aktivieren
    pub wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://sprechraum.db".into(),
            max_verbindungen: 5,
            wal: true,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
    /// Log-Datei-Pfad (leer = nur stdout)
    pub datei: Option<String>,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            datei: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitEinstellungen {
    pub tls_aktiviert: bool,
    /// PEM-Zertifikatskette
    pub tls_zertifikat: String,
    /// PEM-Schluessel (PKCS#8, PKCS#1 oder SEC1)
    pub tls_schluessel: String,
}

impl Default for SicherheitEinstellungen {
    fn default() -> Self {
        Self {
            tls_aktiviert: false,
            tls_zertifikat: "cert.pem".into(),
            tls_schluessel: "key.pem".into(),
        }
    }
}

/// Token-Bucket pro Verbindung (nur Steuerungsnachrichten)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitEinstellungen {
    pub aktiviert: bool,
    pub anfragen_pro_minute: u32,
}

impl Default for RateLimitEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            anfragen_pro_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaumEinstellungen {
    /// Raum fuer einen Join ohne Raumangabe; kann nicht geloescht werden
    pub standard_raum: String,
    /// Wird nur beim erstmaligen Anlegen des Standardraums gesetzt
    pub standard_raum_passwort: Option<String>,
}

impl Default for RaumEinstellungen {
    fn default() -> Self {
        Self {
            standard_raum: "Lobby".into(),
            standard_raum_passwort: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherungEinstellungen {
    pub aktiviert: bool,
    pub intervall_minuten: u64,
    pub verzeichnis: String,
}

impl Default for SicherungEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            intervall_minuten: 1440,
            verzeichnis: "backups".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapEinstellungen {
    pub superadmin_uid: String,
    pub superadmin_name: String,
    pub privilege_key_einmalig: bool,
}

impl Default for BootstrapEinstellungen {
    fn default() -> Self {
        Self {
            superadmin_uid: "superadmin".into(),
            superadmin_name: "Superadmin".into(),
            privilege_key_einmalig: true,
        }
    }
}

/// Grenzen pro WebSocket-Verbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungEinstellungen {
    /// Groesster akzeptierter Frame in Bytes
    pub max_frame_bytes: usize,
    /// Kapazitaet der Send-Queue pro Session
    pub send_queue_groesse: usize,
}

impl Default for VerbindungEinstellungen {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            send_queue_groesse: 256,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer den WebSocket-Listener zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.wal,
        }
    }

    pub fn bootstrap_optionen(&self) -> BootstrapOptionen {
        BootstrapOptionen {
            standard_raum: self.raeume.standard_raum.clone(),
            standard_raum_passwort: leer_als_none(&self.raeume.standard_raum_passwort),
            superadmin_uid: self.bootstrap.superadmin_uid.clone(),
            superadmin_name: self.bootstrap.superadmin_name.clone(),
            privilege_key_einmalig: self.bootstrap.privilege_key_einmalig,
        }
    }

    /// Relay-Parameter aus den Abschnitten `server`, `raeume`, `rate_limit`
    /// und `verbindung`
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            server_name: self.server.name.clone(),
            server_passwort: leer_als_none(&self.server.passwort),
            willkommen: self.server.willkommen.clone(),
            max_clients: self.server.max_clients,
            standard_raum: self.raeume.standard_raum.clone(),
            anfragen_pro_minute: self
                .rate_limit
                .aktiviert
                .then_some(self.rate_limit.anfragen_pro_minute),
            max_frame_bytes: self.verbindung.max_frame_bytes,
            send_queue_groesse: self.verbindung.send_queue_groesse,
        }
    }
}

fn leer_als_none(wert: &Option<String>) -> Option<String> {
    wert.as_ref().filter(|w| !w.is_empty()).cloned()
}
