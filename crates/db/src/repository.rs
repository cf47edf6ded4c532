//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Relay-Engine von der konkreten
//! Datenbank-Implementierung. Jeder Bereich hat ein eigenes Trait; die
//! Engine haelt alles zusammen als `Arc<dyn Persistenz>`.
//!
//! Alle Methoden sind fehlbar. Ein Fehler betrifft immer nur die eine
//! Anfrage, die ihn ausgeloest hat.

use async_trait::async_trait;
use sprechraum_core::types::Rolle;

use crate::error::DbError;
use crate::models::{BanRecord, IdentitaetRecord, NachrichtRecord, PrivilegeKeyRecord, RaumRecord};

/// Result-Alias fuer alle Repository-Methoden
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://sprechraum.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sprechraum.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Identitaeten
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Laedt die Identitaet oder legt sie mit Rolle `user` an.
    /// Der Anzeigename wird bei jedem Aufruf aktualisiert.
    async fn get_or_create_identity(&self, uid: &str, display_name: &str)
        -> DbResult<IdentitaetRecord>;

    /// Juengste Identitaet mit diesem Anzeigenamen
    async fn find_identity_by_name(&self, display_name: &str)
        -> DbResult<Option<IdentitaetRecord>>;

    /// Fehler `NichtGefunden` fuer unbekannte UIDs
    async fn get_role(&self, uid: &str) -> DbResult<Rolle>;

    async fn set_role(&self, uid: &str, role: Rolle) -> DbResult<()>;
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Alle Raeume, sortiert nach Name
    async fn load_rooms(&self) -> DbResult<Vec<RaumRecord>>;

    /// Fehler `Eindeutigkeit` wenn der Name vergeben ist
    async fn create_room(&self, name: &str, password: Option<&str>) -> DbResult<RaumRecord>;

    /// Legt einen leeren Raum ohne Passwort an, falls er fehlt
    async fn ensure_room(&self, name: &str) -> DbResult<()>;

    /// Setzt oder entfernt das Passwort. Fehler `NichtGefunden` fuer unbekannte Raeume.
    async fn update_room_password(&self, name: &str, password: Option<&str>) -> DbResult<()>;

    /// Fehler `NichtGefunden` fuer unbekannte Raeume
    async fn delete_room(&self, name: &str) -> DbResult<()>;

    async fn persist_room_membership(&self, name: &str, members: &[String]) -> DbResult<()>;

    /// Leert alle persistierten Mitgliederlisten, liefert die Anzahl betroffener Raeume
    async fn clear_room_memberships(&self) -> DbResult<u64>;
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn record_message(&self, room: &str, uid: &str, text: &str)
        -> DbResult<NachrichtRecord>;

    /// Die letzten `limit` Nachrichten eines Raums, aelteste zuerst
    async fn recent_messages(&self, room: &str, limit: u32) -> DbResult<Vec<NachrichtRecord>>;
}

// ---------------------------------------------------------------------------
// Bans
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BanRepository: Send + Sync {
    async fn record_ban(&self, uid: &str, reason: &str, banned_by: Option<&str>)
        -> DbResult<BanRecord>;

    /// Juengster Ban fuer diese UID
    async fn is_banned(&self, uid: &str) -> DbResult<Option<BanRecord>>;
}

// ---------------------------------------------------------------------------
// Privilege-Keys
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PrivilegeKeyRepository: Send + Sync {
    async fn create_privilege_key(&self, role: Rolle, single_use: bool)
        -> DbResult<PrivilegeKeyRecord>;

    /// Loest einen Key fuer `uid` ein.
    ///
    /// `None` wenn der Key unbekannt oder bereits verbraucht ist. Einmalige
    /// Keys werden dabei als verbraucht markiert.
    async fn resolve_privilege_key(&self, key: &str, uid: &str) -> DbResult<Option<Rolle>>;
}

// ---------------------------------------------------------------------------
// Gesamt-Adapter
// ---------------------------------------------------------------------------

/// Alles was die Relay-Engine von der Persistenz braucht
pub trait Persistenz:
    IdentityRepository + RoomRepository + MessageRepository + BanRepository + PrivilegeKeyRepository
{
}

impl<T> Persistenz for T where
    T: IdentityRepository
        + RoomRepository
        + MessageRepository
        + BanRepository
        + PrivilegeKeyRepository
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_config_standard() {
        let cfg = DatabaseConfig::default();
        assert!(cfg.sqlite_wal);
        assert_eq!(cfg.max_verbindungen, 5);
        assert!(cfg.url.starts_with("sqlite://"));
    }
}
