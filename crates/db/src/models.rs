//! Datenbankmodelle fuer Sprechraum
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Laufzeit-Typen der Relay-Engine getrennt und dienen als
//! reine Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprechraum_core::types::Rolle;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identitaeten
// ---------------------------------------------------------------------------

/// Dauerhafter Account, unabhaengig von einer konkreten Verbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitaetRecord {
    pub uid: String,
    pub display_name: String,
    pub credential: Option<String>,
    pub role: Rolle,
    pub is_superadmin: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

/// Raum-Datensatz
///
/// `members` enthaelt die UIDs der zuletzt persistierten Mitglieder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaumRecord {
    pub name: String,
    pub password: Option<String>,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NachrichtRecord {
    pub id: Uuid,
    pub room: String,
    pub uid: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Bans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub id: Uuid,
    pub uid: String,
    pub reason: String,
    /// UID des bannenden Admins
    pub banned_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Privilege-Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeKeyRecord {
    pub key: String,
    pub role: Rolle,
    pub single_use: bool,
    pub used_by: Option<String>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PrivilegeKeyRecord {
    /// Ein einmaliger Key ist nach der ersten Einloesung verbraucht
    pub fn ist_verbraucht(&self) -> bool {
        self.single_use && self.used_by.is_some()
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Eingaben fuer den Start-Bootstrap
#[derive(Debug, Clone)]
pub struct BootstrapOptionen {
    pub standard_raum: String,
    pub standard_raum_passwort: Option<String>,
    pub superadmin_uid: String,
    pub superadmin_name: String,
    pub privilege_key_einmalig: bool,
}

impl Default for BootstrapOptionen {
    fn default() -> Self {
        Self {
            standard_raum: "Lobby".into(),
            standard_raum_passwort: None,
            superadmin_uid: "superadmin".into(),
            superadmin_name: "Superadmin".into(),
            privilege_key_einmalig: true,
        }
    }
}

/// Was der Bootstrap tatsaechlich angelegt hat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapErgebnis {
    pub standard_raum_erstellt: bool,
    pub superadmin_erstellt: bool,
    /// Nur gesetzt wenn in diesem Lauf ein neuer Superadmin-Key erzeugt wurde
    pub superadmin_key: Option<String>,
}
