//! Gemeinsame Identifikations- und Rollentypen fuer Sprechraum
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SprechraumError;

/// Eindeutige Session-ID (eine pro Live-Verbindung, nie wiederverwendet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Rolle einer Identitaet
///
/// Die Rolle ist fuer Berechtigungspruefungen massgeblich und wird beim
/// Join in der Session zwischengespeichert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Rolle {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }

    /// `true` fuer `admin` und `superadmin`
    pub fn ist_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::Superadmin)
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

impl std::str::FromStr for Rolle {
    type Err = SprechraumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(SprechraumError::UngueltigeRolle(other.to_string())),
        }
    }
}
