//! Fehlertypen fuer die Relay-Engine
//!
//! Jeder Fehler wird vom Dispatcher in genau eine typisierte Antwort an den
//! Absender uebersetzt. Kein Fehler beendet den Prozess; schlimmstenfalls
//! wird die betroffene Verbindung geschlossen.

use sprechraum_core::types::SessionId;
use sprechraum_db::DbError;
use sprechraum_protocol::control::{ErrorCode, ServerNachricht};
use thiserror::Error;

/// Fehlertyp fuer die Relay-Engine
#[derive(Debug, Error)]
pub enum RelayError {
    /// Rolle reicht fuer die Aktion nicht aus
    #[error("Keine Berechtigung: {0}")]
    ZugriffVerweigert(String),

    #[error("Raum '{0}' existiert nicht")]
    RaumNichtGefunden(String),

    #[error("Raum '{0}' existiert bereits")]
    RaumExistiert(String),

    /// Raum-Passwort fehlt oder ist falsch
    #[error("Falsches Passwort fuer Raum '{raum}'")]
    FalschesPasswort { raum: String },

    #[error("Bereits im Raum '{0}'")]
    BereitsImRaum(String),

    #[error("Benutzer '{0}' nicht gefunden")]
    BenutzerNichtGefunden(String),

    /// Server-Passwort oder Privilege-Key ungueltig
    #[error("Ungueltige Anmeldedaten: {0}")]
    UngueltigeAnmeldedaten(String),

    /// Protokollfehler (ungueltiger Frame, falscher Zustand)
    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    #[error("Nicht beigetreten – zuerst 'join' senden")]
    NichtBeigetreten,

    #[error("Zu viele Anfragen – bitte {retry_after_sek}s warten")]
    RateLimit { retry_after_sek: u64 },

    #[error("Gebannt: {0}")]
    Gebannt(String),

    #[error("Server ist voll")]
    ServerVoll,

    /// Session wurde waehrend der Verarbeitung entfernt
    #[error("Session {0} existiert nicht mehr")]
    SessionNichtGefunden(SessionId),

    #[error("Persistenzfehler: {0}")]
    Persistenz(#[from] DbError),
}

impl RelayError {
    /// Protokoll-Fehlercode fuer diesen Fehler
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ZugriffVerweigert(_) => ErrorCode::PermissionDenied,
            Self::RaumNichtGefunden(_) => ErrorCode::RoomNotFound,
            Self::RaumExistiert(_) => ErrorCode::RoomAlreadyExists,
            Self::FalschesPasswort { .. } => ErrorCode::WrongPassword,
            Self::BereitsImRaum(_) => ErrorCode::AlreadyInRoom,
            Self::BenutzerNichtGefunden(_) => ErrorCode::UserNotFound,
            Self::UngueltigeAnmeldedaten(_) => ErrorCode::InvalidCredential,
            Self::UngueltigeAnfrage(_) => ErrorCode::InvalidRequest,
            Self::NichtBeigetreten => ErrorCode::NotJoined,
            Self::RateLimit { .. } => ErrorCode::RateLimited,
            Self::Gebannt(_) => ErrorCode::Banned,
            Self::ServerVoll => ErrorCode::ServerFull,
            Self::SessionNichtGefunden(_) | Self::Persistenz(_) => ErrorCode::InternalError,
        }
    }

    /// Antwort an den Absender
    ///
    /// Ein falsches Raum-Passwort wird als `password_required` gemeldet,
    /// interne Fehler ohne Details.
    pub fn antwort(&self) -> ServerNachricht {
        match self {
            Self::FalschesPasswort { raum } => ServerNachricht::PasswordRequired { room: raum.clone() },
            Self::SessionNichtGefunden(_) | Self::Persistenz(_) => {
                ServerNachricht::error(ErrorCode::InternalError, "Interner Serverfehler")
            }
            other => ServerNachricht::error(other.code(), other.to_string()),
        }
    }

    /// Ob die Verbindung nach der Antwort geschlossen wird
    pub fn trennt_verbindung(&self) -> bool {
        matches!(self, Self::Gebannt(_) | Self::ServerVoll)
    }

    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigeAnfrage(msg.into())
    }

    pub fn verweigert(msg: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(msg.into())
    }
}

/// Result-Typ fuer die Relay-Engine
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falsches_passwort_wird_password_required() {
        let e = RelayError::FalschesPasswort { raum: "Musik".into() };
        assert_eq!(e.code(), ErrorCode::WrongPassword);
        assert_eq!(
            e.antwort(),
            ServerNachricht::PasswordRequired { room: "Musik".into() }
        );
    }

    #[test]
    fn persistenzfehler_ohne_details() {
        let e = RelayError::from(DbError::intern("Platte voll"));
        match e.antwort() {
            ServerNachricht::Error { code, message } => {
                assert_eq!(code, ErrorCode::InternalError);
                assert!(!message.contains("Platte"));
            }
            other => panic!("Erwartet Error, erhalten: {other:?}"),
        }
    }

    #[test]
    fn nur_ban_und_server_voll_trennen() {
        assert!(RelayError::Gebannt("Spam".into()).trennt_verbindung());
        assert!(RelayError::ServerVoll.trennt_verbindung());
        assert!(!RelayError::NichtBeigetreten.trennt_verbindung());
        assert!(!RelayError::RaumNichtGefunden("x".into()).trennt_verbindung());
    }

    #[test]
    fn jeder_fehler_hat_einen_code() {
        let e = RelayError::RaumExistiert("Lobby".into());
        match e.antwort() {
            ServerNachricht::Error { code, message } => {
                assert_eq!(code, ErrorCode::RoomAlreadyExists);
                assert!(message.contains("Lobby"));
            }
            other => panic!("Erwartet Error, erhalten: {other:?}"),
        }
    }
}
