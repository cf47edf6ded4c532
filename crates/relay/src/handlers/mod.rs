//! Handler fuer alle Steuerungsnachrichten
//!
//! Jeder Handler ist fuer einen bestimmten Nachrichtentyp zustaendig und hat
//! Zugriff auf den gemeinsamen RelayState. Antworten und Benachrichtigungen
//! laufen ueber den Verteiler; ein `Err` wird vom Dispatcher in eine
//! typisierte Fehlerantwort uebersetzt.

pub mod chat_handler;
pub mod client_handler;
pub mod join_handler;
pub mod privilege_handler;
pub mod raum_handler;

use crate::error::{RelayError, RelayResult};
use crate::sessions::Session;

/// Berechtigungspruefung fuer privilegierte Aktionen (gecachte Rolle)
pub(crate) fn admin_erforderlich(session: &Session, aktion: &str) -> RelayResult<()> {
    if session.rolle.ist_admin() {
        Ok(())
    } else {
        tracing::debug!(
            session_id = %session.id,
            rolle = %session.rolle,
            aktion,
            "Aktion verweigert"
        );
        Err(RelayError::verweigert(format!("{aktion} erfordert admin")))
    }
}

/// Aktueller Raum der Session oder Fehler
pub(crate) fn aktueller_raum(session: &Session) -> RelayResult<String> {
    session
        .aktueller_raum
        .clone()
        .ok_or_else(|| RelayError::RaumNichtGefunden("(kein aktueller Raum)".into()))
}

/// Leere Passwoerter zaehlen als kein Passwort
pub(crate) fn passwort_normalisieren(passwort: Option<String>) -> Option<String> {
    passwort.filter(|p| !p.is_empty())
}
