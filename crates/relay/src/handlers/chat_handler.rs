//! Chat-Handler – Raum-Nachrichten, Direktnachrichten, Sprech-Indikator

use sprechraum_core::types::SessionId;
use sprechraum_db::MessageRepository;
use sprechraum_protocol::control::ServerNachricht;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::handlers::aktueller_raum;
use crate::server_state::RelayState;

/// Verarbeitet eine Chat-Nachricht an den aktuellen Raum
///
/// Die Nachricht wird zuerst persistiert und dann an alle Mitglieder des
/// Raums verteilt, den Absender eingeschlossen.
pub async fn handle_message(
    text: String,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    let raum = aktueller_raum(&session)?;
    let (Some(uid), Some(username)) = (session.uid(), session.anzeigename()) else {
        return Err(RelayError::NichtBeigetreten);
    };

    if text.trim().is_empty() {
        return Err(RelayError::ungueltig("Leere Nachricht"));
    }

    state.persistenz.record_message(&raum, uid, &text).await?;

    let empfaenger = state.raeume.mitglieder(&raum).unwrap_or_default();
    let zugestellt = state.verteiler.senden_an(
        &empfaenger,
        &ServerNachricht::Message {
            username: username.to_string(),
            message: text,
        },
    );

    tracing::debug!(session_id = %session_id, raum = %raum, zugestellt, "Chat-Nachricht verteilt");
    Ok(())
}

/// Verarbeitet eine Direktnachricht
///
/// Empfaenger ist jede Live-Session mit dem angegebenen Anzeigenamen. Die
/// Nachricht wird nicht persistiert.
pub async fn handle_private_message(
    empfaenger_name: String,
    text: String,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    let username = session
        .anzeigename()
        .ok_or(RelayError::NichtBeigetreten)?
        .to_string();

    let empfaenger = state.sessions.nach_anzeigename(&empfaenger_name);
    if empfaenger.is_empty() {
        return Err(RelayError::BenutzerNichtGefunden(empfaenger_name));
    }

    state.verteiler.senden_an(
        &empfaenger,
        &ServerNachricht::PrivateMessage {
            username,
            message: text,
        },
    );

    tracing::debug!(session_id = %session_id, empfaenger = %empfaenger_name, "Direktnachricht zugestellt");
    Ok(())
}

/// Verteilt den Sprech-Status an den aktuellen Raum (inkl. Absender)
pub async fn handle_talking(
    status: bool,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    let raum = aktueller_raum(&session)?;
    let username = session
        .anzeigename()
        .ok_or(RelayError::NichtBeigetreten)?
        .to_string();

    let empfaenger = state.raeume.mitglieder(&raum).unwrap_or_default();
    state
        .verteiler
        .senden_an(&empfaenger, &ServerNachricht::Talking { username, status });

    tracing::trace!(session_id = %session_id, raum = %raum, status, "Sprech-Status");
    Ok(())
}
