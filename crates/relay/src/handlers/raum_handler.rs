//! Raum-Handler – Switch, Create, Edit, Delete
//!
//! Anlegen, Aendern und Loeschen erfordern admin oder superadmin. Die
//! Persistenz wird jeweils vor dem Verzeichnis geaendert; schlaegt sie
//! fehl, bleibt der Zustand im Speicher unveraendert.

use sprechraum_core::types::SessionId;
use sprechraum_db::{DbError, RoomRepository};
use sprechraum_protocol::control::ServerNachricht;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::handlers::{admin_erforderlich, passwort_normalisieren};
use crate::server_state::RelayState;

/// DB-Fehler auf Raum-Fehler abbilden
fn raum_fehler(name: &str, fehler: DbError) -> RelayError {
    match fehler {
        DbError::NichtGefunden(_) => RelayError::RaumNichtGefunden(name.to_string()),
        e if e.ist_eindeutigkeit() => RelayError::RaumExistiert(name.to_string()),
        e => RelayError::Persistenz(e),
    }
}

/// Verarbeitet einen Raumwechsel
///
/// Der Zielraum muss existieren. Das Passwort gilt fuer alle ausser admin
/// und superadmin; bei falschem Passwort bleibt die Session im alten Raum.
pub async fn handle_switch_room(
    neuer_raum: String,
    room_password: Option<String>,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;

    if session.aktueller_raum.as_deref() == Some(neuer_raum.as_str()) {
        return Err(RelayError::BereitsImRaum(neuer_raum));
    }
    if !state.raeume.existiert(&neuer_raum) {
        return Err(RelayError::RaumNichtGefunden(neuer_raum));
    }

    let room_password = passwort_normalisieren(room_password);
    let wechsel = state.raum_wechseln(
        session_id,
        &neuer_raum,
        room_password.as_deref(),
        !session.rolle.ist_admin(),
    )?;

    tracing::info!(
        session_id = %session_id,
        von = ?wechsel.alter_raum,
        nach = %wechsel.neuer_raum,
        "Raum gewechselt"
    );

    state.verteiler.senden(
        session_id,
        ServerNachricht::SwitchedRoom {
            room: wechsel.neuer_raum.clone(),
            message: format!("Switched to room {}", wechsel.neuer_raum),
        },
    );

    if let Some(ref alt) = wechsel.alter_raum {
        state.mitgliedschaft_persistieren(alt).await;
        state.raum_update_senden(alt);
    }
    state.mitgliedschaft_persistieren(&wechsel.neuer_raum).await;
    state.raum_update_senden(&wechsel.neuer_raum);
    state.raum_liste_senden();

    Ok(())
}

/// Verarbeitet das explizite Anlegen eines Raums
pub async fn handle_create_room(
    name: String,
    room_password: Option<String>,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    admin_erforderlich(&session, "create_room")?;

    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(RelayError::ungueltig("Raumname darf nicht leer sein"));
    }
    if state.raeume.existiert(&name) {
        return Err(RelayError::RaumExistiert(name));
    }

    let passwort = passwort_normalisieren(room_password);
    state
        .persistenz
        .create_room(&name, passwort.as_deref())
        .await
        .map_err(|e| raum_fehler(&name, e))?;
    state.raeume.create_explicit(&name, passwort)?;

    tracing::info!(session_id = %session_id, raum = %name, "Raum angelegt");

    state
        .verteiler
        .senden(session_id, ServerNachricht::info(format!("Room '{name}' created")));
    state.raum_liste_senden();
    Ok(())
}

/// Setzt oder entfernt das Passwort eines Raums
pub async fn handle_edit_room(
    name: String,
    room_password: Option<String>,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    admin_erforderlich(&session, "edit_room")?;

    if !state.raeume.existiert(&name) {
        return Err(RelayError::RaumNichtGefunden(name));
    }

    let passwort = passwort_normalisieren(room_password);
    state
        .persistenz
        .update_room_password(&name, passwort.as_deref())
        .await
        .map_err(|e| raum_fehler(&name, e))?;
    let hat_passwort = passwort.is_some();
    state.raeume.passwort_setzen(&name, passwort)?;

    tracing::info!(session_id = %session_id, raum = %name, hat_passwort, "Raum geaendert");

    state
        .verteiler
        .senden(session_id, ServerNachricht::info(format!("Room '{name}' updated")));
    state.raum_liste_senden();
    Ok(())
}

/// Loescht einen Raum
///
/// Alle Mitglieder werden vorher evakuiert und landen ohne Raum; sie
/// koennen per `switch_room` einen neuen Raum betreten. Der Standardraum
/// kann nicht geloescht werden.
pub async fn handle_delete_room(
    name: String,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    admin_erforderlich(&session, "delete_room")?;

    if name == state.config.standard_raum {
        return Err(RelayError::verweigert(
            "Der Standardraum kann nicht geloescht werden",
        ));
    }
    if !state.raeume.existiert(&name) {
        return Err(RelayError::RaumNichtGefunden(name));
    }

    state
        .persistenz
        .delete_room(&name)
        .await
        .map_err(|e| raum_fehler(&name, e))?;
    let evakuiert = state.raum_aufloesen(&name)?;

    tracing::info!(
        session_id = %session_id,
        raum = %name,
        evakuiert = evakuiert.len(),
        "Raum geloescht"
    );

    state.verteiler.senden_an(
        &evakuiert,
        &ServerNachricht::info(format!(
            "Room '{name}' was deleted. Please switch to another room."
        )),
    );
    state
        .verteiler
        .senden(session_id, ServerNachricht::info(format!("Room '{name}' deleted")));
    state.raum_liste_senden();
    Ok(())
}
