//! Join-Handler – erster Beitritt einer Verbindung
//!
//! Prueft Server-Passwort und Bans, legt die Identitaet an (oder laedt sie)
//! und fuehrt die Session in den Zielraum. Fehlt die UID, vergibt der
//! Server eine neue und meldet sie in der Willkommensnachricht zurueck.

use sprechraum_core::types::SessionId;
use sprechraum_db::{BanRepository, IdentityRepository, RoomRepository};
use sprechraum_protocol::control::ServerNachricht;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::handlers::passwort_normalisieren;
use crate::server_state::RelayState;

/// Felder einer `join`-Nachricht
#[derive(Debug, Clone, Default)]
pub struct JoinAnfrage {
    pub username: String,
    pub uid: Option<String>,
    pub room: Option<String>,
    pub password: Option<String>,
    pub room_password: Option<String>,
}

/// Verarbeitet eine Join-Anfrage
///
/// Das Passwort des Standardraums wird nie geprueft. Fuer jeden anderen
/// Zielraum gilt es, ausser fuer admin und superadmin.
pub async fn handle_join(
    anfrage: JoinAnfrage,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    if session.ist_beigetreten() {
        return Err(RelayError::ungueltig("Bereits beigetreten"));
    }

    let username = anfrage.username.trim().to_string();
    if username.is_empty() {
        return Err(RelayError::ungueltig("Benutzername darf nicht leer sein"));
    }

    // Server-Passwort
    if let Some(ref erwartet) = state.config.server_passwort {
        if anfrage.password.as_deref() != Some(erwartet.as_str()) {
            tracing::warn!(session_id = %session_id, username = %username, "Falsches Server-Passwort");
            return Err(RelayError::UngueltigeAnmeldedaten(
                "Falsches Server-Passwort".into(),
            ));
        }
    }

    let uid = anfrage
        .uid
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Ban-Pruefung vor dem Anlegen der Identitaet
    if let Some(ban) = state.persistenz.is_banned(&uid).await? {
        tracing::warn!(session_id = %session_id, uid = %uid, grund = %ban.reason, "Join von gebannter Identitaet abgelehnt");
        return Err(RelayError::Gebannt(ban.reason));
    }

    let identitaet = state
        .persistenz
        .get_or_create_identity(&uid, &username)
        .await?;
    let rolle = identitaet.role;

    let ziel = anfrage
        .room
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| state.config.standard_raum.clone());

    if !state.raeume.existiert(&ziel) {
        state.persistenz.ensure_room(&ziel).await?;
    }

    let passwort_pruefen = ziel != state.config.standard_raum && !rolle.ist_admin();
    let room_password = passwort_normalisieren(anfrage.room_password);
    let wechsel = state.beitreten(
        session_id,
        &uid,
        &username,
        rolle,
        &ziel,
        room_password.as_deref(),
        passwort_pruefen,
    )?;

    tracing::info!(
        session_id = %session_id,
        uid = %uid,
        username = %username,
        rolle = %rolle,
        raum = %ziel,
        raum_erstellt = wechsel.raum_erstellt,
        "Session beigetreten"
    );

    state
        .verteiler
        .senden(session_id, ServerNachricht::info(state.config.willkommen.clone()));
    state.verteiler.senden(
        session_id,
        ServerNachricht::Info {
            message: format!("Welcome to {ziel}, {username}!"),
            role: Some(rolle),
            uid: Some(uid),
        },
    );

    state.mitgliedschaft_persistieren(&ziel).await;
    state.raum_update_senden(&ziel);
    state.raum_liste_senden();

    Ok(())
}
