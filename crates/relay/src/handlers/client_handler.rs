//! Client-Handler – Kick und Ban
//!
//! Beide erfordern admin oder superadmin. Betroffene Sessions bekommen eine
//! letzte Info-Nachricht, werden ueber `RelayState::session_beenden`
//! geraeumt und ihre Verbindung wird geschlossen. Der Disconnect der
//! Verbindung laeuft danach in denselben Pfad und ist dann ein No-op.

use sprechraum_core::types::SessionId;
use sprechraum_db::{BanRepository, IdentityRepository};
use sprechraum_protocol::control::ServerNachricht;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::handlers::admin_erforderlich;
use crate::server_state::RelayState;

const STANDARD_BAN_GRUND: &str = "No reason provided";

/// Benachrichtigt, raeumt und schliesst eine Ziel-Session
async fn entfernen(state: &RelayState, ziel: SessionId, nachricht: ServerNachricht) {
    let handle = state.sessions.handle(ziel);
    state.verteiler.senden(ziel, nachricht);
    state.session_beenden(ziel).await;
    if let Some(handle) = handle {
        handle.schliessen();
    }
}

/// Verarbeitet einen Kick (per Anzeigename, alle Live-Sessions)
pub async fn handle_kick(
    username: String,
    grund: Option<String>,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    admin_erforderlich(&session, "kick")?;

    let ziele = state.sessions.nach_anzeigename(&username);
    if ziele.is_empty() {
        return Err(RelayError::BenutzerNichtGefunden(username));
    }

    let grund = grund.filter(|g| !g.trim().is_empty());
    let text = match grund {
        Some(ref g) => format!("You have been kicked from the server: {g}"),
        None => "You have been kicked from the server".to_string(),
    };
    for ziel in &ziele {
        entfernen(state, *ziel, ServerNachricht::info(text.clone())).await;
    }

    tracing::info!(
        session_id = %session_id,
        ziel = %username,
        sessions = ziele.len(),
        grund = ?grund,
        "Benutzer gekickt"
    );

    state
        .verteiler
        .senden(session_id, ServerNachricht::info(format!("User {username} has been kicked")));
    Ok(())
}

/// Verarbeitet einen Ban
///
/// Ziel sind die Identitaeten aller Live-Sessions mit diesem Anzeigenamen.
/// Ist niemand mit dem Namen verbunden, wird die Identitaet ueber die
/// Persistenz aufgeloest. Jede Ziel-UID wird gebannt und alle ihre
/// Live-Sessions werden entfernt.
pub async fn handle_ban(
    username: String,
    grund: Option<String>,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    admin_erforderlich(&session, "ban")?;

    let mut uids: Vec<String> = state
        .sessions
        .nach_anzeigename(&username)
        .into_iter()
        .filter_map(|id| state.sessions.uid(id))
        .collect();
    uids.sort();
    uids.dedup();

    if uids.is_empty() {
        let identitaet = state
            .persistenz
            .find_identity_by_name(&username)
            .await?
            .ok_or_else(|| RelayError::BenutzerNichtGefunden(username.clone()))?;
        uids.push(identitaet.uid);
    }

    let grund = grund
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| STANDARD_BAN_GRUND.to_string());

    // Erst alle Bans persistieren, dann entfernen
    for uid in &uids {
        state
            .persistenz
            .record_ban(uid, &grund, session.uid())
            .await?;
    }

    let mut entfernt = 0;
    for uid in &uids {
        for ziel in state.sessions.nach_uid(uid) {
            entfernen(
                state,
                ziel,
                ServerNachricht::info(format!("You have been banned from the server: {grund}")),
            )
            .await;
            entfernt += 1;
        }
    }

    tracing::warn!(
        session_id = %session_id,
        uids = ?uids,
        ziel = %username,
        grund = %grund,
        sessions = entfernt,
        "Identitaet gebannt"
    );

    state
        .verteiler
        .senden(session_id, ServerNachricht::info(format!("User {username} has been banned")));
    Ok(())
}
