//! Privilege-Handler – Privilege-Key einloesen

use sprechraum_core::types::SessionId;
use sprechraum_db::{IdentityRepository, PrivilegeKeyRepository};
use sprechraum_protocol::control::ServerNachricht;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

/// Loest einen Privilege-Key fuer die Identitaet der Session ein
///
/// Die neue Rolle wird persistiert und in allen Live-Sessions derselben
/// Identitaet sofort wirksam. Ein unbekannter oder verbrauchter Key aendert
/// nichts.
pub async fn handle_use_privilege_key(
    key: String,
    session_id: SessionId,
    state: &Arc<RelayState>,
) -> RelayResult<()> {
    let session = state.sessions.lookup(session_id)?;
    let uid = session.uid().ok_or(RelayError::NichtBeigetreten)?.to_string();

    let Some(rolle) = state
        .persistenz
        .resolve_privilege_key(key.trim(), &uid)
        .await?
    else {
        tracing::warn!(session_id = %session_id, uid = %uid, "Ungueltiger Privilege-Key");
        return Err(RelayError::UngueltigeAnmeldedaten(
            "Ungueltiger oder bereits verwendeter Privilege-Key".into(),
        ));
    };

    state.persistenz.set_role(&uid, rolle).await?;

    for id in state.sessions.nach_uid(&uid) {
        // Gerade getrennte Sessions sind kein Fehler
        let _ = state.sessions.rolle_setzen(id, rolle);
    }

    tracing::info!(session_id = %session_id, uid = %uid, rolle = %rolle, "Privilege-Key eingeloest");

    state.verteiler.senden(
        session_id,
        ServerNachricht::Info {
            message: format!("Privilege key accepted. Your role is now {rolle}"),
            role: Some(rolle),
            uid: None,
        },
    );
    Ok(())
}
