//! Message-Dispatcher – Routet eingehende Frames an die richtigen Handler
//!
//! Der Dispatcher empfaengt dekodierte Frames von einer ClientConnection.
//! Steuerungsnachrichten gehen an den passenden Handler, Audio-Frames
//! direkt an den Verteiler.
//!
//! ## Zustandspruefung
//! - `join` nur solange die Session noch nicht beigetreten ist
//! - Alle anderen Steuerungsnachrichten erst nach erfolgreichem `join`
//! - Audio ohne aktuellen Raum wird verworfen
//!
//! Jeder Handler-Fehler wird in genau eine Antwort an den Absender
//! uebersetzt; nichts davon beendet die Verbindungsschleife.

use bytes::Bytes;
use sprechraum_core::types::SessionId;
use sprechraum_protocol::control::{ClientNachricht, ErrorCode, ServerNachricht};
use sprechraum_protocol::wire::{Eingehend, WireError};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::handlers::join_handler::JoinAnfrage;
use crate::handlers::{
    chat_handler, client_handler, join_handler, privilege_handler, raum_handler,
};
use crate::rate_limit::TokenBucket;
use crate::server_state::RelayState;
use crate::sessions::SessionHandle;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    pub session_id: SessionId,
    /// Peer-Adresse fuer Logging
    pub peer_addr: SocketAddr,
    /// None wenn Rate-Limiting deaktiviert ist
    rate_limiter: Option<TokenBucket>,
}

impl DispatcherContext {
    pub fn neu(
        session_id: SessionId,
        peer_addr: SocketAddr,
        anfragen_pro_minute: Option<u32>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            rate_limiter: anfragen_pro_minute.map(TokenBucket::neu),
        }
    }
}

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<RelayState>,
}

impl Dispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Registriert eine neue Verbindung als Session
    pub fn verbinden(&self, handle: SessionHandle, peer_addr: SocketAddr) -> DispatcherContext {
        let session_id = self.state.sessions.erstellen(handle);
        DispatcherContext::neu(session_id, peer_addr, self.state.config.anfragen_pro_minute)
    }

    /// Wie `verbinden`, aber `None` wenn `max_clients` erreicht ist
    pub fn verbinden_begrenzt(
        &self,
        handle: SessionHandle,
        peer_addr: SocketAddr,
    ) -> Option<DispatcherContext> {
        let session_id = self
            .state
            .sessions
            .erstellen_begrenzt(handle, self.state.config.max_clients)?;
        Some(DispatcherContext::neu(
            session_id,
            peer_addr,
            self.state.config.anfragen_pro_minute,
        ))
    }

    /// Verarbeitet einen eingehenden Frame
    pub async fn dispatch(&self, ctx: &mut DispatcherContext, eingehend: Eingehend) {
        match eingehend {
            Eingehend::Audio(frame) => self.audio_weiterleiten(ctx.session_id, frame),
            Eingehend::Steuerung(nachricht) => {
                let typ = nachricht.typ_name();
                tracing::trace!(session_id = %ctx.session_id, typ, "Nachricht empfangen");
                if let Err(e) = self.steuerung(ctx, nachricht).await {
                    self.fehler_melden(ctx, typ, e);
                }
            }
        }
    }

    /// Antwortet auf einen nicht dekodierbaren Textframe
    ///
    /// Die Verbindung bleibt offen.
    pub fn ungueltiger_frame(&self, ctx: &DispatcherContext, fehler: &WireError) {
        tracing::debug!(
            session_id = %ctx.session_id,
            peer = %ctx.peer_addr,
            fehler = %fehler,
            "Ungueltiger Frame"
        );
        self.state.verteiler.senden(
            ctx.session_id,
            ServerNachricht::error(ErrorCode::InvalidRequest, fehler.to_string()),
        );
    }

    /// Bereinigt alle Ressourcen einer Session beim Trennen
    ///
    /// Mehrfache Aufrufe (Disconnect nach Kick) sind ein No-op.
    pub async fn client_cleanup(&self, session_id: SessionId) {
        if self.state.session_beenden(session_id).await.is_some() {
            tracing::debug!(session_id = %session_id, "Client-Ressourcen bereinigt");
        }
    }

    // -----------------------------------------------------------------------
    // Steuerung
    // -----------------------------------------------------------------------

    async fn steuerung(
        &self,
        ctx: &mut DispatcherContext,
        nachricht: ClientNachricht,
    ) -> RelayResult<()> {
        if let Some(ref mut bucket) = ctx.rate_limiter {
            bucket
                .verbrauchen()
                .map_err(|retry_after_sek| RelayError::RateLimit { retry_after_sek })?;
        }

        let session_id = ctx.session_id;
        let session = self.state.sessions.lookup(session_id)?;
        let ist_join = matches!(nachricht, ClientNachricht::Join { .. });
        if !ist_join && !session.ist_beigetreten() {
            return Err(RelayError::NichtBeigetreten);
        }

        let state = &self.state;
        match nachricht {
            ClientNachricht::Join {
                username,
                uid,
                room,
                password,
                room_password,
            } => {
                let anfrage = JoinAnfrage {
                    username,
                    uid,
                    room,
                    password,
                    room_password,
                };
                join_handler::handle_join(anfrage, session_id, state).await
            }

            // -------------------------------------------------------------------
            // Raeume
            // -------------------------------------------------------------------
            ClientNachricht::SwitchRoom {
                new_room,
                room_password,
            } => raum_handler::handle_switch_room(new_room, room_password, session_id, state).await,

            ClientNachricht::CreateRoom {
                room_name,
                room_password,
            } => raum_handler::handle_create_room(room_name, room_password, session_id, state).await,

            ClientNachricht::EditRoom {
                room_name,
                room_password,
            } => raum_handler::handle_edit_room(room_name, room_password, session_id, state).await,

            ClientNachricht::DeleteRoom { room_name } => {
                raum_handler::handle_delete_room(room_name, session_id, state).await
            }

            // -------------------------------------------------------------------
            // Chat
            // -------------------------------------------------------------------
            ClientNachricht::Message { message } => {
                chat_handler::handle_message(message, session_id, state).await
            }

            ClientNachricht::PrivateMessage { recipient, message } => {
                chat_handler::handle_private_message(recipient, message, session_id, state).await
            }

            ClientNachricht::Talking { status } => {
                chat_handler::handle_talking(status, session_id, state).await
            }

            // -------------------------------------------------------------------
            // Moderation
            // -------------------------------------------------------------------
            ClientNachricht::Kick { username, reason } => {
                client_handler::handle_kick(username, reason, session_id, state).await
            }

            ClientNachricht::Ban { username, reason } => {
                client_handler::handle_ban(username, reason, session_id, state).await
            }

            ClientNachricht::UsePrivilegeKey { key } => {
                privilege_handler::handle_use_privilege_key(key, session_id, state).await
            }
        }
    }

    fn fehler_melden(&self, ctx: &DispatcherContext, typ: &str, fehler: RelayError) {
        match fehler {
            RelayError::Persistenz(ref e) => {
                tracing::error!(session_id = %ctx.session_id, typ, fehler = %e, "Persistenzfehler");
            }
            RelayError::SessionNichtGefunden(_) => {
                tracing::debug!(session_id = %ctx.session_id, typ, "Session waehrend der Verarbeitung entfernt");
            }
            ref e => {
                tracing::debug!(session_id = %ctx.session_id, typ, fehler = %e, "Anfrage abgelehnt");
            }
        }

        self.state.verteiler.senden(ctx.session_id, fehler.antwort());

        if fehler.trennt_verbindung() {
            if let Some(handle) = self.state.sessions.handle(ctx.session_id) {
                handle.schliessen();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------------

    /// Leitet einen Audio-Frame an die aktuellen Mitglieder des Raums weiter
    ///
    /// Die Mitglieder werden bei jedem Frame frisch aufgeloest.
    fn audio_weiterleiten(&self, session_id: SessionId, frame: Bytes) {
        let raum = match self.state.sessions.lookup(session_id) {
            Ok(session) => session.aktueller_raum,
            Err(_) => None,
        };
        let Some(raum) = raum else {
            tracing::debug!(session_id = %session_id, "Audio-Frame ohne Raum verworfen");
            return;
        };

        let empfaenger = self.state.raeume.mitglieder(&raum).unwrap_or_default();
        let zugestellt = self
            .state
            .verteiler
            .audio_senden(&empfaenger, session_id, frame);
        tracing::trace!(session_id = %session_id, raum = %raum, zugestellt, "Audio-Frame weitergeleitet");
    }
}
