//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Schleife liest Frames, reicht sie an den Dispatcher
//! weiter und schreibt die Send-Queue der Session auf den Socket.
//!
//! ## Lebenszyklus
//! ```text
//! Verbunden (Session ohne Identitaet)
//!     | join
//!     v
//! Beigetreten (Session mit Raum oder nach Raum-Loeschung ohne Raum)
//!     | Lesefehler / Close / Kick / Ban / Shutdown
//!     v
//! Getrennt (client_cleanup, Queue leeren, Close-Frame)
//! ```

use futures_util::{Sink, SinkExt, StreamExt};
use sprechraum_protocol::control::{ErrorCode, ServerNachricht};
use sprechraum_protocol::wire::WireCodec;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::RelayError;
use crate::server_state::RelayState;
use crate::sessions::{Ausgehend, SessionHandle};

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, die Session geschlossen wird (Kick,
    /// Ban) oder `shutdown` ausgeloest wird.
    pub async fn verarbeiten<S>(self, ws: WebSocketStream<S>, shutdown: CancellationToken)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer_addr = self.peer_addr;
        let config = Arc::clone(&self.state.config);
        let codec = WireCodec::with_max_size(config.max_frame_bytes);
        let (mut sink, mut stream) = ws.split();

        let token = shutdown.child_token();
        let (handle, mut sende_rx) = SessionHandle::mit_token(config.send_queue_groesse, token.clone());
        let dispatcher = Dispatcher::neu(Arc::clone(&self.state));

        // Client-Limit: Platz reservieren und Session anlegen in einem Schritt
        let Some(mut ctx) = dispatcher.verbinden_begrenzt(handle, peer_addr) else {
            tracing::warn!(
                peer = %peer_addr,
                max = config.max_clients,
                "Server voll – Verbindung abgelehnt"
            );
            let antwort =
                ServerNachricht::error(ErrorCode::ServerFull, RelayError::ServerVoll.to_string());
            let _ = schreiben(&mut sink, &codec, Ausgehend::Steuerung(antwort)).await;
            let _ = sink.send(close_frame(CloseCode::Again, "Server ist voll")).await;
            let _ = sink.close().await;
            return;
        };

        tracing::info!(peer = %peer_addr, session_id = %ctx.session_id, "Neue Verbindung");

        let mut abschluss = (CloseCode::Normal, "");
        loop {
            tokio::select! {
                // Kick, Ban oder Shutdown
                _ = token.cancelled() => {
                    tracing::debug!(session_id = %ctx.session_id, "Session geschlossen");
                    break;
                }

                // Eingehender Frame vom Client
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => match codec.decode_text(&text) {
                            Ok(eingehend) => dispatcher.dispatch(&mut ctx, eingehend).await,
                            Err(e) => dispatcher.ungueltiger_frame(&ctx, &e),
                        },
                        Some(Ok(Message::Binary(daten))) => match codec.decode_binaer(daten) {
                            Ok(eingehend) => dispatcher.dispatch(&mut ctx, eingehend).await,
                            Err(e) => dispatcher.ungueltiger_frame(&ctx, &e),
                        },
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                        // Ping/Pong beantwortet tungstenite selbst
                        Some(Ok(_)) => {}
                        // Ueber dem Limit: tungstenite verwirft den Frame vor dem Puffern,
                        // der Stream ist danach nicht mehr synchron
                        Some(Err(WsError::Capacity(e))) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame zu gross");
                            let antwort = ServerNachricht::error(
                                ErrorCode::InvalidRequest,
                                format!("Frame zu gross (Maximum: {} Bytes)", config.max_frame_bytes),
                            );
                            let _ = schreiben(&mut sink, &codec, Ausgehend::Steuerung(antwort)).await;
                            abschluss = (CloseCode::Size, "Frame zu gross");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus der Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = schreiben(&mut sink, &codec, ausgehend).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.client_cleanup(ctx.session_id).await;

        // Bereits eingereihte Nachrichten (z.B. Kick-Grund) noch zustellen
        while let Ok(ausgehend) = sende_rx.try_recv() {
            if schreiben(&mut sink, &codec, ausgehend).await.is_err() {
                break;
            }
        }

        let (code, grund) = if shutdown.is_cancelled() {
            (CloseCode::Away, "Server wird heruntergefahren")
        } else {
            abschluss
        };
        let _ = sink.send(close_frame(code, grund)).await;
        let _ = sink.close().await;

        tracing::info!(peer = %peer_addr, session_id = %ctx.session_id, "Verbindungs-Task beendet");
    }
}

/// Schreibt einen Queue-Eintrag als Text- oder Binaerframe
async fn schreiben<K>(sink: &mut K, codec: &WireCodec, ausgehend: Ausgehend) -> Result<(), WsError>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let nachricht = match ausgehend {
        Ausgehend::Steuerung(nachricht) => match codec.encode(&nachricht) {
            Ok(json) => Message::Text(json),
            Err(e) => {
                tracing::error!(fehler = %e, "Nachricht nicht serialisierbar");
                return Ok(());
            }
        },
        Ausgehend::Audio(frame) => Message::Binary(frame.to_vec()),
    };
    sink.send(nachricht).await
}

fn close_frame(code: CloseCode, grund: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(grund),
    }))
}
