//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task: optional TLS, dann der
//! WebSocket-Handshake, dann die `ClientConnection`.
//!
//! ## Shutdown
//! Ein einziger `CancellationToken` beendet die Accept-Loop. Jede Verbindung
//! haelt ein Kind-Token davon und schliesst sich selbst mit Close-Frame.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::connection::ClientConnection;
use crate::server_state::RelayState;

/// Wie lange der Shutdown auf offene Verbindungen wartet
const SHUTDOWN_WARTEZEIT: Duration = Duration::from_secs(5);

/// Zeit fuer TLS- und WebSocket-Handshake zusammen
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket-Relay-Server
pub struct RelayServer {
    state: Arc<RelayState>,
    bind_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
}

impl RelayServer {
    /// Erstellt einen neuen RelayServer ohne TLS
    pub fn neu(state: Arc<RelayState>, bind_addr: SocketAddr) -> Self {
        Self {
            state,
            bind_addr,
            tls: None,
        }
    }

    /// Aktiviert TLS vor dem WebSocket-Handshake
    pub fn mit_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Bindet den Listener und akzeptiert Verbindungen bis `shutdown`
    pub async fn starten(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.annehmen(listener, shutdown).await
    }

    /// Accept-Loop auf einem bereits gebundenen Listener
    pub async fn annehmen(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> std::io::Result<()> {
        let lokale_addr = listener.local_addr()?;
        tracing::info!(
            adresse = %lokale_addr,
            tls = self.tls.is_some(),
            "Relay-Server gestartet"
        );

        let mut verbindungen = JoinSet::new();

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            verbindungen.spawn(verbindung_behandeln(
                                Arc::clone(&self.state),
                                stream,
                                peer_addr,
                                self.tls.clone(),
                                shutdown.clone(),
                            ));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Beendete Verbindungs-Tasks einsammeln
                Some(_) = verbindungen.join_next(), if !verbindungen.is_empty() => {}

                // Shutdown-Signal
                _ = shutdown.cancelled() => {
                    tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        drop(listener);
        let offen = verbindungen.len();
        let alle_beendet = tokio::time::timeout(SHUTDOWN_WARTEZEIT, async {
            while verbindungen.join_next().await.is_some() {}
        })
        .await;
        if alle_beendet.is_err() {
            tracing::warn!(offen, "Nicht alle Verbindungen rechtzeitig beendet");
            verbindungen.abort_all();
        }

        tracing::info!("Relay-Server gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

async fn verbindung_behandeln(
    state: Arc<RelayState>,
    stream: TcpStream,
    peer_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    shutdown: CancellationToken,
) {
    let Some(acceptor) = tls else {
        return websocket_behandeln(state, stream, peer_addr, shutdown).await;
    };

    match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => websocket_behandeln(state, tls_stream, peer_addr, shutdown).await,
        Ok(Err(e)) => {
            tracing::warn!(peer = %peer_addr, fehler = %e, "TLS-Handshake fehlgeschlagen");
        }
        Err(_) => {
            tracing::warn!(peer = %peer_addr, "TLS-Handshake Zeitueberschreitung");
        }
    }
}

/// WebSocket-Limits aus der Relay-Konfiguration
///
/// Zu grosse Nachrichten werden schon beim Lesen abgewiesen, bevor sie
/// gepuffert werden.
fn websocket_config(max_frame_bytes: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_frame_bytes);
    config.max_frame_size = Some(max_frame_bytes);
    config
}

async fn websocket_behandeln<S>(
    state: Arc<RelayState>,
    stream: S,
    peer_addr: SocketAddr,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = websocket_config(state.config.max_frame_bytes);
    let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(config));

    match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
        Ok(Ok(ws)) => {
            ClientConnection::neu(state, peer_addr)
                .verarbeiten(ws, shutdown)
                .await
        }
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer_addr, fehler = %e, "WebSocket-Handshake fehlgeschlagen");
        }
        Err(_) => {
            tracing::debug!(peer = %peer_addr, "WebSocket-Handshake Zeitueberschreitung");
        }
    }
}
