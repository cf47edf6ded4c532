//! Ende-zu-Ende ueber echte WebSocket-Verbindungen

mod common;

use common::*;
use futures_util::{SinkExt, StreamExt};
use sprechraum_protocol::control::ServerNachricht;
use sprechraum_relay::{RelayConfig, RelayServer, RelayState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WARTEZEIT: Duration = Duration::from_secs(3);

async fn server_starten(config: RelayConfig) -> (SocketAddr, Arc<RelayState>, CancellationToken) {
    let db = test_db().await;
    let state = RelayState::neu(config, Arc::new(db));
    state.raeume_laden().await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();

    let server = RelayServer::neu(Arc::clone(&state), addr);
    let token = shutdown.clone();
    tokio::spawn(async move {
        server.annehmen(listener, token).await.unwrap();
    });

    (addr, state, shutdown)
}

async fn client(addr: SocketAddr) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("WebSocket-Verbindung fehlgeschlagen");
    ws
}

/// Liest Frames bis `pruefen` einen Treffer liefert
async fn warten_auf<T>(ws: &mut Ws, mut pruefen: impl FnMut(&Message) -> Option<T>) -> T {
    tokio::time::timeout(WARTEZEIT, async {
        loop {
            let frame = ws
                .next()
                .await
                .expect("Verbindung unerwartet beendet")
                .expect("Lesefehler");
            if let Some(treffer) = pruefen(&frame) {
                return treffer;
            }
        }
    })
    .await
    .expect("Zeitueberschreitung beim Warten auf Frame")
}

fn als_nachricht(frame: &Message) -> Option<ServerNachricht> {
    match frame {
        Message::Text(text) => ServerNachricht::from_json(text).ok(),
        _ => None,
    }
}

async fn joinen(ws: &mut Ws, username: &str, room: &str) {
    let join = format!(r#"{{"type":"join","username":"{username}","room":"{room}"}}"#);
    ws.send(Message::Text(join)).await.unwrap();
    warten_auf(ws, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Info { role: Some(_), .. }) => Some(()),
        _ => None,
    })
    .await;
}

#[tokio::test]
async fn audio_ueber_websocket_nur_im_eigenen_raum() {
    let (addr, state, shutdown) = server_starten(test_config()).await;
    let mut a = client(addr).await;
    let mut b = client(addr).await;
    let mut c = client(addr).await;

    joinen(&mut a, "a", "Lobby").await;
    joinen(&mut b, "b", "Lobby").await;
    joinen(&mut c, "c", "Other").await;
    assert!(state.mitgliedschaft_konsistent());

    let frame = vec![1u8, 2, 3, 4, 5];
    a.send(Message::Binary(frame.clone())).await.unwrap();

    let empfangen = warten_auf(&mut b, |f| match f {
        Message::Binary(daten) => Some(daten.clone()),
        _ => None,
    })
    .await;
    assert_eq!(empfangen, frame);

    // C bekommt keinen Audio-Frame
    let bei_c = tokio::time::timeout(Duration::from_millis(300), async {
        loop {
            match c.next().await {
                Some(Ok(Message::Binary(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await;
    assert!(!matches!(bei_c, Ok(true)));

    shutdown.cancel();
}

#[tokio::test]
async fn ungueltiger_text_frame_liefert_fehler() {
    let (addr, _state, shutdown) = server_starten(test_config()).await;
    let mut ws = client(addr).await;
    joinen(&mut ws, "anna", "Lobby").await;

    ws.send(Message::Text("kein json".into())).await.unwrap();
    let code = warten_auf(&mut ws, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Error { code, .. }) => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code.als_str(), "INVALID_REQUEST");

    // Verbindung bleibt nutzbar
    ws.send(Message::Text(r#"{"type":"message","message":"noch da"}"#.into()))
        .await
        .unwrap();
    warten_auf(&mut ws, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Message { message, .. }) if message == "noch da" => Some(()),
        _ => None,
    })
    .await;

    shutdown.cancel();
}

#[tokio::test]
async fn frame_ueber_dem_limit_wird_vor_dem_puffern_abgewiesen() {
    let config = RelayConfig {
        max_frame_bytes: 1024,
        ..test_config()
    };
    let (addr, state, shutdown) = server_starten(config).await;
    let mut sender = client(addr).await;
    let mut hoerer = client(addr).await;
    joinen(&mut sender, "sender", "Lobby").await;
    joinen(&mut hoerer, "hoerer", "Lobby").await;

    // Genau am Limit geht durch
    sender.send(Message::Binary(vec![7u8; 1024])).await.unwrap();
    let laenge = warten_auf(&mut hoerer, |f| match f {
        Message::Binary(daten) => Some(daten.len()),
        _ => None,
    })
    .await;
    assert_eq!(laenge, 1024);

    // Ein Byte mehr beendet die Verbindung mit Fehler und Close 1009
    sender.send(Message::Binary(vec![7u8; 1025])).await.unwrap();
    let code = warten_auf(&mut sender, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Error { code, .. }) => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code.als_str(), "INVALID_REQUEST");
    let close_code = warten_auf(&mut sender, |frame| match frame {
        Message::Close(Some(rahmen)) => Some(rahmen.code),
        _ => None,
    })
    .await;
    assert_eq!(close_code, CloseCode::Size);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.sessions.nach_anzeigename("sender").is_empty());
    assert!(state.mitgliedschaft_konsistent());

    shutdown.cancel();
}

#[tokio::test]
async fn kick_schliesst_die_verbindung() {
    let (addr, state, shutdown) = server_starten(test_config()).await;
    let mut admin = client(addr).await;
    let mut bob = client(addr).await;
    joinen(&mut admin, "admin", "Lobby").await;
    joinen(&mut bob, "bob", "Lobby").await;

    let admin_id = state.sessions.nach_anzeigename("admin")[0];
    state
        .sessions
        .rolle_setzen(admin_id, sprechraum_core::types::Rolle::Admin)
        .unwrap();

    admin
        .send(Message::Text(
            r#"{"type":"kick","username":"bob","reason":"Test"}"#.into(),
        ))
        .await
        .unwrap();

    // Erst der Grund, dann der Close-Frame
    warten_auf(&mut bob, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Info { message, .. }) if message.contains("Test") => Some(()),
        _ => None,
    })
    .await;
    warten_auf(&mut bob, |frame| match frame {
        Message::Close(_) => Some(()),
        _ => None,
    })
    .await;

    assert!(state.sessions.nach_anzeigename("bob").is_empty());
    assert!(state.mitgliedschaft_konsistent());

    shutdown.cancel();
}

#[tokio::test]
async fn server_voll_lehnt_ab() {
    let config = RelayConfig {
        max_clients: 1,
        ..test_config()
    };
    let (addr, _state, shutdown) = server_starten(config).await;
    let mut erster = client(addr).await;
    joinen(&mut erster, "anna", "Lobby").await;

    let mut zweiter = client(addr).await;
    let code = warten_auf(&mut zweiter, |frame| match als_nachricht(frame) {
        Some(ServerNachricht::Error { code, .. }) => Some(code),
        _ => None,
    })
    .await;
    assert_eq!(code.als_str(), "SERVER_FULL");
    warten_auf(&mut zweiter, |frame| match frame {
        Message::Close(_) => Some(()),
        _ => None,
    })
    .await;

    shutdown.cancel();
}

#[tokio::test]
async fn shutdown_schliesst_alle_verbindungen() {
    let (addr, state, shutdown) = server_starten(test_config()).await;
    let mut ws = client(addr).await;
    joinen(&mut ws, "anna", "Lobby").await;

    shutdown.cancel();

    warten_auf(&mut ws, |frame| match frame {
        Message::Close(_) => Some(()),
        _ => None,
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(state.sessions.ist_leer());
}
