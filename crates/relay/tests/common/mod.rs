//! Gemeinsame Hilfen fuer die Relay-Integrationstests

#![allow(dead_code)]

use bytes::Bytes;
use sprechraum_core::types::{Rolle, SessionId};
use sprechraum_db::models::BootstrapOptionen;
use sprechraum_db::{IdentityRepository, Persistenz, SqliteDb};
use sprechraum_protocol::control::{ClientNachricht, ServerNachricht};
use sprechraum_protocol::wire::Eingehend;
use sprechraum_relay::{
    Ausgehend, Dispatcher, DispatcherContext, RelayConfig, RelayState, SessionHandle,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn test_config() -> RelayConfig {
    RelayConfig {
        server_name: "Testserver".into(),
        anfragen_pro_minute: None,
        ..RelayConfig::default()
    }
}

/// Frische In-Memory-DB mit Bootstrap (Lobby, Superadmin, Key)
pub async fn test_db() -> SqliteDb {
    let db = SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden");
    db.bootstrap(&BootstrapOptionen::default())
        .await
        .expect("Bootstrap fehlgeschlagen");
    db
}

pub async fn dispatcher_mit(config: RelayConfig, persistenz: Arc<dyn Persistenz>) -> Dispatcher {
    let state = RelayState::neu(config, persistenz);
    state.raeume_laden().await.expect("Raeume laden");
    Dispatcher::neu(state)
}

pub async fn test_dispatcher() -> (Dispatcher, SqliteDb) {
    let db = test_db().await;
    let dispatcher = dispatcher_mit(test_config(), Arc::new(db.clone())).await;
    (dispatcher, db)
}

/// Eine simulierte Verbindung ohne Socket
pub struct TestClient {
    pub ctx: DispatcherContext,
    pub rx: mpsc::Receiver<Ausgehend>,
    pub handle: SessionHandle,
}

impl TestClient {
    pub fn id(&self) -> SessionId {
        self.ctx.session_id
    }

    pub async fn senden(&mut self, dispatcher: &Dispatcher, nachricht: ClientNachricht) {
        dispatcher
            .dispatch(&mut self.ctx, Eingehend::Steuerung(nachricht))
            .await;
    }

    pub async fn audio(&mut self, dispatcher: &Dispatcher, frame: &'static [u8]) {
        dispatcher
            .dispatch(&mut self.ctx, Eingehend::Audio(Bytes::from_static(frame)))
            .await;
    }

    /// Alle bisher eingereihten Steuerungsnachrichten
    pub fn nachrichten(&mut self) -> Vec<ServerNachricht> {
        let mut ergebnis = Vec::new();
        while let Ok(eintrag) = self.rx.try_recv() {
            if let Ausgehend::Steuerung(nachricht) = eintrag {
                ergebnis.push(nachricht);
            }
        }
        ergebnis
    }

    /// Alle bisher eingereihten Audio-Frames
    pub fn audio_frames(&mut self) -> Vec<Bytes> {
        let mut ergebnis = Vec::new();
        while let Ok(eintrag) = self.rx.try_recv() {
            if let Ausgehend::Audio(frame) = eintrag {
                ergebnis.push(frame);
            }
        }
        ergebnis
    }

    /// Zuletzt eingereihte Steuerungsnachricht
    pub fn letzte_nachricht(&mut self) -> Option<ServerNachricht> {
        self.nachrichten().pop()
    }
}

pub fn verbinden(dispatcher: &Dispatcher) -> TestClient {
    let (handle, rx) = SessionHandle::neu(256);
    let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    let ctx = dispatcher.verbinden(handle.clone(), addr);
    TestClient { ctx, rx, handle }
}

pub fn join_nachricht(username: &str, uid: Option<&str>, room: Option<&str>) -> ClientNachricht {
    ClientNachricht::Join {
        username: username.into(),
        uid: uid.map(Into::into),
        room: room.map(Into::into),
        password: None,
        room_password: None,
    }
}

/// Verbindet und tritt bei; die Willkommensnachrichten werden verworfen
pub async fn beitreten(dispatcher: &Dispatcher, username: &str, room: Option<&str>) -> TestClient {
    let mut client = verbinden(dispatcher);
    let uid = format!("uid-{username}");
    client
        .senden(dispatcher, join_nachricht(username, Some(&uid), room))
        .await;
    assert!(
        dispatcher.state().sessions.lookup(client.id()).unwrap().ist_beigetreten(),
        "Join von {username} fehlgeschlagen"
    );
    client.nachrichten();
    client
}

/// Wie `beitreten`, aber die Identitaet hat vorher die Rolle `admin`
pub async fn admin_beitreten(dispatcher: &Dispatcher, db: &SqliteDb, username: &str) -> TestClient {
    let uid = format!("uid-{username}");
    db.get_or_create_identity(&uid, username).await.unwrap();
    db.set_role(&uid, Rolle::Admin).await.unwrap();
    beitreten(dispatcher, username, None).await
}

pub fn raum_von(dispatcher: &Dispatcher, client: &TestClient) -> Option<String> {
    dispatcher
        .state()
        .sessions
        .lookup(client.id())
        .unwrap()
        .aktueller_raum
}

pub fn konsistent(dispatcher: &Dispatcher) {
    assert!(
        dispatcher.state().mitgliedschaft_konsistent(),
        "Raum-Mitglieder und Session-Raeume stimmen nicht ueberein"
    );
}

pub fn fehler_code(nachricht: Option<ServerNachricht>) -> String {
    match nachricht {
        Some(ServerNachricht::Error { code, .. }) => code.als_str().to_string(),
        other => panic!("Erwartet Error, erhalten: {other:?}"),
    }
}
