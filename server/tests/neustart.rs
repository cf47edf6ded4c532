//! Start, Join und Neustart gegen eine Datei-Datenbank

use futures_util::{SinkExt, StreamExt};
use sprechraum_db::{DatabaseConfig, RoomRepository, SqliteDb};
use sprechraum_protocol::control::ServerNachricht;
use sprechraum_server::config::ServerConfig;
use sprechraum_server::Server;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

fn config_fuer(verzeichnis: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server.name = "Neustart".into();
    config.datenbank.url = format!("sqlite://{}", verzeichnis.join("test.db").display());
    config.sicherung.aktiviert = false;
    config
}

async fn starten(config: ServerConfig) -> (SocketAddr, CancellationToken, JoinHandle<anyhow::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(Server::neu(config).laufen(listener, shutdown.clone()));
    (addr, shutdown, task)
}

/// Verbindet, tritt `raum` bei und liefert die Raumliste nach dem Join
async fn joinen(addr: SocketAddr, username: &str, raum: &str) -> Vec<(String, Vec<String>)> {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("Verbindung fehlgeschlagen");
    let join = format!(r#"{{"type":"join","username":"{username}","room":"{raum}"}}"#);
    ws.send(Message::Text(join)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let frame = ws.next().await.unwrap().unwrap();
            if let Message::Text(text) = frame {
                if let Ok(ServerNachricht::RoomList { rooms, .. }) = ServerNachricht::from_json(&text)
                {
                    let _ = ws.close(None).await;
                    return rooms
                        .into_iter()
                        .map(|r| (r.name, r.members))
                        .collect::<Vec<_>>();
                }
            }
        }
    })
    .await
    .expect("keine room_list erhalten")
}

#[tokio::test]
async fn neustart_behaelt_raeume_und_leert_mitglieder() {
    let dir = tempfile::tempdir().unwrap();

    // Erster Lauf: anna legt "Musik" per Join an
    let (addr, shutdown, task) = starten(config_fuer(dir.path())).await;
    let raeume = joinen(addr, "anna", "Musik").await;
    assert!(raeume.contains(&("Musik".to_string(), vec!["anna".to_string()])));
    shutdown.cancel();
    task.await.unwrap().unwrap();

    // Mitgliederliste wurde beim Verlassen persistiert; simuliert einen Absturz
    let db = SqliteDb::oeffnen(&DatabaseConfig {
        url: config_fuer(dir.path()).datenbank.url,
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    db.persist_room_membership("Musik", &["uid-geist".to_string()])
        .await
        .unwrap();
    db.schliessen().await;

    // Zweiter Lauf: Raum ist noch da, Mitglieder sind leer
    let (addr, shutdown, task) = starten(config_fuer(dir.path())).await;
    let raeume = joinen(addr, "bob", "Lobby").await;
    assert!(raeume.contains(&("Musik".to_string(), vec![])));
    assert!(raeume.contains(&("Lobby".to_string(), vec!["bob".to_string()])));
    shutdown.cancel();
    task.await.unwrap().unwrap();

    let db = SqliteDb::oeffnen(&DatabaseConfig {
        url: config_fuer(dir.path()).datenbank.url,
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    let musik = db
        .load_rooms()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "Musik")
        .unwrap();
    assert!(musik.members.is_empty());
}

#[tokio::test]
async fn kaputte_datenbank_url_ist_ein_startfehler() {
    let mut config = ServerConfig::default();
    config.datenbank.url = "postgres://nicht-unterstuetzt".into();
    config.sicherung.aktiviert = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ergebnis = Server::neu(config)
        .laufen(listener, CancellationToken::new())
        .await;
    assert!(ergebnis.is_err());
}

/// Sammelt die Log-Ausgabe im Speicher
#[derive(Clone, Default)]
struct LogPuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogPuffer {
    fn write(&mut self, daten: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(daten);
        Ok(daten.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogPuffer {
    fn zeilen_mit(&self, text: &str) -> usize {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .filter(|zeile| zeile.contains(text))
            .count()
    }
}

/// Startet und stoppt sofort wieder, mit Log-Mitschnitt im aktuellen Thread
async fn kurz_laufen(config: ServerConfig) -> LogPuffer {
    let puffer = LogPuffer::default();
    let schreiber = puffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || schreiber.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    Server::neu(config).laufen(listener, shutdown).await.unwrap();
    puffer
}

#[tokio::test]
async fn superadmin_key_erscheint_genau_einmal_im_log() {
    let dir = tempfile::tempdir().unwrap();

    let erster_start = kurz_laufen(config_fuer(dir.path())).await;
    assert_eq!(erster_start.zeilen_mit("Superadmin-Privilege-Key"), 1);

    // Beim Neustart wird kein weiterer Key erzeugt
    let zweiter_start = kurz_laufen(config_fuer(dir.path())).await;
    assert_eq!(zweiter_start.zeilen_mit("Superadmin-Privilege-Key"), 0);
}
