//! Integration-Tests fuer RoomRepository (In-Memory SQLite)

use sprechraum_db::{DbError, RoomRepository, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn raum_erstellen_und_laden() {
    let db = db().await;

    db.create_room("Musik", Some("geheim")).await.unwrap();
    db.create_room("Allgemein", None).await.unwrap();

    let raeume = db.load_rooms().await.unwrap();
    let namen: Vec<_> = raeume.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(namen, vec!["Allgemein", "Musik"]);

    let musik = &raeume[1];
    assert_eq!(musik.password.as_deref(), Some("geheim"));
    assert!(musik.members.is_empty());
}

#[tokio::test]
async fn doppelter_raum_ist_eindeutigkeitsfehler() {
    let db = db().await;

    db.create_room("Musik", None).await.unwrap();
    let err = db.create_room("Musik", None).await.unwrap_err();
    assert!(matches!(err, DbError::Eindeutigkeit(_)));
    assert!(err.ist_eindeutigkeit());
}

#[tokio::test]
async fn ensure_room_ist_idempotent() {
    let db = db().await;

    db.ensure_room("Spontan").await.unwrap();
    db.ensure_room("Spontan").await.unwrap();
    assert_eq!(db.load_rooms().await.unwrap().len(), 1);
}

#[tokio::test]
async fn passwort_setzen_und_entfernen() {
    let db = db().await;

    db.create_room("Musik", None).await.unwrap();
    db.update_room_password("Musik", Some("pw")).await.unwrap();
    assert_eq!(
        db.load_rooms().await.unwrap()[0].password.as_deref(),
        Some("pw")
    );

    db.update_room_password("Musik", None).await.unwrap();
    assert!(db.load_rooms().await.unwrap()[0].password.is_none());

    assert!(matches!(
        db.update_room_password("Fehlt", None).await,
        Err(DbError::NichtGefunden(_))
    ));
}

#[tokio::test]
async fn raum_loeschen() {
    let db = db().await;

    db.create_room("Musik", None).await.unwrap();
    db.delete_room("Musik").await.unwrap();
    assert!(db.load_rooms().await.unwrap().is_empty());
    assert!(matches!(
        db.delete_room("Musik").await,
        Err(DbError::NichtGefunden(_))
    ));
}

#[tokio::test]
async fn mitglieder_persistieren_und_leeren() {
    let db = db().await;

    db.create_room("Lobby", None).await.unwrap();
    db.create_room("Leer", None).await.unwrap();
    db.persist_room_membership("Lobby", &["uid-a".to_string(), "uid-b".to_string()])
        .await
        .unwrap();

    let lobby = db
        .load_rooms()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == "Lobby")
        .unwrap();
    assert_eq!(lobby.members, vec!["uid-a", "uid-b"]);

    assert_eq!(db.clear_room_memberships().await.unwrap(), 1);
    assert!(db.load_rooms().await.unwrap().iter().all(|r| r.members.is_empty()));
}
