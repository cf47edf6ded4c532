//! Integration-Tests fuer IdentityRepository (In-Memory SQLite)

use sprechraum_core::types::Rolle;
use sprechraum_db::{DbError, IdentityRepository, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn identitaet_wird_beim_ersten_join_angelegt() {
    let db = db().await;

    let ident = db.get_or_create_identity("uid-anna", "anna").await.unwrap();
    assert_eq!(ident.uid, "uid-anna");
    assert_eq!(ident.display_name, "anna");
    assert_eq!(ident.role, Rolle::User);
    assert!(!ident.is_superadmin);
    assert!(ident.credential.is_none());
}

#[tokio::test]
async fn wiederholter_join_behaelt_rolle_und_aktualisiert_namen() {
    let db = db().await;

    db.get_or_create_identity("uid-1", "alt").await.unwrap();
    db.set_role("uid-1", Rolle::Admin).await.unwrap();

    let ident = db.get_or_create_identity("uid-1", "neu").await.unwrap();
    assert_eq!(ident.display_name, "neu");
    assert_eq!(ident.role, Rolle::Admin);
    assert_eq!(db.get_role("uid-1").await.unwrap(), Rolle::Admin);
}

#[tokio::test]
async fn suche_nach_anzeigename() {
    let db = db().await;

    db.get_or_create_identity("uid-b", "bernd").await.unwrap();

    let gefunden = db.find_identity_by_name("bernd").await.unwrap().unwrap();
    assert_eq!(gefunden.uid, "uid-b");
    assert!(db.find_identity_by_name("niemand").await.unwrap().is_none());
}

#[tokio::test]
async fn unbekannte_uid() {
    let db = db().await;

    assert!(matches!(
        db.get_role("gibt-es-nicht").await,
        Err(DbError::NichtGefunden(_))
    ));
    assert!(matches!(
        db.set_role("gibt-es-nicht", Rolle::Admin).await,
        Err(DbError::NichtGefunden(_))
    ));
}
