//! Session-Registry – Verwaltet alle Live-Sessions
//!
//! Eine Session existiert genau so lange wie ihre Verbindung. Sie haelt
//! Identitaet, aktuellen Raum, gecachte Rolle und das Handle auf die
//! Send-Queue der Verbindung.
//!
//! Raum-Zuordnungen werden nur ueber `RelayState` geaendert, das dabei die
//! Mitgliedschaftssperre haelt; daher sind diese Setter `pub(crate)`.

use bytes::Bytes;
use dashmap::DashMap;
use sprechraum_core::types::{Rolle, SessionId};
use sprechraum_protocol::control::ServerNachricht;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{RelayError, RelayResult};

// ---------------------------------------------------------------------------
// Ausgehende Nachrichten
// ---------------------------------------------------------------------------

/// Eintrag in der Send-Queue einer Verbindung
#[derive(Debug, Clone, PartialEq)]
pub enum Ausgehend {
    /// Wird als Textframe gesendet
    Steuerung(ServerNachricht),
    /// Wird unveraendert als Binaerframe gesendet
    Audio(Bytes),
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue und das Schliess-Signal einer Verbindung
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<Ausgehend>,
    schliessen: CancellationToken,
}

impl SessionHandle {
    /// Erstellt ein Handle mit eigener Queue und gibt die Empfangsseite zurueck
    pub fn neu(queue_groesse: usize) -> (Self, mpsc::Receiver<Ausgehend>) {
        Self::mit_token(queue_groesse, CancellationToken::new())
    }

    /// Wie `neu`, aber mit vorgegebenem Schliess-Token
    pub fn mit_token(
        queue_groesse: usize,
        schliessen: CancellationToken,
    ) -> (Self, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        (Self { tx, schliessen }, rx)
    }

    /// Reiht eine Nachricht nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: Ausgehend) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Send-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }

    /// Signalisiert der Verbindung, sich nach dem Leeren der Queue zu schliessen
    pub fn schliessen(&self) {
        self.schliessen.cancel();
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.schliessen.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Identitaet einer beigetretenen Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identitaet {
    pub uid: String,
    pub anzeigename: String,
}

/// Zustand einer Live-Session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// `None` bis zum erfolgreichen Join
    pub identitaet: Option<Identitaet>,
    pub aktueller_raum: Option<String>,
    pub rolle: Rolle,
    pub handle: SessionHandle,
}

impl Session {
    pub fn ist_beigetreten(&self) -> bool {
        self.identitaet.is_some()
    }

    pub fn anzeigename(&self) -> Option<&str> {
        self.identitaet.as_ref().map(|i| i.anzeigename.as_str())
    }

    pub fn uid(&self) -> Option<&str> {
        self.identitaet.as_ref().map(|i| i.uid.as_str())
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Prozessweite Zuordnung SessionId -> Session
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<SessionId, Session>>,
    /// Belegte Plaetze; wird vor dem Einfuegen reserviert
    belegt: Arc<AtomicUsize>,
}

impl SessionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt eine neue Session ohne Raum, ohne Identitaet und mit Rolle `user` an
    pub fn erstellen(&self, handle: SessionHandle) -> SessionId {
        self.belegt.fetch_add(1, Ordering::SeqCst);
        self.einfuegen(handle)
    }

    /// Wie `erstellen`, aber nur solange weniger als `max` Sessions leben
    ///
    /// Platz-Reservierung und Einfuegen sind ein Schritt; gleichzeitige
    /// Aufrufe koennen das Limit nicht ueberschreiten.
    pub fn erstellen_begrenzt(&self, handle: SessionHandle, max: usize) -> Option<SessionId> {
        self.belegt
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |belegt| {
                (belegt < max).then_some(belegt + 1)
            })
            .ok()?;
        Some(self.einfuegen(handle))
    }

    fn einfuegen(&self, handle: SessionHandle) -> SessionId {
        let id = SessionId::new();
        self.inner.insert(
            id,
            Session {
                id,
                identitaet: None,
                aktueller_raum: None,
                rolle: Rolle::User,
                handle,
            },
        );
        tracing::debug!(session_id = %id, "Session erstellt");
        id
    }

    /// Haengt die Identitaet nach erfolgreichem Join an
    pub fn identitaet_binden(
        &self,
        id: SessionId,
        uid: &str,
        anzeigename: &str,
        rolle: Rolle,
    ) -> RelayResult<()> {
        let mut session = self
            .inner
            .get_mut(&id)
            .ok_or(RelayError::SessionNichtGefunden(id))?;
        session.identitaet = Some(Identitaet {
            uid: uid.to_string(),
            anzeigename: anzeigename.to_string(),
        });
        session.rolle = rolle;
        Ok(())
    }

    /// Kopie des aktuellen Session-Zustands
    pub fn lookup(&self, id: SessionId) -> RelayResult<Session> {
        self.inner
            .get(&id)
            .map(|s| s.clone())
            .ok_or(RelayError::SessionNichtGefunden(id))
    }

    /// Entfernt die Session. Mehrfaches Entfernen ist ein No-op.
    ///
    /// Der Aufrufer muss die Session vorher aus ihrem Raum entfernt haben.
    pub(crate) fn entfernen(&self, id: SessionId) -> Option<Session> {
        let entfernt = self.inner.remove(&id).map(|(_, s)| s);
        if entfernt.is_some() {
            self.belegt.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(session_id = %id, "Session entfernt");
        }
        entfernt
    }

    pub(crate) fn raum_setzen(&self, id: SessionId, raum: Option<String>) -> RelayResult<()> {
        let mut session = self
            .inner
            .get_mut(&id)
            .ok_or(RelayError::SessionNichtGefunden(id))?;
        session.aktueller_raum = raum;
        Ok(())
    }

    /// Aktualisiert die gecachte Rolle
    pub fn rolle_setzen(&self, id: SessionId, rolle: Rolle) -> RelayResult<()> {
        let mut session = self
            .inner
            .get_mut(&id)
            .ok_or(RelayError::SessionNichtGefunden(id))?;
        session.rolle = rolle;
        Ok(())
    }

    pub fn handle(&self, id: SessionId) -> Option<SessionHandle> {
        self.inner.get(&id).map(|s| s.handle.clone())
    }

    pub fn anzeigename(&self, id: SessionId) -> Option<String> {
        self.inner
            .get(&id)
            .and_then(|s| s.anzeigename().map(str::to_string))
    }

    pub fn uid(&self, id: SessionId) -> Option<String> {
        self.inner.get(&id).and_then(|s| s.uid().map(str::to_string))
    }

    /// Alle beigetretenen Sessions mit diesem Anzeigenamen
    pub fn nach_anzeigename(&self, anzeigename: &str) -> Vec<SessionId> {
        self.inner
            .iter()
            .filter(|s| s.anzeigename() == Some(anzeigename))
            .map(|s| s.id)
            .collect()
    }

    /// Alle Sessions mit dieser Identitaet
    pub fn nach_uid(&self, uid: &str) -> Vec<SessionId> {
        self.inner
            .iter()
            .filter(|s| s.uid() == Some(uid))
            .map(|s| s.id)
            .collect()
    }

    pub fn alle_ids(&self) -> Vec<SessionId> {
        self.inner.iter().map(|s| s.id).collect()
    }

    /// Alle Sessions mit ihrem aktuellen Raum
    pub fn raum_zuordnungen(&self) -> Vec<(SessionId, Option<String>)> {
        self.inner
            .iter()
            .map(|s| (s.id, s.aktueller_raum.clone()))
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.inner.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_mit_session() -> (SessionRegistry, SessionId, mpsc::Receiver<Ausgehend>) {
        let registry = SessionRegistry::neu();
        let (handle, rx) = SessionHandle::neu(8);
        let id = registry.erstellen(handle);
        (registry, id, rx)
    }

    #[test]
    fn neue_session_ohne_raum_und_identitaet() {
        let (registry, id, _rx) = registry_mit_session();
        let session = registry.lookup(id).unwrap();
        assert!(session.identitaet.is_none());
        assert!(session.aktueller_raum.is_none());
        assert_eq!(session.rolle, Rolle::User);
        assert_eq!(registry.anzahl(), 1);
    }

    #[test]
    fn identitaet_binden() {
        let (registry, id, _rx) = registry_mit_session();
        registry
            .identitaet_binden(id, "uid-1", "anna", Rolle::Admin)
            .unwrap();

        let session = registry.lookup(id).unwrap();
        assert_eq!(session.anzeigename(), Some("anna"));
        assert_eq!(session.uid(), Some("uid-1"));
        assert_eq!(session.rolle, Rolle::Admin);
        assert_eq!(registry.nach_anzeigename("anna"), vec![id]);
        assert_eq!(registry.nach_uid("uid-1"), vec![id]);
    }

    #[test]
    fn binden_nach_entfernen_schlaegt_fehl() {
        let (registry, id, _rx) = registry_mit_session();
        registry.entfernen(id);
        assert!(matches!(
            registry.identitaet_binden(id, "uid", "x", Rolle::User),
            Err(RelayError::SessionNichtGefunden(_))
        ));
    }

    #[test]
    fn entfernen_ist_idempotent() {
        let (registry, id, _rx) = registry_mit_session();
        assert!(registry.entfernen(id).is_some());
        assert!(registry.entfernen(id).is_none());
        assert!(registry.lookup(id).is_err());
        assert!(registry.ist_leer());
    }

    #[test]
    fn begrenztes_erstellen_gibt_plaetze_wieder_frei() {
        let registry = SessionRegistry::neu();
        let (h1, _rx1) = SessionHandle::neu(4);
        let (h2, _rx2) = SessionHandle::neu(4);
        let (h3, _rx3) = SessionHandle::neu(4);

        let a = registry.erstellen_begrenzt(h1, 1).unwrap();
        assert!(registry.erstellen_begrenzt(h2.clone(), 1).is_none());
        assert_eq!(registry.anzahl(), 1);

        registry.entfernen(a);
        registry.entfernen(a);
        assert!(registry.erstellen_begrenzt(h3, 1).is_some());
        assert!(registry.erstellen_begrenzt(h2, 1).is_none());
    }

    #[test]
    fn gleichzeitiges_erstellen_haelt_das_limit() {
        let registry = SessionRegistry::neu();
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let (handle, rx) = SessionHandle::neu(1);
                    (registry.erstellen_begrenzt(handle, 5).is_some(), rx)
                })
            })
            .collect();

        let erfolgreich = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|(ok, _)| *ok)
            .count();
        assert_eq!(erfolgreich, 5);
        assert_eq!(registry.anzahl(), 5);
    }

    #[tokio::test]
    async fn handle_senden_und_volle_queue() {
        let (handle, mut rx) = SessionHandle::neu(1);
        assert!(handle.senden(Ausgehend::Audio(Bytes::from_static(b"a"))));
        // Queue voll: wird verworfen statt zu blockieren
        assert!(!handle.senden(Ausgehend::Audio(Bytes::from_static(b"b"))));

        assert_eq!(
            rx.recv().await,
            Some(Ausgehend::Audio(Bytes::from_static(b"a")))
        );
    }

    #[test]
    fn geschlossene_queue() {
        let (handle, rx) = SessionHandle::neu(4);
        drop(rx);
        assert!(!handle.senden(Ausgehend::Steuerung(ServerNachricht::info("x"))));
    }

    #[test]
    fn schliessen_setzt_token() {
        let (handle, _rx) = SessionHandle::neu(4);
        assert!(!handle.ist_geschlossen());
        handle.clone().schliessen();
        assert!(handle.ist_geschlossen());
    }
}
