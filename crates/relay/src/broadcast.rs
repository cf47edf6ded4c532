//! Verteiler – Fan-out an die Send-Queues der Sessions
//!
//! Jeder Empfaenger wird unabhaengig beliefert. Eine volle oder geschlossene
//! Queue wird uebersprungen und geloggt, der Rest des Batches laeuft weiter.
//!
//! ## Selektives Senden
//! - An eine Session: `senden`
//! - An eine Liste von Sessions: `senden_an`
//! - An alle Sessions: `an_alle`
//! - Audio an alle ausser den Absender: `audio_senden`

use bytes::Bytes;
use sprechraum_core::types::SessionId;
use sprechraum_protocol::control::ServerNachricht;

use crate::sessions::{Ausgehend, SessionRegistry};

/// Zentraler Verteiler fuer alle verbundenen Sessions
///
/// Loest Session-IDs bei jedem Aufruf frisch gegen die Registry auf.
#[derive(Clone)]
pub struct Verteiler {
    sessions: SessionRegistry,
}

impl Verteiler {
    pub fn neu(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    /// Sendet eine Nachricht an eine einzelne Session
    ///
    /// Gibt `true` zurueck wenn die Session gefunden und die Nachricht eingereiht wurde.
    pub fn senden(&self, session_id: SessionId, nachricht: ServerNachricht) -> bool {
        match self.sessions.handle(session_id) {
            Some(handle) => handle.senden(Ausgehend::Steuerung(nachricht)),
            None => {
                tracing::debug!(session_id = %session_id, "Senden an unbekannte Session");
                false
            }
        }
    }

    /// Sendet eine Nachricht an alle angegebenen Sessions
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn senden_an(&self, empfaenger: &[SessionId], nachricht: &ServerNachricht) -> usize {
        empfaenger
            .iter()
            .filter(|id| self.senden(**id, nachricht.clone()))
            .count()
    }

    /// Sendet eine Nachricht an alle verbundenen Sessions
    pub fn an_alle(&self, nachricht: &ServerNachricht) -> usize {
        self.senden_an(&self.sessions.alle_ids(), nachricht)
    }

    /// Leitet einen Audio-Frame an alle Empfaenger ausser dem Absender weiter
    ///
    /// Best-effort: ein voller Empfaenger verliert den Frame, es gibt keine
    /// Wiederholung.
    pub fn audio_senden(&self, empfaenger: &[SessionId], absender: SessionId, frame: Bytes) -> usize {
        let mut zugestellt = 0;
        for id in empfaenger.iter().filter(|id| **id != absender) {
            match self.sessions.handle(*id) {
                Some(handle) if handle.senden(Ausgehend::Audio(frame.clone())) => zugestellt += 1,
                Some(_) => {
                    tracing::debug!(session_id = %id, "Audio-Frame verworfen");
                }
                None => {}
            }
        }
        zugestellt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionHandle;

    #[tokio::test]
    async fn ein_ausfall_bricht_den_batch_nicht_ab() {
        let registry = SessionRegistry::neu();
        let (h1, mut rx1) = SessionHandle::neu(4);
        let (h2, rx2) = SessionHandle::neu(4);
        let (h3, mut rx3) = SessionHandle::neu(4);
        let a = registry.erstellen(h1);
        let b = registry.erstellen(h2);
        let c = registry.erstellen(h3);
        drop(rx2);

        let verteiler = Verteiler::neu(registry);
        let gesendet = verteiler.senden_an(&[a, b, c, SessionId::new()], &ServerNachricht::info("hallo"));
        assert_eq!(gesendet, 2);

        assert!(matches!(rx1.recv().await, Some(Ausgehend::Steuerung(_))));
        assert!(matches!(rx3.recv().await, Some(Ausgehend::Steuerung(_))));
    }

    #[tokio::test]
    async fn audio_nicht_an_absender() {
        let registry = SessionRegistry::neu();
        let (h1, mut rx1) = SessionHandle::neu(4);
        let (h2, mut rx2) = SessionHandle::neu(4);
        let a = registry.erstellen(h1);
        let b = registry.erstellen(h2);

        let verteiler = Verteiler::neu(registry);
        let frame = Bytes::from_static(&[1, 2, 3]);
        assert_eq!(verteiler.audio_senden(&[a, b], a, frame.clone()), 1);

        assert_eq!(rx2.recv().await, Some(Ausgehend::Audio(frame)));
        assert!(rx1.try_recv().is_err());
    }
}
