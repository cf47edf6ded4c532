//! Gemeinsamer Server-Zustand fuer die Relay-Engine
//!
//! Haelt Registry, Verzeichnis, Verteiler und Persistenz als geteilte
//! Referenzen. Alle Aenderungen an Mitgliedschaften laufen ueber die
//! Methoden in diesem Modul, die dabei eine gemeinsame Sperre halten:
//!
//! - Sperrreihenfolge: Mitgliedschaft -> Verzeichnis -> Registry
//! - Innerhalb der Sperre wird nie `await`-et
//! - Persistenz und Benachrichtigungen laufen nach dem Freigeben

use parking_lot::Mutex;
use sprechraum_core::types::{Rolle, SessionId};
use sprechraum_db::{Persistenz, RoomRepository};
use sprechraum_protocol::control::{MitgliedInfo, RaumInfo, ServerNachricht};
use sprechraum_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::Verteiler;
use crate::error::{RelayError, RelayResult};
use crate::rooms::RaumVerzeichnis;
use crate::sessions::{Session, SessionRegistry};

/// Konfiguration fuer die Relay-Engine
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Anzeigename des Servers (in `room_list`)
    pub server_name: String,
    /// Server-Passwort fuer `join` (None = offen)
    pub server_passwort: Option<String>,
    /// Willkommensnachricht beim ersten Join
    pub willkommen: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: usize,
    /// Zielraum fuer `join` ohne Raumangabe; kann nicht geloescht werden
    pub standard_raum: String,
    /// Steuerungsnachrichten pro Minute und Verbindung (None = unbegrenzt)
    pub anfragen_pro_minute: Option<u32>,
    /// Maximale Groesse eines Frames in Bytes
    pub max_frame_bytes: usize,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_name: "Sprechraum Server".to_string(),
            server_passwort: None,
            willkommen: "Welcome to the server! Enjoy your stay.".to_string(),
            max_clients: 100,
            standard_raum: "Lobby".to_string(),
            anfragen_pro_minute: Some(60),
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            send_queue_groesse: 256,
        }
    }
}

/// Ergebnis eines Raumwechsels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wechsel {
    pub alter_raum: Option<String>,
    pub neuer_raum: String,
    pub raum_erstellt: bool,
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Server-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Live-Sessions
    pub sessions: SessionRegistry,
    /// Raeume und Mitglieder
    pub raeume: RaumVerzeichnis,
    /// Fan-out an die Verbindungen
    pub verteiler: Verteiler,
    /// Dauerhafte Datensaetze
    pub persistenz: Arc<dyn Persistenz>,
    /// Serialisiert alle Mitgliedschaftsaenderungen
    mitgliedschaft: Mutex<()>,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, persistenz: Arc<dyn Persistenz>) -> Arc<Self> {
        let sessions = SessionRegistry::neu();
        Arc::new(Self {
            config: Arc::new(config),
            verteiler: Verteiler::neu(sessions.clone()),
            sessions,
            raeume: RaumVerzeichnis::neu(),
            persistenz,
            mitgliedschaft: Mutex::new(()),
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Baut das Raum-Verzeichnis aus der Persistenz auf
    ///
    /// Persistierte Mitgliederlisten werden ignoriert; nach einem Neustart
    /// gibt es keine Sessions.
    pub async fn raeume_laden(&self) -> RelayResult<usize> {
        let records = self.persistenz.load_rooms().await?;
        let anzahl = records.len();
        for record in records {
            self.raeume.laden(&record.name, record.password);
        }
        self.raeume.get_or_create(&self.config.standard_raum);
        tracing::info!(raeume = anzahl, "Raum-Verzeichnis geladen");
        Ok(anzahl)
    }

    // -----------------------------------------------------------------------
    // Mitgliedschaftsaenderungen (unter Sperre)
    // -----------------------------------------------------------------------

    /// Erster Beitritt einer Session: Raum betreten und Identitaet binden
    ///
    /// Bei falschem Passwort bleibt die Session unveraendert.
    pub fn beitreten(
        &self,
        session_id: SessionId,
        uid: &str,
        anzeigename: &str,
        rolle: Rolle,
        ziel: &str,
        passwort: Option<&str>,
        passwort_pruefen: bool,
    ) -> RelayResult<Wechsel> {
        let _sperre = self.mitgliedschaft.lock();

        let session = self.sessions.lookup(session_id)?;
        if session.ist_beigetreten() {
            return Err(RelayError::ungueltig("Bereits beigetreten"));
        }

        let (_, raum_erstellt) = self.raeume.get_or_create(ziel);
        if let Err(e) = self
            .raeume
            .join(ziel, session_id, passwort, passwort_pruefen)
        {
            if raum_erstellt {
                let _ = self.raeume.delete(ziel);
            }
            return Err(e);
        }

        self.sessions
            .identitaet_binden(session_id, uid, anzeigename, rolle)?;
        self.sessions.raum_setzen(session_id, Some(ziel.to_string()))?;

        Ok(Wechsel {
            alter_raum: None,
            neuer_raum: ziel.to_string(),
            raum_erstellt,
        })
    }

    /// Wechselt in einen bestehenden Raum
    ///
    /// Der neue Raum wird vor dem Verlassen des alten betreten; schlaegt das
    /// fehl, aendert sich nichts.
    pub fn raum_wechseln(
        &self,
        session_id: SessionId,
        ziel: &str,
        passwort: Option<&str>,
        passwort_pruefen: bool,
    ) -> RelayResult<Wechsel> {
        let _sperre = self.mitgliedschaft.lock();

        let session = self.sessions.lookup(session_id)?;
        if session.aktueller_raum.as_deref() == Some(ziel) {
            return Err(RelayError::BereitsImRaum(ziel.to_string()));
        }

        self.raeume
            .join(ziel, session_id, passwort, passwort_pruefen)?;
        if let Some(ref alt) = session.aktueller_raum {
            self.raeume.leave(alt, session_id);
        }
        self.sessions.raum_setzen(session_id, Some(ziel.to_string()))?;

        Ok(Wechsel {
            alter_raum: session.aktueller_raum,
            neuer_raum: ziel.to_string(),
            raum_erstellt: false,
        })
    }

    /// Entfernt die Session aus ihrem Raum und aus der Registry
    ///
    /// Idempotent: ein zweiter Aufruf (Disconnect nach Kick) liefert `None`.
    pub fn session_raeumen(&self, session_id: SessionId) -> Option<Session> {
        let _sperre = self.mitgliedschaft.lock();

        let session = self.sessions.lookup(session_id).ok()?;
        if let Some(ref raum) = session.aktueller_raum {
            self.raeume.leave(raum, session_id);
        }
        self.sessions.entfernen(session_id)
    }

    /// Raeumt die Session und benachrichtigt den verlassenen Raum
    ///
    /// Einziger Pfad fuer Disconnect, Kick und Ban. Nur der erste Aufruf
    /// fuer eine Session benachrichtigt, weitere liefern `None`.
    pub async fn session_beenden(&self, session_id: SessionId) -> Option<Session> {
        let session = self.session_raeumen(session_id)?;

        if let Some(ref raum) = session.aktueller_raum {
            self.mitgliedschaft_persistieren(raum).await;
            self.raum_update_senden(raum);
        }
        if session.ist_beigetreten() {
            self.raum_liste_senden();
        }

        tracing::debug!(
            session_id = %session_id,
            raum = ?session.aktueller_raum,
            "Session beendet"
        );
        Some(session)
    }

    /// Evakuiert alle Mitglieder (Raum `None`) und entfernt dann den Raum
    pub fn raum_aufloesen(&self, name: &str) -> RelayResult<Vec<SessionId>> {
        let _sperre = self.mitgliedschaft.lock();

        let mitglieder = self
            .raeume
            .mitglieder(name)
            .ok_or_else(|| RelayError::RaumNichtGefunden(name.to_string()))?;

        for id in &mitglieder {
            self.raeume.leave(name, *id);
            // Eine gerade getrennte Session ist kein Fehler
            let _ = self.sessions.raum_setzen(*id, None);
        }
        self.raeume.delete(name)?;

        Ok(mitglieder)
    }

    /// Prueft ob Verzeichnis und Registry uebereinstimmen
    ///
    /// Jedes Mitglied eines Raums ist eine Live-Session mit genau diesem
    /// Raum, und jede Session mit Raum ist dort Mitglied.
    pub fn mitgliedschaft_konsistent(&self) -> bool {
        let _sperre = self.mitgliedschaft.lock();

        let zuordnungen = self.sessions.raum_zuordnungen();
        let snapshot = self.raeume.snapshot();

        let raeume_ok = snapshot.iter().all(|raum| {
            raum.mitglieder.iter().all(|id| {
                zuordnungen
                    .iter()
                    .any(|(sid, r)| sid == id && r.as_deref() == Some(raum.name.as_str()))
            })
        });
        let sessions_ok = zuordnungen.iter().all(|(sid, raum)| match raum {
            None => snapshot.iter().all(|r| !r.mitglieder.contains(sid)),
            Some(name) => snapshot
                .iter()
                .any(|r| &r.name == name && r.mitglieder.contains(sid)),
        });

        raeume_ok && sessions_ok
    }

    // -----------------------------------------------------------------------
    // Benachrichtigungen
    // -----------------------------------------------------------------------

    /// `room_list` mit allen Raeumen und den Anzeigenamen ihrer Mitglieder
    pub fn raum_liste(&self) -> ServerNachricht {
        let rooms = self
            .raeume
            .snapshot()
            .into_iter()
            .map(|raum| RaumInfo {
                members: raum
                    .mitglieder
                    .iter()
                    .filter_map(|id| self.sessions.anzeigename(*id))
                    .collect(),
                name: raum.name,
                has_password: raum.hat_passwort,
            })
            .collect();

        ServerNachricht::RoomList {
            server_name: self.config.server_name.clone(),
            rooms,
        }
    }

    /// `room_update` fuer einen Raum; `None` wenn der Raum nicht existiert
    pub fn raum_update(&self, raum: &str) -> Option<ServerNachricht> {
        let members = self
            .raeume
            .mitglieder(raum)?
            .into_iter()
            .filter_map(|id| {
                self.sessions
                    .anzeigename(id)
                    .map(|username| MitgliedInfo { id, username })
            })
            .collect();

        Some(ServerNachricht::RoomUpdate {
            room: raum.to_string(),
            members,
        })
    }

    /// Sendet `room_list` an alle Sessions
    pub fn raum_liste_senden(&self) {
        self.verteiler.an_alle(&self.raum_liste());
    }

    /// Sendet `room_update` an alle Mitglieder des Raums
    pub fn raum_update_senden(&self, raum: &str) {
        if let Some(update) = self.raum_update(raum) {
            if let Some(mitglieder) = self.raeume.mitglieder(raum) {
                self.verteiler.senden_an(&mitglieder, &update);
            }
        }
    }

    /// Schreibt die aktuelle Mitgliederliste (UIDs) eines Raums
    ///
    /// Fehler werden geloggt; das Verzeichnis im Speicher bleibt massgeblich.
    pub async fn mitgliedschaft_persistieren(&self, raum: &str) {
        let Some(mitglieder) = self.raeume.mitglieder(raum) else {
            return;
        };
        let uids: Vec<String> = mitglieder
            .into_iter()
            .filter_map(|id| self.sessions.uid(id))
            .collect();

        if let Err(e) = self.persistenz.persist_room_membership(raum, &uids).await {
            tracing::warn!(raum = %raum, fehler = %e, "Mitgliedschaft nicht persistiert");
        }
    }
}
