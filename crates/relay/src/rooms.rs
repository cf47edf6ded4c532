//! Raum-Verzeichnis – Raeume, Passwoerter und Mitgliedermengen
//!
//! Raeume sind nach Namen sortiert abgelegt, damit Snapshots ohne
//! zwischenzeitliche Aenderung identisch sind. Ein leerer Raum bleibt
//! bestehen bis er explizit geloescht wird.
//!
//! Das Verzeichnis kennt nur Session-IDs. Die Konsistenz mit
//! `Session::aktueller_raum` stellt `RelayState` sicher.

use parking_lot::RwLock;
use sprechraum_core::types::SessionId;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raum {
    pub name: String,
    pub passwort: Option<String>,
    /// Mitglieder in Beitrittsreihenfolge
    pub mitglieder: Vec<SessionId>,
}

impl Raum {
    fn neu(name: &str, passwort: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passwort,
            mitglieder: Vec::new(),
        }
    }

    pub fn hat_passwort(&self) -> bool {
        self.passwort.is_some()
    }

    fn passwort_passt(&self, angegeben: Option<&str>) -> bool {
        match self.passwort.as_deref() {
            None => true,
            Some(pw) => angegeben == Some(pw),
        }
    }
}

/// Eintrag eines Verzeichnis-Snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaumSnapshot {
    pub name: String,
    pub mitglieder: Vec<SessionId>,
    pub hat_passwort: bool,
}

// ---------------------------------------------------------------------------
// RaumVerzeichnis
// ---------------------------------------------------------------------------

/// Zuordnung Raumname -> Raum
///
/// Thread-safe via Arc + RwLock. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct RaumVerzeichnis {
    inner: Arc<RwLock<BTreeMap<String, Raum>>>,
}

impl RaumVerzeichnis {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Laedt einen persistierten Raum (ohne Mitglieder)
    pub fn laden(&self, name: &str, passwort: Option<String>) {
        self.inner
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Raum::neu(name, passwort));
    }

    /// Liefert den Raum und ob er dabei angelegt wurde
    pub fn get_or_create(&self, name: &str) -> (Raum, bool) {
        let mut raeume = self.inner.write();
        let mut erstellt = false;
        let raum = raeume.entry(name.to_string()).or_insert_with(|| {
            erstellt = true;
            Raum::neu(name, None)
        });
        if erstellt {
            tracing::info!(raum = %name, "Raum implizit angelegt");
        }
        (raum.clone(), erstellt)
    }

    /// Privilegiertes Anlegen; schlaegt fehl wenn der Name vergeben ist
    pub fn create_explicit(&self, name: &str, passwort: Option<String>) -> RelayResult<Raum> {
        let mut raeume = self.inner.write();
        if raeume.contains_key(name) {
            return Err(RelayError::RaumExistiert(name.to_string()));
        }
        let raum = Raum::neu(name, passwort);
        raeume.insert(name.to_string(), raum.clone());
        Ok(raum)
    }

    /// Fuegt die Session dem Raum hinzu
    ///
    /// Das Passwort wird nur geprueft wenn `passwort_pruefen` gesetzt ist;
    /// wer wann geprueft wird entscheidet der Aufrufer.
    pub fn join(
        &self,
        name: &str,
        session_id: SessionId,
        passwort: Option<&str>,
        passwort_pruefen: bool,
    ) -> RelayResult<()> {
        let mut raeume = self.inner.write();
        let raum = raeume
            .get_mut(name)
            .ok_or_else(|| RelayError::RaumNichtGefunden(name.to_string()))?;

        if passwort_pruefen && !raum.passwort_passt(passwort) {
            return Err(RelayError::FalschesPasswort {
                raum: name.to_string(),
            });
        }

        if !raum.mitglieder.contains(&session_id) {
            raum.mitglieder.push(session_id);
        }
        Ok(())
    }

    /// Entfernt die Session aus dem Raum; No-op wenn sie nicht Mitglied ist
    pub fn leave(&self, name: &str, session_id: SessionId) {
        if let Some(raum) = self.inner.write().get_mut(name) {
            raum.mitglieder.retain(|id| *id != session_id);
        }
    }

    /// Entfernt den Raum. Mitglieder muessen vorher evakuiert worden sein.
    pub fn delete(&self, name: &str) -> RelayResult<Raum> {
        let raum = self
            .inner
            .write()
            .remove(name)
            .ok_or_else(|| RelayError::RaumNichtGefunden(name.to_string()))?;
        if !raum.mitglieder.is_empty() {
            tracing::warn!(
                raum = %name,
                mitglieder = raum.mitglieder.len(),
                "Raum mit Mitgliedern geloescht"
            );
        }
        Ok(raum)
    }

    pub fn passwort_setzen(&self, name: &str, passwort: Option<String>) -> RelayResult<()> {
        let mut raeume = self.inner.write();
        let raum = raeume
            .get_mut(name)
            .ok_or_else(|| RelayError::RaumNichtGefunden(name.to_string()))?;
        raum.passwort = passwort;
        Ok(())
    }

    /// Aktuelle Mitglieder (frischer Lookup, kein Cache)
    pub fn mitglieder(&self, name: &str) -> Option<Vec<SessionId>> {
        self.inner.read().get(name).map(|r| r.mitglieder.clone())
    }

    pub fn existiert(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Alle Raeume in lexikographischer Reihenfolge
    pub fn snapshot(&self) -> Vec<RaumSnapshot> {
        self.inner
            .read()
            .values()
            .map(|r| RaumSnapshot {
                name: r.name.clone(),
                mitglieder: r.mitglieder.clone(),
                hat_passwort: r.hat_passwort(),
            })
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.inner.read().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
