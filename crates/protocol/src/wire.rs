//! Wire-Format fuer WebSocket-Verbindungen
//!
//! Eine Verbindung transportiert zwei Frame-Arten:
//!
//! ```text
//! Textframe  -> JSON-Objekt mit `type`-Feld  -> ClientNachricht
//! Binaerframe -> opakes Audio                 -> unveraendert weitergeleitet
//! ```
//!
//! Beide Arten unterliegen derselben maximalen Frame-Groesse
//! (Standard: 1 MB). Fehler beim Dekodieren sind nie fatal fuer die
//! Verbindung; der Aufrufer antwortet mit einem `error`-Frame.

use bytes::Bytes;
use thiserror::Error;

use crate::control::{ClientNachricht, ServerNachricht};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { laenge: usize, maximum: usize },

    #[error("Kein gueltiges JSON: {0}")]
    KeinJson(#[source] serde_json::Error),

    #[error("Nachricht ohne 'type'-Feld")]
    FehlenderTyp,

    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    #[error("Ungueltige Felder fuer '{typ}': {fehler}")]
    UngueltigeFelder {
        typ: String,
        #[source]
        fehler: serde_json::Error,
    },

    #[error("JSON-Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Eingehende Frames
// ---------------------------------------------------------------------------

/// Klassifizierter eingehender Frame
#[derive(Debug, Clone, PartialEq)]
pub enum Eingehend {
    /// Strukturierte Steuerungsnachricht (Textframe)
    Steuerung(ClientNachricht),
    /// Opaker Audio-Frame (Binaerframe)
    Audio(Bytes),
}

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// Dekodiert eingehende und kodiert ausgehende Frames
///
/// Transportunabhaengig: der Aufrufer liefert den Inhalt eines Text- oder
/// Binaerframes, die Unterscheidung trifft die Transportschicht.
#[derive(Debug, Clone, Copy)]
pub struct WireCodec {
    max_frame_size: usize,
}

impl WireCodec {
    /// Erstellt einen neuen `WireCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `WireCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn pruefe_groesse(&self, laenge: usize) -> Result<(), WireError> {
        if laenge > self.max_frame_size {
            return Err(WireError::ZuGross {
                laenge,
                maximum: self.max_frame_size,
            });
        }
        Ok(())
    }

    /// Dekodiert den Inhalt eines Textframes
    pub fn decode_text(&self, text: &str) -> Result<Eingehend, WireError> {
        self.pruefe_groesse(text.len())?;

        let wert: serde_json::Value = serde_json::from_str(text).map_err(WireError::KeinJson)?;
        let typ = wert
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(WireError::FehlenderTyp)?
            .to_string();

        if !ClientNachricht::BEKANNTE_TYPEN.contains(&typ.as_str()) {
            return Err(WireError::UnbekannterTyp(typ));
        }

        let nachricht = serde_json::from_value(wert)
            .map_err(|fehler| WireError::UngueltigeFelder { typ, fehler })?;
        Ok(Eingehend::Steuerung(nachricht))
    }

    /// Prueft einen Binaerframe und reicht ihn als Audio durch
    pub fn decode_binaer(&self, daten: impl Into<Bytes>) -> Result<Eingehend, WireError> {
        let daten = daten.into();
        self.pruefe_groesse(daten.len())?;
        Ok(Eingehend::Audio(daten))
    }

    /// Kodiert eine Server-Nachricht als Inhalt eines Textframes
    pub fn encode(&self, nachricht: &ServerNachricht) -> Result<String, WireError> {
        let json = nachricht.to_json().map_err(WireError::Serialisierung)?;
        self.pruefe_groesse(json.len())?;
        Ok(json)
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
