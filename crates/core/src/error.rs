//! Fehlertypen fuer Sprechraum
//!
//! Kleinster gemeinsamer Nenner. Die Crates definieren eigene Fehler
//! (DbError, RelayError) und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Sprechraum
pub type Result<T> = std::result::Result<T, SprechraumError>;

/// Fehler die in mehreren Crates auftreten koennen
#[derive(Debug, Error)]
pub enum SprechraumError {
    #[error("Ungueltige Rolle: {0}")]
    UngueltigeRolle(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SprechraumError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = SprechraumError::UngueltigeRolle("root".into());
        assert_eq!(e.to_string(), "Ungueltige Rolle: root");
    }
}
