//! Fehlertypen fuer das Datenbank-Crate

use thiserror::Error;

/// Datenbank-Fehlertypen
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Eindeutigkeitsverletzung: {0}")]
    Eindeutigkeit(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interner DB-Fehler: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn es sich um einen Eindeutigkeitsfehler handelt
    pub fn ist_eindeutigkeit(&self) -> bool {
        match self {
            Self::Eindeutigkeit(_) => true,
            Self::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
