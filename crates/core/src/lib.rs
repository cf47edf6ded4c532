//! sprechraum-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Sprechraum-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, SprechraumError};
pub use types::{Rolle, SessionId};
