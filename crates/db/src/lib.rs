//! sprechraum-db – Persistenz-Schicht
//!
//! Dieses Crate stellt den Persistenz-Adapter bereit, den die Relay-Engine
//! fuer Identitaeten, Raeume, Chatverlauf, Bans und Privilege-Keys nutzt.
//! Die Engine sieht nur das Trait-Objekt `dyn Persistenz`; `SqliteDb` ist
//! die einzige mitgelieferte Implementierung.
//!
//! Zusaetzlich: idempotenter Bootstrap beim Start und Sicherungen via
//! `VACUUM INTO`.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    BanRepository, DatabaseConfig, DbResult, IdentityRepository, MessageRepository, Persistenz,
    PrivilegeKeyRepository, RoomRepository,
};
pub use sqlite::SqliteDb;
