//! sprechraum-relay – Session-, Raum- und Relay-Engine
//!
//! Dieser Crate nimmt WebSocket-Verbindungen an, verwaltet Sessions und
//! Raum-Mitgliedschaften, routet Chat- und Steuerungsnachrichten und leitet
//! Audio-Frames an die Mitglieder des Raums des Absenders weiter.
//!
//! ## Architektur
//!
//! ```text
//! RelayServer (TCP/TLS Listener)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, WebSocket)
//!     |  Textframe -> Steuerung, Binaerframe -> Audio
//!     v
//! Dispatcher
//!     |
//!     +-- join_handler      (Join, Identitaet, Ban-Pruefung)
//!     +-- raum_handler      (Switch, Create, Edit, Delete)
//!     +-- chat_handler      (Message, PrivateMessage, Talking)
//!     +-- client_handler    (Kick, Ban)
//!     +-- privilege_handler (Privilege-Key einloesen)
//!
//! SessionRegistry – Live-Sessions (Identitaet, Raum, Rolle, Handle)
//! RaumVerzeichnis – Raeume (Passwort, Mitglieder)
//! Verteiler       – Fan-out an Send-Queues, Audio-Relay
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod rooms;
pub mod server_state;
pub mod sessions;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::Verteiler;
pub use connection::ClientConnection;
pub use dispatcher::{Dispatcher, DispatcherContext};
pub use error::{RelayError, RelayResult};
pub use rooms::RaumVerzeichnis;
pub use server_state::{RelayConfig, RelayState};
pub use sessions::{Ausgehend, SessionHandle, SessionRegistry};
pub use tcp::RelayServer;
