//! sprechraum-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Server ueber die WebSocket-Verbindung ausgetauscht werden, sowie die
//! Regeln fuer Frame-Klassifizierung und Groessenlimits.

pub mod control;
pub mod wire;

pub use control::{ClientNachricht, ErrorCode, ServerNachricht};
pub use wire::{Eingehend, WireCodec, WireError};
