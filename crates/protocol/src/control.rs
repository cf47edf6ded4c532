//! Control-Protokoll (WebSocket-Textframes)
//!
//! Definiert alle Steuerungsnachrichten die als JSON-Textframes zwischen
//! Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht ist ein JSON-Objekt mit einem `type`-Feld
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Audio laeuft ausschliesslich ueber Binaerframes und taucht hier nicht auf

use serde::{Deserialize, Serialize};
use sprechraum_core::types::{Rolle, SessionId};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer `error`-Antworten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Berechtigung
    PermissionDenied,
    // Raeume
    RoomNotFound,
    RoomAlreadyExists,
    WrongPassword,
    AlreadyInRoom,
    // Benutzer
    UserNotFound,
    InvalidCredential,
    Banned,
    // Protokoll
    InvalidRequest,
    NotJoined,
    RateLimited,
    // Server
    ServerFull,
    InternalError,
}

impl ErrorCode {
    /// Wire-Darstellung des Codes
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomAlreadyExists => "ROOM_ALREADY_EXISTS",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::AlreadyInRoom => "ALREADY_IN_ROOM",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::Banned => "BANNED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NotJoined => "NOT_JOINED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ServerFull => "SERVER_FULL",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle Nachrichten die ein Client senden darf
///
/// Die Raum-Operationen akzeptieren zusaetzlich die aelteren Namen
/// `create_channel`, `edit_channel` und `delete_channel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientNachricht {
    /// Erste Nachricht jeder Verbindung
    Join {
        username: String,
        /// Stabile Identitaet; fehlt sie, vergibt der Server eine neue
        #[serde(default)]
        uid: Option<String>,
        /// Zielraum (Standard: Standardraum)
        #[serde(default)]
        room: Option<String>,
        /// Server-Passwort
        #[serde(default)]
        password: Option<String>,
        /// Passwort des Zielraums
        #[serde(default)]
        room_password: Option<String>,
    },

    /// Chat-Nachricht an den aktuellen Raum
    Message { message: String },

    SwitchRoom {
        new_room: String,
        #[serde(default)]
        room_password: Option<String>,
    },

    #[serde(alias = "create_channel")]
    CreateRoom {
        room_name: String,
        #[serde(default)]
        room_password: Option<String>,
    },

    /// Setzt oder entfernt das Raum-Passwort
    #[serde(alias = "edit_channel")]
    EditRoom {
        room_name: String,
        #[serde(default)]
        room_password: Option<String>,
    },

    #[serde(alias = "delete_channel")]
    DeleteRoom { room_name: String },

    /// Direktnachricht an eine Live-Session (per Anzeigename)
    PrivateMessage { recipient: String, message: String },

    Ban {
        username: String,
        #[serde(default)]
        reason: Option<String>,
    },

    Kick {
        username: String,
        #[serde(default)]
        reason: Option<String>,
    },

    UsePrivilegeKey { key: String },

    /// Sprech-Indikator an den aktuellen Raum
    Talking { status: bool },
}

impl ClientNachricht {
    /// Wire-Namen aller bekannten Client-Nachrichten (inkl. Aliase)
    pub const BEKANNTE_TYPEN: &'static [&'static str] = &[
        "join",
        "message",
        "switch_room",
        "create_room",
        "create_channel",
        "edit_room",
        "edit_channel",
        "delete_room",
        "delete_channel",
        "private_message",
        "ban",
        "kick",
        "use_privilege_key",
        "talking",
    ];

    /// Kurzname fuer Logging
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Message { .. } => "message",
            Self::SwitchRoom { .. } => "switch_room",
            Self::CreateRoom { .. } => "create_room",
            Self::EditRoom { .. } => "edit_room",
            Self::DeleteRoom { .. } => "delete_room",
            Self::PrivateMessage { .. } => "private_message",
            Self::Ban { .. } => "ban",
            Self::Kick { .. } => "kick",
            Self::UsePrivilegeKey { .. } => "use_privilege_key",
            Self::Talking { .. } => "talking",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Eintrag einer `room_update`-Mitgliederliste
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitgliedInfo {
    pub id: SessionId,
    pub username: String,
}

/// Eintrag einer `room_list`-Nachricht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaumInfo {
    pub name: String,
    /// Anzeigenamen der Mitglieder
    pub members: Vec<String>,
    pub has_password: bool,
}

/// Alle Nachrichten die der Server sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    Info {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Rolle>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uid: Option<String>,
    },

    Message { username: String, message: String },

    PrivateMessage { username: String, message: String },

    RoomUpdate {
        room: String,
        members: Vec<MitgliedInfo>,
    },

    RoomList {
        server_name: String,
        rooms: Vec<RaumInfo>,
    },

    Error { code: ErrorCode, message: String },

    Talking { username: String, status: bool },

    PasswordRequired { room: String },

    SwitchedRoom { room: String, message: String },
}

impl ServerNachricht {
    /// Erstellt eine einfache Info-Nachricht
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
            role: None,
            uid: None,
        }
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
