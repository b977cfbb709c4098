/// Identifiers and frame types shared by every gcast module.
///
/// All ids are opaque strings. Groups and users are named by the caller;
/// connections get a random id when the transport does not supply one.
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

// ── Ids ──────────────────────────────────────────────────────────────────

string_id!(
    /// Group identifier, unique within a registry.
    GroupId
);

string_id!(
    /// User identifier, stable for the user's session.
    UserId
);

string_id!(
    /// Conversation context ("room") identifier.
    RoomId
);

string_id!(
    /// Identifier of a single live connection.
    ConnectionId
);

impl ConnectionId {
    /// Create a new random connection ID (e.g., "conn-<uuid>").
    pub fn generate() -> Self {
        Self(format!("conn-{}", uuid::Uuid::new_v4()))
    }
}

// ── MessageType ──────────────────────────────────────────────────────────

/// Framing tag handed to the transport unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[default]
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

// ── Frame ────────────────────────────────────────────────────────────────

/// One encoded message ready for dispatch.
///
/// Cloning is cheap: every recipient shares the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub data: Bytes,
    pub kind: MessageType,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>, kind: MessageType) -> Self {
        Self {
            data: data.into(),
            kind,
        }
    }

    /// UTF-8 text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Bytes::from(text.into()), MessageType::Text)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
