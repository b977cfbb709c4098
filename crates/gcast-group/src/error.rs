use crate::types::ConnectionId;

/// Errors at the collaborator edges of the group layer.
///
/// Lookups never fail: an unknown group or user is `None`. Only payload
/// encoding and per-connection delivery can go wrong.
#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection {connection_id} is closed")]
    ConnectionClosed { connection_id: ConnectionId },

    #[error("connection {connection_id} send buffer is full")]
    Backpressure { connection_id: ConnectionId },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for GroupError {
    fn from(e: serde_json::Error) -> Self {
        GroupError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for GroupError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        GroupError::Serialization(e.to_string())
    }
}
