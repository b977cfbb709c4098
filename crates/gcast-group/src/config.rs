use std::str::FromStr;

use serde::Serialize;

use crate::error::GroupError;
use crate::types::{Frame, MessageType};

/// Encoding used by the `_encoded` fanout variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadCodec {
    /// Compact JSON, no trailing newline.
    #[default]
    Json,
    /// MessagePack (named fields).
    MessagePack,
}

impl PayloadCodec {
    /// Encode `value` into a frame tagged with `kind`.
    pub fn encode<T: Serialize + ?Sized>(
        self,
        value: &T,
        kind: MessageType,
    ) -> Result<Frame, GroupError> {
        let data = match self {
            PayloadCodec::Json => serde_json::to_vec(value)?,
            PayloadCodec::MessagePack => rmp_serde::to_vec_named(value)?,
        };
        Ok(Frame::new(data, kind))
    }
}

impl FromStr for PayloadCodec {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(PayloadCodec::Json),
            "msgpack" | "messagepack" => Ok(PayloadCodec::MessagePack),
            other => Err(GroupError::Config(format!("unknown codec '{other}'"))),
        }
    }
}

/// Configuration for a [`GroupRegistry`](crate::GroupRegistry).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use gcast_group::{GroupConfig, PayloadCodec};
///
/// let config = GroupConfig::new()
///     .codec(PayloadCodec::MessagePack)
///     .initial_capacity(1024);
/// ```
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Codec for structured payloads.
    pub(crate) codec: PayloadCodec,
    /// Capacity hint for the registry map.
    pub(crate) initial_capacity: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupConfig {
    /// Create a new config with defaults.
    ///
    /// If the `GCAST_CODEC` environment variable holds `json` or `msgpack`,
    /// it selects the payload codec. Unparseable values are ignored.
    pub fn new() -> Self {
        let codec = std::env::var("GCAST_CODEC")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            codec,
            initial_capacity: 64,
        }
    }

    /// Set the payload codec (default: JSON).
    pub fn codec(mut self, codec: PayloadCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the registry capacity hint (default: 64).
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn payload_codec(&self) -> PayloadCodec {
        self.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_parse() {
        assert_eq!("json".parse::<PayloadCodec>().unwrap(), PayloadCodec::Json);
        assert_eq!(
            " MsgPack ".parse::<PayloadCodec>().unwrap(),
            PayloadCodec::MessagePack
        );
        assert!("yaml".parse::<PayloadCodec>().is_err());
    }

    #[test]
    fn json_encoding_is_compact() {
        let frame = PayloadCodec::Json
            .encode(&serde_json::json!({"type": "typing", "user": "alice"}), MessageType::Text)
            .unwrap();
        let text = std::str::from_utf8(&frame.data).unwrap();
        assert!(!text.ends_with('\n'));
        assert!(!text.contains(' '));
        assert_eq!(frame.kind, MessageType::Text);
    }

    #[test]
    fn msgpack_encoding_keeps_kind() {
        #[derive(Serialize)]
        struct Typing<'a> {
            user: &'a str,
        }
        let frame = PayloadCodec::MessagePack
            .encode(&Typing { user: "bob" }, MessageType::Binary)
            .unwrap();
        let decoded: serde_json::Value = rmp_serde::from_slice(&frame.data).unwrap();
        assert_eq!(decoded["user"], "bob");
        assert_eq!(frame.kind, MessageType::Binary);
    }

    #[test]
    fn builder_overrides() {
        let config = GroupConfig::new()
            .codec(PayloadCodec::MessagePack)
            .initial_capacity(8);
        assert_eq!(config.payload_codec(), PayloadCodec::MessagePack);
        assert_eq!(config.initial_capacity, 8);
    }
}
