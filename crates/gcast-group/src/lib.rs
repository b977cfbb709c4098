//! Concurrent group registry for a realtime messaging server.
//!
//! Groups are named broadcast scopes over connected users. The registry
//! keeps a group reachable exactly while it has members, users keep
//! back-references to their groups, and fanout snapshots recipients before
//! sending so no lock is held across a send.
//!
//! Collaborators sit behind traits: [`UserDirectory`] (lifespan + offline
//! hook), [`Room`] (connection scoping) and [`Connection`] (non-blocking
//! send). In-process implementations of each ship with the crate.
//!
//! Payload encoding: JSON or MessagePack, chosen by [`GroupConfig`].

pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod group;
pub mod registry;
pub mod room;
pub mod stats;
pub mod types;
pub mod user;

pub use config::{GroupConfig, PayloadCodec};
pub use connection::{ChannelConnection, Connection, ConnectionHandle};
pub use directory::{LocalDirectory, OfflineHook, UserDirectory, DEFAULT_USER_LIFESPAN};
pub use error::GroupError;
pub use group::{FanoutReport, Group};
pub use registry::GroupRegistry;
pub use room::{LocalRoom, Room};
pub use stats::{RegistryStats, StatsSnapshot};
pub use types::{ConnectionId, Frame, GroupId, MessageType, RoomId, UserId};
pub use user::User;
