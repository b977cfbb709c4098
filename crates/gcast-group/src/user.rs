/// User record as seen by the group layer.
///
/// A user owns two independently locked maps:
/// - `groups`: back-references to every group the user belongs to. This is
///   the "user lock" of the user → registry → group ordering.
/// - `connections`: the user's live connections, grouped per room.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::ConnectionHandle;
use crate::group::{FanoutReport, Group};
use crate::types::{ConnectionId, Frame, GroupId, RoomId, UserId};

pub struct User {
    id: UserId,
    groups: RwLock<HashMap<GroupId, Arc<Group>>>,
    connections: RwLock<HashMap<RoomId, Vec<ConnectionHandle>>>,
}

impl User {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            groups: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    // ── Group back-map ───────────────────────────────────────────────────

    /// All groups this user currently belongs to.
    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.groups.read().values().cloned().collect()
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_in_group(&self, group_id: &str) -> bool {
        self.groups.read().contains_key(group_id)
    }

    /// Shortcut for users that typically sit in a single group.
    ///
    /// With `size_predicate == 0`, returns any group if the user has at least
    /// one. Otherwise returns a group only when the user belongs to exactly
    /// `size_predicate` groups.
    pub fn first_group(&self, size_predicate: usize) -> Option<Arc<Group>> {
        let groups = self.groups.read();
        let matches = if size_predicate == 0 {
            !groups.is_empty()
        } else {
            groups.len() == size_predicate
        };
        if matches {
            groups.values().next().cloned()
        } else {
            None
        }
    }

    /// The back-map lock. Always acquired before the registry lock.
    pub(crate) fn groups_lock(&self) -> &RwLock<HashMap<GroupId, Arc<Group>>> {
        &self.groups
    }

    // ── Connections ──────────────────────────────────────────────────────

    /// Register a live connection of this user inside `room`.
    pub fn attach_connection(&self, room: &RoomId, conn: ConnectionHandle) {
        let mut conns = self.connections.write();
        let set = conns.entry(room.clone()).or_default();
        set.retain(|c| c.id() != conn.id());
        set.push(conn);
    }

    /// Forget a connection. Returns `false` if it was not attached to `room`.
    pub fn detach_connection(&self, room: &RoomId, conn_id: &ConnectionId) -> bool {
        let mut conns = self.connections.write();
        let Some(set) = conns.get_mut(room) else {
            return false;
        };
        let before = set.len();
        set.retain(|c| c.id() != conn_id);
        let removed = set.len() != before;
        if set.is_empty() {
            conns.remove(room);
        }
        removed
    }

    /// Live connections of this user inside `room`.
    pub fn connections_in(&self, room: &RoomId) -> Vec<ConnectionHandle> {
        self.connections
            .read()
            .get(room)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of live connections across every room.
    pub fn connection_count(&self) -> usize {
        self.connections.read().values().map(Vec::len).sum()
    }

    /// Send `frame` to every connection of this user inside `room`, skipping
    /// `except` if given.
    ///
    /// Holds the connection-set read lock for the whole walk; `send` is
    /// non-blocking by contract.
    pub fn deliver(
        &self,
        room: &RoomId,
        frame: &Frame,
        except: Option<&ConnectionId>,
    ) -> FanoutReport {
        let mut report = FanoutReport::default();
        let conns = self.connections.read();
        let Some(set) = conns.get(room) else {
            return report;
        };
        for conn in set {
            if except.is_some_and(|skip| conn.id() == skip) {
                continue;
            }
            match conn.send(frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(user = %self.id, room = %room, "send failed: {e}");
                }
            }
        }
        report
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelConnection, Connection};

    fn room() -> RoomId {
        RoomId::from("room-1")
    }

    #[test]
    fn new_user_has_no_groups() {
        let user = User::new("alice");
        assert_eq!(user.id().as_ref(), "alice");
        assert!(user.groups().is_empty());
        assert!(user.first_group(0).is_none());
        assert!(user.first_group(1).is_none());
    }

    #[test]
    fn attach_and_detach_connection() {
        let user = User::new("alice");
        let (conn, _rx) = ChannelConnection::pair(4);
        let conn_id = conn.id().clone();

        user.attach_connection(&room(), conn);
        assert_eq!(user.connections_in(&room()).len(), 1);
        assert_eq!(user.connection_count(), 1);

        assert!(user.detach_connection(&room(), &conn_id));
        assert!(!user.detach_connection(&room(), &conn_id));
        assert_eq!(user.connection_count(), 0);
    }

    #[test]
    fn attach_same_connection_twice_keeps_one() {
        let user = User::new("alice");
        let (conn, _rx) = ChannelConnection::pair(4);
        user.attach_connection(&room(), conn.clone());
        user.attach_connection(&room(), conn);
        assert_eq!(user.connections_in(&room()).len(), 1);
    }

    #[test]
    fn deliver_skips_excluded_connection() {
        let user = User::new("alice");
        let (c1, mut rx1) = ChannelConnection::pair(4);
        let (c2, mut rx2) = ChannelConnection::pair(4);
        let skip = c1.id().clone();
        user.attach_connection(&room(), c1);
        user.attach_connection(&room(), c2);

        let report = user.deliver(&room(), &Frame::text("x"), Some(&skip));
        assert_eq!(report.delivered, 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn deliver_is_scoped_to_room() {
        let user = User::new("alice");
        let (c1, mut rx1) = ChannelConnection::pair(4);
        user.attach_connection(&RoomId::from("other"), c1);

        let report = user.deliver(&room(), &Frame::text("x"), None);
        assert_eq!(report, FanoutReport::default());
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn deliver_counts_failures() {
        let user = User::new("alice");
        let (c1, rx1) = ChannelConnection::pair(4);
        drop(rx1);
        user.attach_connection(&room(), c1);

        let report = user.deliver(&room(), &Frame::text("x"), None);
        assert_eq!(report.delivered, 0);
        assert_eq!(report.failed, 1);
    }
}
