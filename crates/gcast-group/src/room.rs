/// Conversation context ("room") seam.
///
/// A room scopes which of a user's connections take part in a group's
/// broadcasts, and maps a connection back to its owning user.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::ConnectionHandle;
use crate::group::FanoutReport;
use crate::types::{ConnectionId, Frame, RoomId};
use crate::user::User;

pub trait Room: Send + Sync {
    fn id(&self) -> &RoomId;

    /// Owning user of `conn` inside this room.
    fn resolve_user(&self, conn: &ConnectionId) -> Option<Arc<User>>;

    /// Deliver to every connection `user` holds inside this room.
    fn notify(&self, user: &User, frame: &Frame) -> FanoutReport {
        user.deliver(self.id(), frame, None)
    }
}

/// In-process room keeping a connection → user index.
pub struct LocalRoom {
    id: RoomId,
    owners: RwLock<HashMap<ConnectionId, Arc<User>>>,
}

impl LocalRoom {
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Bind `conn` to `user` inside this room.
    pub fn enter(&self, conn: ConnectionHandle, user: &Arc<User>) {
        self.owners
            .write()
            .insert(conn.id().clone(), Arc::clone(user));
        user.attach_connection(&self.id, conn);
    }

    /// Unbind a connection. Returns its owner, if it was bound.
    pub fn leave(&self, conn_id: &ConnectionId) -> Option<Arc<User>> {
        let user = self.owners.write().remove(conn_id)?;
        user.detach_connection(&self.id, conn_id);
        Some(user)
    }

    pub fn connection_count(&self) -> usize {
        self.owners.read().len()
    }
}

impl Room for LocalRoom {
    fn id(&self) -> &RoomId {
        &self.id
    }

    fn resolve_user(&self, conn: &ConnectionId) -> Option<Arc<User>> {
        self.owners.read().get(conn).cloned()
    }
}
