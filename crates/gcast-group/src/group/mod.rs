/// Group: a named, registry-tracked broadcast scope.
///
/// A group is reachable from its registry iff its membership is non-empty.
/// It starts with exactly one member and deregisters itself in the same
/// logical step that empties it. Once deregistered it never comes back: a
/// later group with the same id is a fresh object.
///
/// Locks touched here, in the global order user → registry → group:
/// - the group's own membership lock for add/get/remove,
/// - the registry lock (then the membership lock again) for the
///   deregistration tail of `remove` and for `remove_all`.
pub mod fanout;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::PayloadCodec;
use crate::registry::RegistryInner;
use crate::types::{GroupId, UserId};
use crate::user::User;

pub use fanout::FanoutReport;

struct Members {
    users: HashMap<UserId, Arc<User>>,
    registered: bool,
}

pub struct Group {
    id: GroupId,
    codec: PayloadCodec,
    members: RwLock<Members>,
    registry: Weak<RegistryInner>,
}

impl Group {
    pub(crate) fn new(id: GroupId, user: &Arc<User>, registry: &Arc<RegistryInner>) -> Self {
        let mut users = HashMap::with_capacity(1);
        users.insert(user.id().clone(), Arc::clone(user));
        Self {
            id,
            codec: registry.config.payload_codec(),
            members: RwLock::new(Members {
                users,
                registered: true,
            }),
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Look up a member by id.
    ///
    /// With `extend_lifespan`, a hit also pushes back the user's idle
    /// eviction deadline. The membership lock is released before the
    /// directory is called.
    pub fn get(&self, user_id: &str, extend_lifespan: bool) -> Option<Arc<User>> {
        let user = self.members.read().users.get(user_id).cloned()?;

        if extend_lifespan {
            if let Some(registry) = self.registry.upgrade() {
                registry.directory.extend_idle_timer(user.id());
                registry.stats.lifespan_extended();
            }
        }
        Some(user)
    }

    /// Membership test by `&str` or `&UserId`.
    pub fn contains<Q>(&self, user_id: &Q) -> bool
    where
        UserId: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.members.read().users.contains_key(user_id)
    }

    /// Snapshot of the current members, in no particular order.
    pub fn members(&self) -> Vec<Arc<User>> {
        self.members.read().users.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().users.is_empty()
    }

    /// Whether the group is still reachable from its registry.
    pub fn is_registered(&self) -> bool {
        self.members.read().registered
    }

    // ── Membership ───────────────────────────────────────────────────────

    /// Insert or overwrite `user`. Idempotent.
    ///
    /// This does not touch the user's back-map; use
    /// [`GroupRegistry::create_group_batch`](crate::GroupRegistry::create_group_batch)
    /// to join with both sides updated.
    pub fn add(&self, user: &Arc<User>) {
        let mut members = self.members.write();
        if !members.registered {
            tracing::debug!(group = %self.id, user = %user.id(), "add on deregistered group");
        }
        members.users.insert(user.id().clone(), Arc::clone(user));
    }

    /// Remove `user`. If that empties the group, deregister it.
    ///
    /// Emptiness is re-checked under the registry lock: a concurrent `add`
    /// that lands between the removal and the deregistration keeps the
    /// group registered.
    pub fn remove(&self, user: &User) {
        {
            let mut members = self.members.write();
            if members.users.remove(user.id()).is_none() {
                return;
            }
            if !members.users.is_empty() || !members.registered {
                return;
            }
        }
        self.deregister_if_empty();
    }

    /// Evict every member and deregister the group.
    ///
    /// `callback` runs once per evicted user after all locks are released,
    /// so it may take the user's back-map lock to drop its reference to this
    /// group.
    pub fn remove_all<F>(&self, mut callback: F)
    where
        F: FnMut(&Arc<User>),
    {
        let evicted: Vec<Arc<User>> = {
            let registry = self.registry.upgrade();
            let mut groups = registry.as_ref().map(|r| r.groups.write());
            let mut members = self.members.write();

            let was_registered = std::mem::replace(&mut members.registered, false);
            if was_registered {
                if let (Some(registry), Some(groups)) = (registry.as_ref(), groups.as_mut()) {
                    registry.erase(groups, self);
                }
            }
            members.users.drain().map(|(_, user)| user).collect()
        };

        tracing::debug!(group = %self.id, evicted = evicted.len(), "group dissolved");
        for user in &evicted {
            callback(user);
        }
    }

    fn deregister_if_empty(&self) {
        let Some(registry) = self.registry.upgrade() else {
            self.members.write().registered = false;
            return;
        };

        let mut groups = registry.groups.write();
        let mut members = self.members.write();
        if !members.users.is_empty() || !members.registered {
            tracing::debug!(group = %self.id, "repopulated before deregistration");
            return;
        }
        members.registered = false;
        registry.erase(&mut groups, self);
    }

    pub(crate) fn codec(&self) -> PayloadCodec {
        self.codec
    }

    pub(crate) fn registry(&self) -> Option<Arc<RegistryInner>> {
        self.registry.upgrade()
    }

    /// Mark a group replaced in the registry by a same-id newcomer.
    pub(crate) fn mark_replaced(&self) {
        self.members.write().registered = false;
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
