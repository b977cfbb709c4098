/// GroupRegistry: process-wide directory of live groups.
///
/// Owns one strong reference per registered group. Every compound operation
/// takes its locks in the fixed order
///
/// ```text
/// user back-map  →  registry  →  group membership
/// ```
///
/// and every call site touching two or more of these follows it. Fanout
/// never holds any of them while sending.
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::GroupConfig;
use crate::directory::UserDirectory;
use crate::group::Group;
use crate::stats::{RegistryStats, StatsSnapshot};
use crate::types::GroupId;
use crate::user::User;

pub(crate) struct RegistryInner {
    pub(crate) groups: RwLock<HashMap<GroupId, Arc<Group>>>,
    pub(crate) directory: Arc<dyn UserDirectory>,
    pub(crate) config: GroupConfig,
    pub(crate) stats: RegistryStats,
}

impl RegistryInner {
    /// Erase `group` if it is the exact object registered under its id.
    ///
    /// Caller holds the registry write lock and the group's membership lock.
    pub(crate) fn erase(&self, groups: &mut HashMap<GroupId, Arc<Group>>, group: &Group) -> bool {
        let registered = groups
            .get(group.id())
            .is_some_and(|g| ptr::eq(Arc::as_ptr(g), group));
        if registered {
            groups.remove(group.id());
            self.stats.group_deregistered();
            tracing::debug!(group = %group.id(), "group deregistered");
        }
        registered
    }
}

/// Handle to a registry. Cloning shares the same underlying map.
#[derive(Clone)]
pub struct GroupRegistry {
    inner: Arc<RegistryInner>,
}

impl GroupRegistry {
    pub fn new(directory: Arc<dyn UserDirectory>, config: GroupConfig) -> Self {
        let groups = HashMap::with_capacity(config.initial_capacity);
        Self {
            inner: Arc::new(RegistryInner {
                groups: RwLock::new(groups),
                directory,
                config,
                stats: RegistryStats::default(),
            }),
        }
    }

    /// Create a registry and install its offline hook on `directory`.
    pub fn configure(directory: Arc<dyn UserDirectory>, config: GroupConfig) -> Self {
        let registry = Self::new(Arc::clone(&directory), config);
        registry.install_offline_hook();
        registry
    }

    /// Register the offline hook on this registry's directory.
    ///
    /// When a user goes offline, it is removed from every group it belongs
    /// to and its back-map is cleared.
    pub fn install_offline_hook(&self) {
        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        self.inner
            .directory
            .register_offline_hook(Arc::new(move |user: &Arc<User>| {
                if weak.strong_count() == 0 {
                    return;
                }
                scrub_user(user);
            }));
    }

    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    // ── Creation ─────────────────────────────────────────────────────────

    /// Create a group whose sole member is `user`.
    ///
    /// An existing group with the same id is replaced (last writer wins):
    /// it is marked deregistered, but its members keep their handles.
    pub fn create_group(&self, id: impl Into<GroupId>, user: &Arc<User>) -> Arc<Group> {
        let id = id.into();
        let group = Arc::new(Group::new(id.clone(), user, &self.inner));

        let mut back = user.groups_lock().write();
        {
            let mut groups = self.inner.groups.write();
            if let Some(previous) = groups.insert(id.clone(), Arc::clone(&group)) {
                self.replaced(&previous);
            }
        }
        back.insert(id, Arc::clone(&group));
        drop(back);

        self.inner.stats.group_created();
        tracing::debug!(group = %group.id(), user = %user.id(), "group created");
        group
    }

    /// Join every group in `ids`, creating the missing ones.
    ///
    /// The user's back-map lock and the registry lock are held for the whole
    /// batch, so no other create/join/deregistration can interleave with it.
    pub fn create_group_batch<I, S>(&self, ids: I, user: &Arc<User>)
    where
        I: IntoIterator<Item = S>,
        S: Into<GroupId>,
    {
        let mut back = user.groups_lock().write();
        let mut groups = self.inner.groups.write();

        for id in ids {
            let id = id.into();
            if let Some(existing) = groups.get(&id) {
                existing.add(user);
                back.insert(id, Arc::clone(existing));
                self.inner.stats.group_joined();
                continue;
            }

            let group = Arc::new(Group::new(id.clone(), user, &self.inner));
            groups.insert(id.clone(), Arc::clone(&group));
            back.insert(id, group);
            self.inner.stats.group_created();
        }
        tracing::debug!(user = %user.id(), groups = back.len(), "batch join");
    }

    // ── Lookup ───────────────────────────────────────────────────────────

    pub fn get_group(&self, id: &str) -> Option<Arc<Group>> {
        self.inner.groups.read().get(id).cloned()
    }

    /// Batch lookup. Unknown ids are skipped, so the result may be shorter
    /// than the input.
    pub fn get_groups<I, S>(&self, ids: I) -> Vec<Arc<Group>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups = self.inner.groups.read();
        ids.into_iter()
            .filter_map(|id| groups.get(id.as_ref()).cloned())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.groups.read().contains_key(id)
    }

    pub fn group_count(&self) -> usize {
        self.inner.groups.read().len()
    }

    /// Ids of every registered group, in no particular order.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.inner.groups.read().keys().cloned().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    // ── Leaving ──────────────────────────────────────────────────────────

    /// Remove `user` from group `id`, dropping both sides of the relation.
    ///
    /// Returns `false` if the user was not a member.
    pub fn leave(&self, id: &str, user: &Arc<User>) -> bool {
        let mut back = user.groups_lock().write();
        let group = match back.remove(id) {
            Some(group) => group,
            None => match self.get_group(id) {
                Some(group) => group,
                None => return false,
            },
        };
        let was_member = group.contains(user.id());
        group.remove(user);
        was_member
    }

    /// Evict every member of group `id` and deregister it, clearing each
    /// member's back-reference. Returns the number of evicted members.
    pub fn dissolve(&self, id: &str) -> usize {
        let Some(group) = self.get_group(id) else {
            return 0;
        };
        let mut evicted = 0;
        group.remove_all(|user| {
            let mut back = user.groups_lock().write();
            if back.get(group.id()).is_some_and(|g| Arc::ptr_eq(g, &group)) {
                back.remove(group.id());
            }
            evicted += 1;
        });
        evicted
    }

    /// Scrub `user` from every group it belongs to.
    ///
    /// This is what the installed offline hook runs; it is public for
    /// directories that cannot host hooks.
    pub fn user_offline(&self, user: &Arc<User>) {
        scrub_user(user);
    }

    fn replaced(&self, previous: &Arc<Group>) {
        previous.mark_replaced();
        self.inner.stats.group_replaced();
        tracing::warn!(group = %previous.id(), "group id reused; previous group replaced");
    }
}

/// Drain the user's back-map, then leave each group with no user lock held.
fn scrub_user(user: &Arc<User>) {
    let groups: Vec<Arc<Group>> = {
        let mut back = user.groups_lock().write();
        back.drain().map(|(_, group)| group).collect()
    };
    tracing::debug!(user = %user.id(), groups = groups.len(), "user offline");
    for group in groups {
        group.remove(user);
    }
}
