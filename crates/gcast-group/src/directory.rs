/// User directory seam.
///
/// The directory owns user identity and idle eviction. The group layer only
/// needs two things from it: a way to keep a user alive ("prolong lifespan")
/// and a hook fired when a user goes offline.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::UserId;
use crate::user::User;

/// Callback fired once per user that goes offline.
pub type OfflineHook = Arc<dyn Fn(&Arc<User>) + Send + Sync>;

pub trait UserDirectory: Send + Sync {
    /// Push back the idle-eviction deadline of `user_id`. Fire-and-forget.
    fn extend_idle_timer(&self, user_id: &UserId);

    /// Register a callback fired when a user goes offline.
    fn register_offline_hook(&self, hook: OfflineHook);
}

// ── LocalDirectory ───────────────────────────────────────────────────────

/// Default idle lifespan of a user record without live connections.
pub const DEFAULT_USER_LIFESPAN: Duration = Duration::from_secs(60);

struct Entry {
    user: Arc<User>,
    deadline: Instant,
}

/// In-process user directory.
///
/// Eviction is driven by the caller: call [`evict_idle`](Self::evict_idle)
/// from a periodic task.
pub struct LocalDirectory {
    users: RwLock<HashMap<UserId, Entry>>,
    hooks: RwLock<Vec<OfflineHook>>,
    lifespan: Duration,
}

impl Default for LocalDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_USER_LIFESPAN)
    }
}

impl LocalDirectory {
    pub fn new(lifespan: Duration) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            hooks: RwLock::new(Vec::new()),
            lifespan,
        }
    }

    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Get or create the record for `user_id`, refreshing its deadline.
    pub fn connect(&self, user_id: impl Into<UserId>) -> Arc<User> {
        let user_id = user_id.into();
        let deadline = Instant::now() + self.lifespan;
        let mut users = self.users.write();
        let entry = users.entry(user_id.clone()).or_insert_with(|| Entry {
            user: Arc::new(User::new(user_id)),
            deadline,
        });
        entry.deadline = deadline;
        Arc::clone(&entry.user)
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<User>> {
        self.users.read().get(user_id).map(|e| Arc::clone(&e.user))
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Drop a user record immediately and fire the offline hooks.
    pub fn disconnect(&self, user_id: &str) -> Option<Arc<User>> {
        let entry = self.users.write().remove(user_id)?;
        self.fire_offline(&entry.user);
        Some(entry.user)
    }

    /// Evict users past their deadline that hold no live connection.
    ///
    /// Returns the evicted ids. Offline hooks run after the directory lock
    /// is released.
    pub fn evict_idle(&self, now: Instant) -> Vec<UserId> {
        let evicted: Vec<Arc<User>> = {
            let mut users = self.users.write();
            let expired: Vec<UserId> = users
                .iter()
                .filter(|(_, e)| e.deadline <= now && e.user.connection_count() == 0)
                .map(|(id, _)| id.clone())
                .collect();
            expired
                .iter()
                .filter_map(|id| users.remove(id))
                .map(|e| e.user)
                .collect()
        };

        for user in &evicted {
            tracing::debug!(user = %user.id(), "evicting idle user");
            self.fire_offline(user);
        }
        evicted.iter().map(|u| u.id().clone()).collect()
    }

    fn fire_offline(&self, user: &Arc<User>) {
        let hooks = self.hooks.read().clone();
        for hook in hooks {
            hook(user);
        }
    }
}

impl UserDirectory for LocalDirectory {
    fn extend_idle_timer(&self, user_id: &UserId) {
        let deadline = Instant::now() + self.lifespan;
        if let Some(entry) = self.users.write().get_mut(user_id) {
            entry.deadline = deadline;
        }
    }

    fn register_offline_hook(&self, hook: OfflineHook) {
        self.hooks.write().push(hook);
    }
}

// ── Recording directory (tests) ─────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ChannelConnection;
    use crate::types::RoomId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn connect_returns_same_record() {
        let dir = LocalDirectory::default();
        let a = dir.connect("alice");
        let b = dir.connect("alice");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn disconnect_fires_hooks() {
        let dir = LocalDirectory::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        dir.register_offline_hook(Arc::new(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }));

        dir.connect("alice");
        assert!(dir.disconnect("alice").is_some());
        assert!(dir.disconnect("alice").is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(dir.is_empty());
    }

    #[test]
    fn evict_idle_skips_fresh_and_connected_users() {
        let dir = LocalDirectory::new(Duration::from_secs(10));
        dir.connect("idle");
        let busy = dir.connect("busy");
        let (conn, _rx) = ChannelConnection::pair(1);
        busy.attach_connection(&RoomId::from("r"), conn);

        assert!(dir.evict_idle(Instant::now()).is_empty());

        let later = Instant::now() + Duration::from_secs(11);
        let evicted = dir.evict_idle(later);
        assert_eq!(evicted, vec![UserId::from("idle")]);
        assert!(dir.get("busy").is_some());
    }

    #[test]
    fn extend_idle_timer_pushes_deadline() {
        let dir = LocalDirectory::new(Duration::from_millis(50));
        dir.connect("alice");
        std::thread::sleep(Duration::from_millis(30));
        dir.extend_idle_timer(&UserId::from("alice"));

        // Original deadline has passed, the extended one has not.
        let probe = Instant::now() + Duration::from_millis(30);
        assert!(dir.evict_idle(probe).is_empty());
    }

    #[test]
    fn extend_unknown_user_is_noop() {
        let dir = LocalDirectory::default();
        dir.extend_idle_timer(&UserId::from("ghost"));
        assert!(dir.is_empty());
    }
}
