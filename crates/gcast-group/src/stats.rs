/// Registry-wide counters.
///
/// Relaxed atomics: these are statistics, not synchronization.
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct RegistryStats {
    groups_created: AtomicU64,
    groups_joined: AtomicU64,
    groups_replaced: AtomicU64,
    groups_deregistered: AtomicU64,
    frames_delivered: AtomicU64,
    frames_failed: AtomicU64,
    lifespan_extensions: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub groups_created: u64,
    pub groups_joined: u64,
    pub groups_replaced: u64,
    pub groups_deregistered: u64,
    pub frames_delivered: u64,
    pub frames_failed: u64,
    pub lifespan_extensions: u64,
}

impl RegistryStats {
    pub(crate) fn group_created(&self) {
        self.groups_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_joined(&self) {
        self.groups_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_replaced(&self) {
        self.groups_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn group_deregistered(&self) {
        self.groups_deregistered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frames(&self, delivered: usize, failed: usize) {
        self.frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.frames_failed.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn lifespan_extended(&self) {
        self.lifespan_extensions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            groups_created: self.groups_created.load(Ordering::Relaxed),
            groups_joined: self.groups_joined.load(Ordering::Relaxed),
            groups_replaced: self.groups_replaced.load(Ordering::Relaxed),
            groups_deregistered: self.groups_deregistered.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            lifespan_extensions: self.lifespan_extensions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let stats = RegistryStats::default();
        stats.group_created();
        stats.group_created();
        stats.group_deregistered();
        stats.frames(5, 1);

        let snap = stats.snapshot();
        assert_eq!(snap.groups_created, 2);
        assert_eq!(snap.groups_deregistered, 1);
        assert_eq!(snap.frames_delivered, 5);
        assert_eq!(snap.frames_failed, 1);
        assert_eq!(snap.groups_joined, 0);
    }

    #[test]
    fn snapshot_serializes_as_flat_json() {
        let stats = RegistryStats::default();
        stats.lifespan_extended();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["lifespan_extensions"], 1);
        assert_eq!(json["groups_created"], 0);
    }
}
