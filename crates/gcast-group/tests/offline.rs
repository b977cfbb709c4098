//! Integration tests: user lifespan and offline scrubbing via LocalDirectory.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use gcast_group::{
    ChannelConnection, GroupConfig, GroupRegistry, LocalDirectory, LocalRoom, UserId,
};

fn setup(lifespan: Duration) -> (GroupRegistry, Arc<LocalDirectory>) {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
    let dir = Arc::new(LocalDirectory::new(lifespan));
    let registry = GroupRegistry::configure(dir.clone(), GroupConfig::new());
    (registry, dir)
}

#[test]
fn disconnect_scrubs_every_membership() {
    let (registry, dir) = setup(Duration::from_secs(60));
    let alice = dir.connect("alice");
    let bob = dir.connect("bob");

    registry.create_group_batch(["solo", "pair"], &alice);
    registry.create_group_batch(["pair"], &bob);

    dir.disconnect("alice").unwrap();

    assert_eq!(alice.group_count(), 0);
    assert!(registry.get_group("solo").is_none());
    let pair = registry.get_group("pair").unwrap();
    assert_eq!(pair.len(), 1);
    assert!(pair.contains("bob"));
    assert_eq!(registry.stats().groups_deregistered, 1);
}

#[test]
fn idle_eviction_scrubs_users_without_connections() {
    let (registry, dir) = setup(Duration::from_secs(60));
    let room = LocalRoom::new("main");
    let alice = dir.connect("alice");
    let bob = dir.connect("bob");
    let (conn, _rx) = ChannelConnection::pair(8);
    room.enter(conn, &bob);

    registry.create_group_batch(["shared"], &alice);
    registry.create_group_batch(["shared"], &bob);

    let evicted = dir.evict_idle(Instant::now() + Duration::from_secs(120));

    assert_eq!(evicted, vec![UserId::from("alice")]);
    assert!(dir.get("alice").is_none());
    assert!(dir.get("bob").is_some());
    let shared = registry.get_group("shared").unwrap();
    assert!(!shared.contains("alice"));
    assert!(shared.contains("bob"));
}

#[test]
fn get_with_extend_postpones_eviction() {
    let (registry, dir) = setup(Duration::from_millis(200));
    let alice = dir.connect("alice");
    let bob = dir.connect("bob");
    let group = registry.create_group("lobby", &alice);
    registry.create_group_batch(["lobby"], &bob);

    thread::sleep(Duration::from_millis(120));
    assert!(group.get("alice", true).is_some());
    assert!(group.get("bob", false).is_some());

    let evicted = dir.evict_idle(Instant::now() + Duration::from_millis(100));

    assert_eq!(evicted, vec![UserId::from("bob")]);
    assert!(group.contains("alice"));
    assert!(!group.contains("bob"));
    assert_eq!(registry.stats().lifespan_extensions, 1);
}

#[test]
fn last_member_offline_deregisters_group() {
    let (registry, dir) = setup(Duration::from_secs(60));
    let alice = dir.connect("alice");
    let group = registry.create_group("lobby", &alice);

    dir.disconnect("alice");

    assert!(!group.is_registered());
    assert!(registry.get_group("lobby").is_none());
    assert_eq!(registry.group_count(), 0);
}

#[test]
fn reconnect_after_offline_starts_clean() {
    let (registry, dir) = setup(Duration::from_secs(60));
    let alice = dir.connect("alice");
    registry.create_group("lobby", &alice);
    dir.disconnect("alice");

    let alice = dir.connect("alice");
    assert_eq!(alice.group_count(), 0);
    let fresh = registry.create_group("lobby", &alice);
    assert_eq!(fresh.len(), 1);
    assert_eq!(registry.stats().groups_replaced, 0);
}
