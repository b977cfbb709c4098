//! Integration tests: registry invariants under thread churn.

use std::sync::Arc;
use std::thread;

use gcast_group::{
    ChannelConnection, Frame, GroupConfig, GroupRegistry, LocalDirectory, LocalRoom, User,
};
use rand::Rng;

const GROUP_IDS: [&str; 4] = ["g0", "g1", "g2", "g3"];

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
}

fn make_registry() -> (GroupRegistry, Arc<LocalDirectory>) {
    let dir = Arc::new(LocalDirectory::default());
    let registry = GroupRegistry::configure(dir.clone(), GroupConfig::new());
    (registry, dir)
}

/// At rest: every registered group is non-empty, and the user back-maps
/// and group memberships describe the same relation.
fn assert_consistent(registry: &GroupRegistry, users: &[Arc<User>]) {
    for id in registry.group_ids() {
        let group = registry.get_group(id.as_ref()).unwrap();
        assert!(!group.is_empty(), "registered group {id} is empty");
        assert!(group.is_registered());
        for member in group.members() {
            let back = member
                .groups()
                .into_iter()
                .find(|g| g.id() == group.id())
                .unwrap_or_else(|| panic!("{} lacks back-ref to {id}", member.id()));
            assert!(Arc::ptr_eq(&back, &group));
        }
    }

    for user in users {
        for group in user.groups() {
            assert!(
                group.is_registered(),
                "{} points at deregistered {}",
                user.id(),
                group.id()
            );
            assert!(group.contains(user.id()));
        }
    }
}

#[test]
fn join_leave_churn_keeps_invariants() {
    init_tracing();
    let (registry, dir) = make_registry();

    let users: Vec<Arc<User>> = (0..8).map(|i| dir.connect(format!("user-{i}"))).collect();

    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let registry = registry.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..2_000 {
                    let id = GROUP_IDS[rng.random_range(0..GROUP_IDS.len())];
                    if rng.random_bool(0.5) {
                        registry.create_group_batch([id], &user);
                    } else {
                        registry.leave(id, &user);
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_consistent(&registry, &users);
}

#[test]
fn remove_last_member_races_with_join() {
    init_tracing();
    let (registry, dir) = make_registry();

    for round in 0..500 {
        let alice = dir.connect(format!("alice-{round}"));
        let bob = dir.connect(format!("bob-{round}"));
        registry.create_group("race", &alice);

        let r1 = registry.clone();
        let a = alice.clone();
        let leaver = thread::spawn(move || r1.leave("race", &a));

        let r2 = registry.clone();
        let b = bob.clone();
        let joiner = thread::spawn(move || r2.create_group_batch(["race"], &b));

        assert!(leaver.join().unwrap());
        joiner.join().unwrap();

        // Bob's join must land in the registered group whatever the order.
        let group = registry.get_group("race").expect("bob's group vanished");
        assert!(group.contains(bob.id()));
        assert!(!group.contains(alice.id()));
        let back = bob.first_group(1).unwrap();
        assert!(Arc::ptr_eq(&back, &group));

        assert!(registry.leave("race", &bob));
        assert!(registry.get_group("race").is_none());
    }
}

#[test]
fn dissolve_races_with_join() {
    init_tracing();
    let (registry, dir) = make_registry();

    for round in 0..300 {
        let alice = dir.connect(format!("alice-{round}"));
        let bob = dir.connect(format!("bob-{round}"));
        registry.create_group("room", &alice);

        let r1 = registry.clone();
        let dissolver = thread::spawn(move || r1.dissolve("room"));

        let r2 = registry.clone();
        let b = bob.clone();
        let joiner = thread::spawn(move || r2.create_group_batch(["room"], &b));

        dissolver.join().unwrap();
        joiner.join().unwrap();

        assert!(!alice.is_in_group("room"));
        assert_consistent(&registry, &[alice, bob.clone()]);

        registry.leave("room", &bob);
        assert_eq!(registry.group_count(), 0);
    }
}

#[test]
fn fanout_during_churn_does_not_deadlock() {
    init_tracing();
    let (registry, dir) = make_registry();
    let room = Arc::new(LocalRoom::new("main"));

    let users: Vec<Arc<User>> = (0..6).map(|i| dir.connect(format!("user-{i}"))).collect();
    let mut receivers = Vec::new();
    for user in &users {
        let (conn, rx) = ChannelConnection::pair(4096);
        room.enter(conn, user);
        receivers.push(rx);
    }

    let churners: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let registry = registry.clone();
            let room = room.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..500 {
                    let id = GROUP_IDS[rng.random_range(0..GROUP_IDS.len())];
                    match rng.random_range(0..3) {
                        0 => registry.create_group_batch([id], &user),
                        1 => {
                            registry.leave(id, &user);
                        }
                        _ => {
                            if let Some(group) = registry.get_group(id) {
                                group.notify_all_except(&user, &*room, &Frame::text("hi"));
                            }
                        }
                    }
                }
            })
        })
        .collect();

    for h in churners {
        h.join().unwrap();
    }

    assert_consistent(&registry, &users);
    drop(receivers);
}
