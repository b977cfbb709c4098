use std::time::Instant;

use gcast_group::{GroupRegistry, User};
use std::sync::Arc;

/// Seconds since `start`, for JSONL timestamps.
pub fn elapsed_s(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// Generate a JSON payload of approximately `size` bytes.
pub fn generate_payload(size: usize, seq: u32) -> serde_json::Value {
    // Overhead for {"seq":N,"data":"..."}
    let overhead = 30;
    let fill = if size > overhead {
        "X".repeat(size - overhead)
    } else {
        String::new()
    };
    serde_json::json!({
        "seq": seq,
        "data": fill,
    })
}

/// Count relation violations between registry, groups and user back-maps.
///
/// Only meaningful once all mutators have stopped.
pub fn audit(registry: &GroupRegistry, users: &[Arc<User>]) -> u32 {
    let mut violations = 0;

    for id in registry.group_ids() {
        let Some(group) = registry.get_group(id.as_ref()) else {
            continue;
        };
        if group.is_empty() {
            eprintln!("  ! registered group {id} is empty");
            violations += 1;
        }
        for member in group.members() {
            let linked = member
                .groups()
                .iter()
                .any(|g| Arc::ptr_eq(g, &group));
            if !linked {
                eprintln!("  ! {} in {id} without back-reference", member.id());
                violations += 1;
            }
        }
    }

    for user in users {
        for group in user.groups() {
            if !group.is_registered() || !group.contains(user.id()) {
                eprintln!("  ! {} points at stale group {}", user.id(), group.id());
                violations += 1;
            }
        }
    }

    violations
}
