use std::sync::Arc;
use std::time::Instant;

use gcast_group::{GroupConfig, GroupRegistry, LocalDirectory, User};
use rand::Rng;

use crate::common::{audit, elapsed_s};
use crate::events::*;

pub struct ChurnConfig {
    pub users: usize,
    pub groups: usize,
    pub ops: u32,
    pub workers: usize,
    pub name: String,
}

#[derive(Default)]
struct Tally {
    joins: u64,
    leaves: u64,
    dissolves: u64,
    offlines: u64,
}

pub async fn run(
    group_config: GroupConfig,
    config: ChurnConfig,
    start: Instant,
) -> anyhow::Result<()> {
    anyhow::ensure!(config.workers > 0, "--workers must be at least 1");
    anyhow::ensure!(config.groups > 0, "--groups must be at least 1");
    anyhow::ensure!(config.users >= config.workers, "--users must be at least --workers");

    emit(&EventStarted::new(&config.name, "churn"));
    eprintln!(
        "Churn mode → {} users over {} group ids, {} workers × {} ops",
        config.users, config.groups, config.workers, config.ops
    );

    let dir = Arc::new(LocalDirectory::default());
    let registry = GroupRegistry::configure(dir.clone(), group_config);
    let group_ids: Arc<Vec<String>> =
        Arc::new((0..config.groups).map(|i| format!("g{i}")).collect());

    // Each worker owns a disjoint slice of users so it can reconnect them.
    let mut handles = Vec::with_capacity(config.workers);
    let churn_start = Instant::now();
    for w in 0..config.workers {
        let users: Vec<Arc<User>> = (w..config.users)
            .step_by(config.workers)
            .map(|i| dir.connect(format!("user-{i}")))
            .collect();
        let registry = registry.clone();
        let dir = dir.clone();
        let group_ids = group_ids.clone();
        let ops = config.ops;

        handles.push(tokio::task::spawn_blocking(move || {
            worker(&registry, &dir, &group_ids, users, ops)
        }));
    }

    let mut tally = Tally::default();
    let mut all_users = Vec::with_capacity(config.users);
    for handle in handles {
        let (t, users) = handle.await?;
        tally.joins += t.joins;
        tally.leaves += t.leaves;
        tally.dissolves += t.dissolves;
        tally.offlines += t.offlines;
        all_users.extend(users);
    }
    let churn_elapsed = churn_start.elapsed();

    let violations = audit(&registry, &all_users);
    let total_ops = config.ops as u64 * config.workers as u64;

    emit(&EventChurnResult {
        event: "churn_result",
        users: config.users,
        group_ids: config.groups,
        workers: config.workers,
        total_ops,
        joins: tally.joins,
        leaves: tally.leaves,
        dissolves: tally.dissolves,
        offlines: tally.offlines,
        ops_per_sec: total_ops as f64 / churn_elapsed.as_secs_f64().max(f64::EPSILON),
        groups_alive: registry.group_count(),
        violations,
        elapsed_ms: churn_elapsed.as_secs_f64() * 1000.0,
        elapsed_s: elapsed_s(start),
    });
    emit(&EventStats {
        event: "stats",
        stats: registry.stats(),
        elapsed_s: elapsed_s(start),
    });

    eprintln!(
        "\n  churn: {total_ops} ops in {:.1}ms, {} groups alive, {violations} violations",
        churn_elapsed.as_secs_f64() * 1000.0,
        registry.group_count()
    );

    anyhow::ensure!(violations == 0, "{violations} consistency violations");
    Ok(())
}

fn worker(
    registry: &GroupRegistry,
    dir: &LocalDirectory,
    group_ids: &[String],
    mut users: Vec<Arc<User>>,
    ops: u32,
) -> (Tally, Vec<Arc<User>>) {
    let mut rng = rand::rng();
    let mut tally = Tally::default();

    for _ in 0..ops {
        let slot = rng.random_range(0..users.len());
        let id = &group_ids[rng.random_range(0..group_ids.len())];

        match rng.random_range(0..100) {
            0..45 => {
                let extra = &group_ids[rng.random_range(0..group_ids.len())];
                registry.create_group_batch([id.as_str(), extra.as_str()], &users[slot]);
                tally.joins += 1;
            }
            45..85 => {
                registry.leave(id, &users[slot]);
                tally.leaves += 1;
            }
            85..95 => {
                registry.dissolve(id);
                tally.dissolves += 1;
            }
            _ => {
                let user_id = users[slot].id().clone();
                dir.disconnect(user_id.as_ref());
                users[slot] = dir.connect(user_id);
                tally.offlines += 1;
            }
        }
    }

    (tally, users)
}
