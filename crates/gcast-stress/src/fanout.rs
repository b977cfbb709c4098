use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcast_group::{
    ChannelConnection, Connection, FanoutReport, GroupConfig, GroupRegistry, LocalDirectory,
    LocalRoom, MessageType,
};

use crate::common::{elapsed_s, generate_payload};
use crate::events::*;

pub struct FanoutConfig {
    pub users: usize,
    pub conns: usize,
    pub count: u32,
    pub payload_size: usize,
    pub capacity: usize,
    pub name: String,
}

pub async fn run(
    group_config: GroupConfig,
    config: FanoutConfig,
    start: Instant,
) -> anyhow::Result<()> {
    anyhow::ensure!(config.users > 0, "--users must be at least 1");
    anyhow::ensure!(config.conns > 0, "--conns must be at least 1");
    anyhow::ensure!(config.capacity > 0, "--capacity must be at least 1");

    emit(&EventStarted::new(&config.name, "fanout"));
    eprintln!(
        "Fanout mode → {} members × {} conns, {} msgs, {} byte payload",
        config.users, config.conns, config.count, config.payload_size
    );

    let dir = Arc::new(LocalDirectory::default());
    let registry = GroupRegistry::configure(dir.clone(), group_config);
    let room = LocalRoom::new("stress");
    let received = Arc::new(AtomicU64::new(0));

    // One drain task per connection, standing in for a socket writer.
    let mut drains = Vec::with_capacity(config.users * config.conns);
    let mut origin = None;
    let mut group = None;
    for i in 0..config.users {
        let user = dir.connect(format!("member-{i}"));
        for _ in 0..config.conns {
            let (conn, mut rx) = ChannelConnection::pair(config.capacity);
            origin.get_or_insert_with(|| conn.id().clone());
            room.enter(conn, &user);

            let received = received.clone();
            drains.push(tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    received.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        if group.is_none() {
            group = Some(registry.create_group("stress", &user));
        } else {
            registry.create_group_batch(["stress"], &user);
        }
    }
    let (Some(group), Some(origin)) = (group, origin) else {
        anyhow::bail!("no members were created");
    };

    // The first connection plays the sender: everyone but it gets each frame.
    let mut total = FanoutReport::default();
    let send_start = Instant::now();
    for seq in 1..=config.count {
        let payload = generate_payload(config.payload_size, seq);
        total += group.notify_all_except_connection_encoded(
            &origin,
            &room,
            &payload,
            MessageType::Text,
        )?;
        if seq % 64 == 0 {
            tokio::task::yield_now().await;
        }
    }
    let send_elapsed = send_start.elapsed();
    eprintln!(
        "  sent {} frames in {:.1}ms",
        total.delivered,
        send_elapsed.as_secs_f64() * 1000.0
    );

    // Let writers drain (5s cap), then tear down.
    let expected = total.delivered as u64;
    let deadline = Instant::now() + Duration::from_secs(5);
    while received.load(Ordering::Relaxed) < expected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let evicted = registry.dissolve("stress");
    tracing::debug!(evicted, "fanout group dissolved");
    for drain in drains {
        drain.abort();
    }

    let total_elapsed = send_start.elapsed();
    let received = received.load(Ordering::Relaxed);

    emit(&EventFanoutResult {
        event: "fanout_result",
        members: config.users,
        connections: config.users * config.conns,
        messages: config.count,
        payload_size: config.payload_size,
        delivered: total.delivered as u64,
        failed: total.failed as u64,
        received,
        frames_per_sec: total.delivered as f64 / send_elapsed.as_secs_f64().max(f64::EPSILON),
        send_ms: send_elapsed.as_secs_f64() * 1000.0,
        elapsed_ms: total_elapsed.as_secs_f64() * 1000.0,
        elapsed_s: elapsed_s(start),
    });
    emit(&EventStats {
        event: "stats",
        stats: registry.stats(),
        elapsed_s: elapsed_s(start),
    });

    eprintln!(
        "\n  fanout: {}/{} frames received, {} dropped on backpressure",
        received, total.delivered, total.failed
    );

    Ok(())
}
