use std::io::Write;

use gcast_group::StatsSnapshot;
use serde::Serialize;

use crate::output;

/// Emit a JSONL event to stdout (flushed immediately for piped output),
/// and to the output file if one is open.
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();

        output::write_line(&json);
    }
}

/// RFC 3339 (ISO-8601) UTC timestamp for JSONL events.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ── Session events ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStarted {
    pub event: &'static str,
    pub name: String,
    pub mode: String,
    pub timestamp: String,
}

impl EventStarted {
    pub fn new(name: &str, mode: &str) -> Self {
        Self {
            event: "started",
            name: name.to_string(),
            mode: mode.to_string(),
            timestamp: now_iso(),
        }
    }
}

// ── Churn result ────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventChurnResult {
    pub event: &'static str,
    pub users: usize,
    pub group_ids: usize,
    pub workers: usize,
    pub total_ops: u64,
    pub joins: u64,
    pub leaves: u64,
    pub dissolves: u64,
    pub offlines: u64,
    pub ops_per_sec: f64,
    pub groups_alive: usize,
    pub violations: u32,
    pub elapsed_ms: f64,
    pub elapsed_s: f64,
}

// ── Fanout result ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventFanoutResult {
    pub event: &'static str,
    pub members: usize,
    pub connections: usize,
    pub messages: u32,
    pub payload_size: usize,
    pub delivered: u64,
    pub failed: u64,
    pub received: u64,
    pub frames_per_sec: f64,
    pub send_ms: f64,
    pub elapsed_ms: f64,
    pub elapsed_s: f64,
}

// ── Registry counters ───────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStats {
    pub event: &'static str,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub elapsed_s: f64,
}
