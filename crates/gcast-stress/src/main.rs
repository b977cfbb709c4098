mod churn;
mod common;
mod events;
mod fanout;
mod output;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use gcast_group::{GroupConfig, PayloadCodec};

#[derive(Parser)]
#[command(name = "gcast-stress", about = "Stress test for the gcast group layer")]
struct Cli {
    /// Display name for this run.
    #[arg(short, long, default_value = "run")]
    name: String,

    /// Payload codec: json or msgpack (overrides GCAST_CODEC).
    #[arg(long)]
    codec: Option<PayloadCodec>,

    /// Also append JSONL events to a timestamped file in this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Concurrent join/leave/dissolve/offline churn, then a consistency audit.
    Churn {
        /// Number of simulated users.
        #[arg(long, default_value = "64")]
        users: usize,
        /// Number of distinct group ids to contend on.
        #[arg(long, default_value = "16")]
        groups: usize,
        /// Operations per worker.
        #[arg(long, default_value = "10000")]
        ops: u32,
        /// Worker threads.
        #[arg(long, default_value = "8")]
        workers: usize,
    },

    /// One group, many members: measure broadcast throughput.
    Fanout {
        /// Number of members.
        #[arg(long, default_value = "256")]
        users: usize,
        /// Connections per member.
        #[arg(long, default_value = "2")]
        conns: usize,
        /// Messages to broadcast.
        #[arg(long, default_value = "1000")]
        count: u32,
        /// Payload size in bytes.
        #[arg(long, default_value = "256")]
        payload_size: usize,
        /// Per-connection channel capacity.
        #[arg(long, default_value = "1024")]
        capacity: usize,
    },
}

impl Command {
    fn mode(&self) -> &'static str {
        match self {
            Command::Churn { .. } => "churn",
            Command::Fanout { .. } => "fanout",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = Instant::now();

    if let Some(dir) = &cli.output_dir {
        let path = output::open_jsonl(dir, &cli.name, cli.command.mode())?;
        eprintln!("JSONL → {}", path.display());
    }

    let mut config = GroupConfig::new();
    if let Some(codec) = cli.codec {
        config = config.codec(codec);
    }

    eprintln!("gcast-stress v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("codec: {:?}", config.payload_codec());
    eprintln!();

    match cli.command {
        Command::Churn {
            users,
            groups,
            ops,
            workers,
        } => {
            churn::run(
                config,
                churn::ChurnConfig {
                    users,
                    groups,
                    ops,
                    workers,
                    name: cli.name,
                },
                start,
            )
            .await?;
        }

        Command::Fanout {
            users,
            conns,
            count,
            payload_size,
            capacity,
        } => {
            fanout::run(
                config,
                fanout::FanoutConfig {
                    users,
                    conns,
                    count,
                    payload_size,
                    capacity,
                    name: cli.name,
                },
                start,
            )
            .await?;
        }
    }

    Ok(())
}
