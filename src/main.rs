use clap::Parser;
use quorumkv::{KvNode, ProtocolConfig};
use std::net::SocketAddr;
use std::time::Duration;

/// A node of the gossip-membership, quorum-replicated key-value store.
#[derive(Debug, Parser)]
#[command(name = "quorumkv", version, about)]
struct Args {
    /// Address to bind the node socket to.
    #[arg(long)]
    bind: SocketAddr,

    /// Seed node(s) to join through. Omit to start as the bootstrap node.
    #[arg(long = "seed")]
    seeds: Vec<SocketAddr>,

    /// Gossip period in milliseconds.
    #[arg(long, default_value_t = 500)]
    gossip_period_ms: u64,

    /// Client transaction timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    transaction_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = ProtocolConfig {
        gossip_period: Duration::from_millis(args.gossip_period_ms),
        transaction_timeout: Duration::from_millis(args.transaction_timeout_ms),
        ..ProtocolConfig::default()
    };

    tracing::info!("starting node on {}", args.bind);
    if args.seeds.is_empty() {
        tracing::info!("no seeds given, bootstrapping a new cluster");
    } else {
        tracing::info!("seed nodes: {:?}", args.seeds);
    }

    let (node, mut outcomes) = KvNode::new(args.bind, args.seeds, config).await?;
    node.clone().start().await?;

    // Outcome side-channel: one line per completed or timed-out transaction.
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            if outcome.success {
                tracing::info!(
                    "transaction {} {:?} '{}' ok{}",
                    outcome.transaction_id,
                    outcome.op,
                    outcome.key,
                    outcome
                        .value
                        .map(|v| format!(" -> {}", v))
                        .unwrap_or_default()
                );
            } else {
                tracing::warn!(
                    "transaction {} {:?} '{}' failed",
                    outcome.transaction_id,
                    outcome.op,
                    outcome.key
                );
            }
        }
    });

    // Periodic cluster stats.
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let members = stats_node.membership.snapshot();
            tracing::info!(
                "cluster stats: {} members, {} local keys",
                members.len(),
                stats_node.engine.len()
            );
            for member in members {
                tracing::info!("  - {} (heartbeat={})", member.id, member.heartbeat);
            }
        }
    });

    tracing::info!("node {} running, press Ctrl+C to shut down", node.local_addr());
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
