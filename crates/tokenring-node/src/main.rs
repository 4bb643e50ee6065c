use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use tokenring_network::TokenListener;
use tokenring_node::config::CorruptTokenPolicy;
use tokenring_node::{
    DriverSettings, NodeConfig, RoundDriver, RunContext, SimulatedSensors, SnapshotRenderer,
};
use tokenring_protocol::{RingConfig, MIN_RING_SIZE};

/// Sensor token ring node.
///
/// Each node listens on its own address, appends a local reading to every
/// token it receives and forwards it to the next reachable ring member.
#[derive(Parser, Debug)]
#[command(name = "token-ring", version, about, long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a ring node
    Run {
        #[command(flatten)]
        node: NodeArgs,

        /// Optional TOML file with timing, metric and render settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Inbound wait budget before the token is declared missing
        #[arg(long)]
        receive_timeout_ms: Option<u64>,

        /// Connect + write budget per forwarding attempt
        #[arg(long)]
        hop_timeout_ms: Option<u64>,

        /// Pause between augmenting a token and forwarding it
        #[arg(long)]
        round_pause_ms: Option<u64>,

        /// Pause after regenerating a token
        #[arg(long)]
        retry_pause_ms: Option<u64>,

        /// What to do with a payload that fails to decode
        #[arg(long, value_enum)]
        corrupt_policy: Option<CorruptTokenPolicy>,

        /// Directory for observer snapshots
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Stop after this many completed rounds
        #[arg(long)]
        rounds: Option<u64>,
    },
    /// Resolve the ring position without starting the node
    Check {
        #[command(flatten)]
        node: NodeArgs,
    },
}

#[derive(Args, Debug)]
struct NodeArgs {
    /// initiator | relay | observer (or start | mid | plot)
    role: String,

    /// This node's host:port, exactly as listed in the ring
    self_addr: String,

    /// Every ring member's host:port, in forwarding order
    #[arg(required = true, num_args = 1..)]
    ring: Vec<String>,
}

impl NodeArgs {
    fn resolve(&self) -> anyhow::Result<RingConfig> {
        RingConfig::parse(&self.role, &self.self_addr, &self.ring)
            .context("invalid ring configuration")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check { node } => check(&node),
        Commands::Run {
            node,
            config,
            receive_timeout_ms,
            hop_timeout_ms,
            round_pause_ms,
            retry_pause_ms,
            corrupt_policy,
            output_dir,
            rounds,
        } => {
            let ring = node.resolve()?;

            let mut config = match config {
                Some(path) => NodeConfig::load(&path)
                    .with_context(|| format!("failed to load config '{}'", path.display()))?,
                None => NodeConfig::default(),
            };
            if let Some(ms) = receive_timeout_ms {
                config.timing.receive_timeout_ms = ms;
            }
            if let Some(ms) = hop_timeout_ms {
                config.timing.hop_timeout_ms = ms;
            }
            if let Some(ms) = round_pause_ms {
                config.timing.round_pause_ms = ms;
            }
            if let Some(ms) = retry_pause_ms {
                config.timing.retry_pause_ms = ms;
            }
            if let Some(policy) = corrupt_policy {
                config.corrupt_token_policy = policy;
            }
            if let Some(dir) = output_dir {
                config.render.output_dir = dir;
            }
            config.validate()?;

            run_node(ring, config, rounds).await
        }
    }
}

fn check(node: &NodeArgs) -> anyhow::Result<()> {
    let ring = node.resolve()?;
    let topology = &ring.topology;
    println!("role:        {}", ring.role);
    println!("address:     {}", topology.self_address());
    println!("index:       {} of {}", topology.self_index(), topology.len());
    println!("predecessor: {}", topology.predecessor());
    for (offset, addr) in topology.successors() {
        println!("successor+{offset}: {addr}");
    }
    if topology.len() < MIN_RING_SIZE {
        println!("warning: rings smaller than {MIN_RING_SIZE} cannot route around a failed successor");
    }
    Ok(())
}

async fn run_node(ring: RingConfig, config: NodeConfig, rounds: Option<u64>) -> anyhow::Result<()> {
    if ring.topology.len() < MIN_RING_SIZE {
        tracing::warn!(
            ring_size = ring.topology.len(),
            "Ring smaller than {MIN_RING_SIZE}: skip-ahead has no alternates"
        );
    }

    let listener = TokenListener::bind(ring.topology.self_address()).await?;
    let source = Arc::new(SimulatedSensors::new(config.metrics.clone()));
    let renders = ring.role.renders();

    let mut driver = RoundDriver::new(ring, listener, source, DriverSettings::from(&config));
    if renders {
        driver = driver.with_renderer(Arc::new(SnapshotRenderer::new(
            config.render.clone(),
            config.metrics.clone(),
        )));
    }

    let ctx = RunContext::new();
    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            on_interrupt.shutdown();
        }
    });

    let stats = driver.run_rounds(ctx, rounds).await;
    tracing::info!(
        rounds = stats.rounds_completed,
        regenerations = stats.regenerations,
        ring_unreachable = stats.ring_unreachable,
        "Node stopped"
    );
    Ok(())
}
