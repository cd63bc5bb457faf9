//! walkers — random walkers on a torus, run twice:
//!
//! 1. a single-process session driven through its command handle, writing
//!    CSV output and streaming a filtered console view;
//! 2. the same model split over a 3-node in-process cluster.
//!
//! Pass a TOML run config as the first argument to override the defaults.
//! Logging honours `RUST_LOG`.

mod model;

use std::path::Path;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use abm_cluster::{LocalTransport, Transport};
use abm_core::{Rank, RunConfig};
use abm_data::{
    BackgroundProcessor, ChannelProcessor, CollectorKind, DataCollectorDescriptor, DataFilter,
    DataKey, IntervalMode, StateFlags,
};
use abm_output::{OutputConfig, OutputProcessor};
use abm_sim::{EngineBuilder, RunReport, SimulationSession, StartOptions};

use model::{Census, Walkers};

// ── Constants ─────────────────────────────────────────────────────────────────

const AGENT_COUNT:   usize = 300;
const SEED:          u64   = 42;
const LENGTH:        u64   = 200;
const PRINT_EVERY:   u64   = 20;
const CLUSTER_RANKS: usize = 3;
const OUTPUT_DIR:    &str  = "output/walkers";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::from_path(Path::new(&path))
            .with_context(|| format!("failed to load run config {path}"))?,
        None => RunConfig { length: Some(LENGTH), seed: SEED, ..RunConfig::default() },
    };

    println!("=== walkers ===");
    println!("Agents: {AGENT_COUNT}  |  Ticks: {:?}  |  Seed: {}", config.length, config.seed);
    println!();

    single_process(&config)?;
    println!();
    cluster(&config)?;
    Ok(())
}

// ── Single process ────────────────────────────────────────────────────────────

fn single_process(config: &RunConfig) -> Result<()> {
    let csv = OutputProcessor::csv(&OutputConfig::new(OUTPUT_DIR))?;
    let (console, rows) = ChannelProcessor::bounded("console", 64);
    let console = DataFilter::new(console)
        .require(DataKey::variable("count"))
        .interval(PRINT_EVERY, IntervalMode::Strict);

    let engine = EngineBuilder::new(Walkers::new(AGENT_COUNT), config.clone())
        .collector(DataCollectorDescriptor::variable("count", 1))
        .collector(DataCollectorDescriptor::variable("mean_energy", 1))
        .collector(DataCollectorDescriptor::new(CollectorKind::DataLayer, "density", 10))
        .collector(DataCollectorDescriptor::new(CollectorKind::AgentPositions, "walkers", 50))
        .processor(BackgroundProcessor::spawn(csv)?)
        .processor(console)
        .build()?;

    // The channel outlives the run; its last row carries FINAL_STATE.
    let printer = thread::spawn(move || {
        println!("{:<8} {:<28} {:<8} {:<8}", "Tick", "Flags", "Count", "Energy");
        println!("{}", "-".repeat(54));
        for row in rows {
            println!(
                "{:<8} {:<28} {:<8} {:<8.2}",
                row.tick().0,
                row.flags().to_string(),
                row.variable_i64("count").unwrap_or_default(),
                row.variable_f64("mean_energy").unwrap_or_default(),
            );
            if row.flags().contains(StateFlags::FINAL_STATE) {
                break;
            }
        }
    });

    let t0 = Instant::now();
    let (handle, session) = SimulationSession::new(engine).spawn()?;
    handle.set_variable("step", 2.0.into())?;
    handle.start(StartOptions {
        length:   config.length,
        observer: Some("console".into()),
        ..StartOptions::default()
    })?;
    printer.join().map_err(|_| anyhow!("printer thread panicked"))?;
    handle.exit()?;

    let outcome = session.join().map_err(|_| anyhow!("engine thread panicked"))??;
    println!();
    println!("Session ended ({:?}) in {:.3} s", outcome.end, t0.elapsed().as_secs_f64());
    for report in &outcome.reports {
        print_report("local", report);
    }
    println!("CSV output in {OUTPUT_DIR}/");
    Ok(())
}

// ── Cluster ───────────────────────────────────────────────────────────────────

fn cluster(config: &RunConfig) -> Result<()> {
    println!("Cluster: {CLUSTER_RANKS} ranks × {} walkers", AGENT_COUNT / CLUSTER_RANKS);

    let nodes: Vec<_> = LocalTransport::cluster(CLUSTER_RANKS)
        .into_iter()
        .map(|transport| {
            let rank = transport.rank();
            let config = RunConfig { seed: config.seed + u64::from(rank.0), ..config.clone() };
            thread::Builder::new()
                .name(format!("rank-{}", rank.0))
                .spawn(move || run_node(rank, transport, config))
                .context("failed to spawn rank thread")
        })
        .collect::<Result<_>>()?;

    for node in nodes {
        let (rank, report, remote) = node.join().map_err(|_| anyhow!("rank thread panicked"))??;
        print_report(&format!("rank {}", rank.0), &report);
        for (peer, count) in remote {
            println!("    census: rank {} had {count} walkers", peer.0);
        }
    }
    Ok(())
}

fn run_node(
    rank:      Rank,
    transport: LocalTransport,
    config:    RunConfig,
) -> Result<(Rank, RunReport, Vec<(Rank, usize)>)> {
    let mut engine = EngineBuilder::new(Walkers::new(AGENT_COUNT / CLUSTER_RANKS), config)
        .collector(DataCollectorDescriptor::variable("count", 1))
        .cluster(transport)
        .build()?;
    if rank.is_coordinator() {
        engine.handle().submit(Census)?;
    }
    let report = engine.run()?;
    info!(rank = rank.0, exit = ?report.exit, "node finished");
    let remote = std::mem::take(&mut engine.model_mut().remote);
    Ok((rank, report, remote))
}

fn print_report(who: &str, report: &RunReport) {
    println!(
        "  {who:<8} exit={:?} ticks={} rows={}",
        report.exit, report.ticks_completed, report.rows
    );
}
