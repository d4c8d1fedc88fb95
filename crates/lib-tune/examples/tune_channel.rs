//! Equalization tuning example.
//!
//! This example demonstrates:
//! 1. Loading a link configuration (or using the default twisted pair)
//! 2. Scoring the starting equalization
//! 3. Running Tx, Rx and joint searches one after another
//! 4. Saving the tuned settings
//!
//! Usage: `cargo run -p lib-tune --example tune_channel [link.toml]`

use anyhow::Context;
use lib_tune::{load_config, OptimizationCoordinator, StartOutcome, TaskKind, TuningSession};
use lib_types::{CtleMode, LinkConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_config(&path).with_context(|| format!("loading {}", path.display()))?,
        None => LinkConfig::default(),
    };
    if config.rx.ctle.mode == CtleMode::Off {
        config.rx.ctle.mode = CtleMode::Agc;
    }

    println!("=== Link Equalization Tuning Example ===\n");

    let session = Arc::new(TuningSession::open(config)?);
    let channel = session.channel();
    println!(
        "Channel: {} samples, delay {:.3} ns",
        channel.impulse.len(),
        channel.impulse.group_delay.as_ns()
    );
    println!("Starting cost: {:.4}\n", session.cost()?);

    let coordinator = OptimizationCoordinator::new(Arc::clone(&session));
    for kind in [TaskKind::TxTaps, TaskKind::RxCtle, TaskKind::CoOptimize] {
        match coordinator.start(kind) {
            StartOutcome::Started => {}
            other => {
                println!("{}: not started ({:?})", kind, other);
                continue;
            }
        }
        println!("{}", coordinator.status_message());

        let report = coordinator
            .wait(kind, Duration::from_secs(600))
            .context("optimization did not finish in time")?;
        println!("  {}", coordinator.status_message());
        println!(
            "  best cost {:?} after {} evaluations: {:?}",
            report.best_cost, report.evaluations, report.best_params
        );
    }

    session.save_eq();
    let tuned = session.committed();
    println!("\nTuned Tx taps:");
    for tap in tuned.tx_taps.iter().filter(|t| t.enabled) {
        println!("  {:<10} {:+.4}", tap.name, tap.value);
    }
    println!("CTLE peak: {:.2} dB", tuned.ctle.peak_mag_db);
    println!("Relative optimality: {:.4}", session.rel_opt()?);

    Ok(())
}
