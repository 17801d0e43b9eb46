//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::RaceBlueprint;
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

use super::load_blueprint;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config, args.event)?;

    info!(
        event_id = blueprint.event.event_id,
        lanes = blueprint.track.lanes,
        operational = ?blueprint.track.operational(),
        cars = blueprint.cars.len(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        max_races: (args.max_races > 0).then_some(args.max_races),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        replay_path: args.replay.clone(),
    });

    info!("Starting race day...");

    let stats = pipeline
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        races = stats.races_completed,
        stopped_by = %stats.stop_reason,
        duration_secs = stats.duration.as_secs_f64(),
        "Race day finished"
    );
    stats.print_summary();

    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RaceBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Event: {} ({})", blueprint.event.name, blueprint.event.event_id);
    println!("  Runs per car: {}", blueprint.event.multiplier);
    println!(
        "Track: {} lanes, operational {:?}",
        blueprint.track.lanes,
        blueprint.track.operational()
    );
    println!(
        "Timing: tick {} ms, DNF after {} ms, settle {} ms",
        blueprint.timing.tick_interval_ms,
        blueprint.timing.dnf_timeout_ms,
        blueprint.timing.settle_delay_ms
    );
    println!("Store: {:?}", blueprint.store.kind);
    println!("Sensor: {:?}", blueprint.sensor.source);

    println!("\nCars ({}):", blueprint.cars.len());
    for car in &blueprint.cars {
        println!("  - #{} {}", car.car_id, car.name);
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
