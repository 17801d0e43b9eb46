//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{RaceBlueprint, SensorSourceKind};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

use super::load_blueprint;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    track: TrackInfo,
    timing: TimingInfo,
    event: EventInfo,
    store: String,
    sensor: SensorInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cars: Vec<CarInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct TrackInfo {
    lanes: usize,
    operational_lanes: Vec<usize>,
}

#[derive(Serialize)]
struct TimingInfo {
    tick_interval_ms: u64,
    dnf_timeout_ms: u64,
    settle_delay_ms: u64,
}

#[derive(Serialize)]
struct EventInfo {
    event_id: u64,
    name: String,
    multiplier: u32,
    car_count: usize,
}

#[derive(Serialize)]
struct SensorInfo {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_bind: Option<String>,
}

#[derive(Serialize)]
struct CarInfo {
    car_id: u64,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config, None)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &RaceBlueprint, args: &InfoArgs) -> ConfigInfo {
    let cars = if args.cars {
        blueprint
            .cars
            .iter()
            .map(|c| CarInfo {
                car_id: c.car_id,
                name: c.name.clone(),
                nickname: c.nickname.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    let replay_path = match blueprint.sensor.source {
        SensorSourceKind::Replay => blueprint
            .sensor
            .replay_path
            .as_ref()
            .map(|p| p.display().to_string()),
        SensorSourceKind::Mock | SensorSourceKind::Raw => None,
    };
    let raw_bind = match blueprint.sensor.source {
        SensorSourceKind::Raw => blueprint.sensor.raw_bind.map(|addr| addr.to_string()),
        SensorSourceKind::Mock | SensorSourceKind::Replay => None,
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        track: TrackInfo {
            lanes: blueprint.track.lanes,
            operational_lanes: blueprint.track.operational(),
        },
        timing: TimingInfo {
            tick_interval_ms: blueprint.timing.tick_interval_ms,
            dnf_timeout_ms: blueprint.timing.dnf_timeout_ms,
            settle_delay_ms: blueprint.timing.settle_delay_ms,
        },
        event: EventInfo {
            event_id: blueprint.event.event_id,
            name: blueprint.event.name.clone(),
            multiplier: blueprint.event.multiplier,
            car_count: blueprint.cars.len(),
        },
        store: format!("{:?}", blueprint.store.kind),
        sensor: SensorInfo {
            source: format!("{:?}", blueprint.sensor.source),
            replay_path,
            raw_bind,
        },
        cars,
        sinks,
    }
}

fn print_config_info(blueprint: &RaceBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Race Timer Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📋 General");
    println!("   └─ Version: {:?}", blueprint.version);

    println!("\n🏁 Track");
    println!("   ├─ Lanes: {}", blueprint.track.lanes);
    println!("   └─ Operational: {:?}", blueprint.track.operational());

    println!("\n⏱  Timing");
    println!("   ├─ Tick interval: {} ms", blueprint.timing.tick_interval_ms);
    println!("   ├─ DNF timeout: {} ms", blueprint.timing.dnf_timeout_ms);
    println!("   └─ Settle delay: {} ms", blueprint.timing.settle_delay_ms);

    println!("\n🏆 Event");
    println!(
        "   ├─ {} (id {})",
        blueprint.event.name, blueprint.event.event_id
    );
    println!("   ├─ Runs per car: {}", blueprint.event.multiplier);
    println!("   └─ Cars: {}", blueprint.cars.len());

    println!("\n💾 Store: {:?}", blueprint.store.kind);
    if let Some(ref path) = blueprint.store.path {
        println!("   └─ Path: {}", path.display());
    }

    println!("\n📡 Sensor: {:?}", blueprint.sensor.source);
    if blueprint.sensor.source == SensorSourceKind::Replay {
        if let Some(ref path) = blueprint.sensor.replay_path {
            println!("   ├─ Recording: {}", path.display());
        }
        println!(
            "   └─ Speed: {}x{}",
            blueprint.sensor.replay_speed,
            if blueprint.sensor.replay_loop { ", looping" } else { "" }
        );
    }
    if blueprint.sensor.source == SensorSourceKind::Raw {
        if let Some(addr) = blueprint.sensor.raw_bind {
            println!("   └─ Listening on: udp://{addr}");
        }
    }

    if args.cars && !blueprint.cars.is_empty() {
        println!("\n🚗 Roster");
        for (i, car) in blueprint.cars.iter().enumerate() {
            let prefix = if i == blueprint.cars.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            match car.nickname {
                Some(ref nick) => println!("   {} #{} {} \"{}\"", prefix, car.car_id, car.name, nick),
                None => println!("   {} #{} {}", prefix, car.car_id, car.name),
            }
        }
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks");
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            for (k, v) in &sink.params {
                println!("   │     {}: {}", k, v);
            }
        }
    }

    println!();
}
