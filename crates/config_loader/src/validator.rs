//! Configuration validation
//!
//! Field ranges come from the `validator` derives on the blueprint types.
//! Cross-field rules:
//! - operational lanes non-empty, unique and inside the track
//! - car ids unique
//! - DNF timeout longer than one clock tick
//! - mock finish range ordered
//! - json store has a path, replay source has a recording
//! - sink names present and unique

use std::collections::HashSet;

use contracts::{
    ContractError, RaceBlueprint, SensorSourceKind, StoreKind,
};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a blueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_track(blueprint)?;
    validate_car_ids(blueprint)?;
    validate_timing(blueprint)?;
    validate_store(blueprint)?;
    validate_sensor(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// Non-fatal findings worth showing the operator
pub fn warnings(blueprint: &RaceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for name in blueprint.duplicate_car_names() {
        warnings.push(format!("duplicate car name '{name}'"));
    }

    let lanes = blueprint.track.operational().len();
    if blueprint.cars.is_empty() {
        warnings.push("roster is empty, no races can be scheduled".to_string());
    } else if blueprint.cars.len() < lanes {
        warnings.push(format!(
            "{} cars for {} operational lanes, some lanes will stay empty",
            blueprint.cars.len(),
            lanes
        ));
    }

    warnings
}

fn validate_fields(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let mut flat = Vec::new();
        flatten_errors(&errors, "", &mut flat);
        flat.sort();
        match flat.into_iter().next() {
            Some((field, message)) => ContractError::config_validation(field, message),
            None => ContractError::config_validation("<root>", "invalid configuration"),
        }
    })
}

fn flatten_errors(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let mut params: Vec<String> = error
                        .params
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    params.sort();
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => format!("failed '{}' check ({})", error.code, params.join(", ")),
                    };
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten_errors(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

fn validate_track(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    let track = &blueprint.track;
    let mut seen = HashSet::new();

    for &lane in &track.operational_lanes {
        if lane >= track.lanes {
            return Err(ContractError::config_validation(
                "track.operational_lanes",
                format!("lane {lane} outside a {}-lane track", track.lanes),
            ));
        }
        if !seen.insert(lane) {
            return Err(ContractError::config_validation(
                "track.operational_lanes",
                format!("duplicate lane {lane}"),
            ));
        }
    }

    if track.operational().is_empty() {
        return Err(ContractError::config_validation(
            "track.operational_lanes",
            "at least one lane must be operational",
        ));
    }
    Ok(())
}

fn validate_car_ids(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for car in &blueprint.cars {
        if !seen.insert(car.car_id) {
            return Err(ContractError::config_validation(
                format!("cars[car_id={}]", car.car_id),
                "duplicate car_id",
            ));
        }
    }
    Ok(())
}

fn validate_timing(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    let timing = &blueprint.timing;
    if timing.dnf_timeout_ms <= timing.tick_interval_ms {
        return Err(ContractError::config_validation(
            "timing.dnf_timeout_ms",
            format!(
                "dnf_timeout_ms ({}) must be greater than tick_interval_ms ({})",
                timing.dnf_timeout_ms, timing.tick_interval_ms
            ),
        ));
    }
    Ok(())
}

fn validate_store(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    if blueprint.store.kind == StoreKind::Json && blueprint.store.path.is_none() {
        return Err(ContractError::config_validation(
            "store.path",
            "json store requires a path",
        ));
    }
    Ok(())
}

fn validate_sensor(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    let sensor = &blueprint.sensor;
    match sensor.source {
        SensorSourceKind::Replay if sensor.replay_path.is_none() => {
            Err(ContractError::config_validation(
                "sensor.replay_path",
                "replay source requires a recording path",
            ))
        }
        SensorSourceKind::Raw if sensor.raw_bind.is_none() => {
            Err(ContractError::config_validation(
                "sensor.raw_bind",
                "raw source requires a bind address",
            ))
        }
        SensorSourceKind::Mock if sensor.mock.min_time_s >= sensor.mock.max_time_s => {
            Err(ContractError::config_validation(
                "sensor.mock.min_time_s / sensor.mock.max_time_s",
                format!(
                    "min_time_s ({}) must be < max_time_s ({})",
                    sensor.mock.min_time_s, sensor.mock.max_time_s
                ),
            ))
        }
        _ => Ok(()),
    }
}

fn validate_sinks(blueprint: &RaceBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}
