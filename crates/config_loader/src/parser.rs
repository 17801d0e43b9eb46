//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted.

use contracts::{ContractError, RaceBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<RaceBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<RaceBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<RaceBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SensorSourceKind, StoreKind};

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[track]
lanes = 4

[event]
event_id = 1
multiplier = 4

[[cars]]
car_id = 1
name = "Comet"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.track.operational(), vec![0, 1, 2, 3]);
        assert_eq!(bp.timing.dnf_timeout_ms, 6000);
        assert_eq!(bp.timing.settle_delay_ms, 8000);
        assert_eq!(bp.store.kind, StoreKind::Memory);
        assert_eq!(bp.sensor.source, SensorSourceKind::Mock);
        assert_eq!(bp.sensor.replay_speed, 1.0);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "track": { "lanes": 3, "operational_lanes": [0, 2] },
            "event": { "event_id": 9, "name": "Regional", "multiplier": 2 },
            "cars": [{ "car_id": 5, "name": "Bolt", "nickname": "B" }],
            "store": { "kind": "json", "path": "results.json" },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.track.operational(), vec![0, 2]);
        assert_eq!(bp.cars[0].nickname.as_deref(), Some("B"));
        assert_eq!(bp.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_enum_value_rejected() {
        let content = r#"
[track]
lanes = 4

[event]
event_id = 1
multiplier = 1

[store]
kind = "postgres"
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
