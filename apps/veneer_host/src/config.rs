use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::Level;
use veneer_model::{ModelConfig, SchemaValidated};

/// Facility layout and churn settings for the simulated session
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScenarioConfig {
    /// Number of rooms in the facility
    #[serde(default = "default_rooms")]
    #[schemars(description = "Number of rooms in the simulated facility", range(min = 2, max = 256))]
    pub rooms: u32,

    /// Human players joining at start
    #[serde(default = "default_players")]
    #[schemars(description = "Human players connected when the session starts", range(max = 64))]
    pub players: u32,

    /// Ticks between silent object losses
    #[serde(default = "default_loss_interval")]
    #[schemars(
        description = "Every N ticks the engine loses one toy without notifying the bridge (0 disables)"
    )]
    pub loss_interval: u64,
}

fn default_rooms() -> u32 {
    6
}

fn default_players() -> u32 {
    4
}

fn default_loss_interval() -> u64 {
    10
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            rooms: default_rooms(),
            players: default_players(),
            loss_interval: default_loss_interval(),
        }
    }
}

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Veneer Host Configuration")]
#[schemars(description = "Configuration for the Veneer demo host")]
pub struct Config {
    /// Session name
    #[serde(default = "default_name")]
    #[schemars(description = "Human-readable session name")]
    pub name: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,

    /// Engine tick rate in Hz
    #[serde(default = "default_tick_rate")]
    #[schemars(description = "Engine update frequency in ticks per second", range(min = 1, max = 1000))]
    pub tick_rate: u64,

    /// Ticks to run before shutting down
    #[serde(default = "default_ticks")]
    #[schemars(description = "Number of ticks to simulate; 0 runs until Ctrl+C")]
    pub ticks: u64,

    /// Object model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Simulated facility
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

fn default_name() -> String {
    "Veneer Facility".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_rate() -> u64 {
    20
}

fn default_ticks() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            tick_rate: default_tick_rate(),
            ticks: default_ticks(),
            model: ModelConfig::default(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl Config {
    /// Parsed log level; `None` for an unknown name
    pub fn level(&self) -> Option<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

impl SchemaValidated for Config {}

#[cfg(test)]
mod tests {
    use super::*;
    use veneer_model::FamilyKind;

    #[test]
    fn test_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.name, "Veneer Facility");
        assert_eq!(config.level(), Some(Level::INFO));
        assert_eq!(config.scenario.rooms, 6);
        assert!(config.model.heal_stale_entries);
    }

    #[test]
    fn test_nested_model_config() {
        let json = r#"{
            "log_level": "debug",
            "model": { "tracked_families": ["door", "pickup"], "heal_stale_entries": false },
            "scenario": { "rooms": 3, "players": 1 }
        }"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.model.tracked(), vec![FamilyKind::Door, FamilyKind::Pickup]);
        assert_eq!(config.scenario.loss_interval, 10);
    }

    #[test]
    fn test_schema_rejects_bad_values() {
        assert!(Config::from_json_str(r#"{ "log_level": "loud" }"#).is_err());
        assert!(Config::from_json_str(r#"{ "tick_rate": 0 }"#).is_err());
        assert!(Config::from_json_str(r#"{ "scenario": { "rooms": 1 } }"#).is_err());
    }
}
