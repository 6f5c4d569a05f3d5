use serde::{Deserialize, Serialize};

use crate::{
    error::StorageError,
    preset::PresetSpec,
    types::{PowerLevel, RestoreMode, TriggerKind, MIN_POWER_LEVEL},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireplaceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub restore_mode: RestoreMode,
    #[serde(default)]
    pub presets: Option<Vec<PresetSpec>>,
    pub max_power_level: PowerLevel,
    #[serde(default)]
    pub off_speed_cycle: bool,
    #[serde(default = "default_save_debounce_ms")]
    pub settings_save_debounce_ms: u64,
}

fn default_save_debounce_ms() -> u64 {
    5_000
}

impl Default for FireplaceConfig {
    fn default() -> Self {
        Self {
            id: "fireplace".to_string(),
            name: "Fireplace".to_string(),
            restore_mode: RestoreMode::AlwaysOff,
            presets: None,
            max_power_level: 6,
            off_speed_cycle: false,
            settings_save_debounce_ms: default_save_debounce_ms(),
        }
    }
}

/// Durable record written after each committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub is_on: bool,
    pub power_level: u32,
    pub oscillating: bool,
    /// Position of the active preset in the preset table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<u8>,
}

impl PersistedState {
    /// A record whose level is outside `1..=max` is treated as absent.
    pub fn validate(&self, max_power_level: PowerLevel) -> Result<(), StorageError> {
        let min = u32::from(MIN_POWER_LEVEL);
        let max = u32::from(max_power_level);
        if !(min..=max).contains(&self.power_level) {
            return Err(StorageError::InvalidRecord(format!(
                "power level {} outside {min}..={max}",
                self.power_level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub client_id: String,
    pub topic_prefix: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
            client_id: "fireplace-controller-rust".to_string(),
            topic_prefix: "fireplace".to_string(),
        }
    }
}

/// Custom topics replacing the derived `{prefix}/...` defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicOverrides {
    pub power_state: Option<String>,
    pub power_command: Option<String>,
    pub power_level_state: Option<String>,
    pub power_level_command: Option<String>,
    pub preset_state: Option<String>,
    pub preset_command: Option<String>,
    pub oscillation_state: Option<String>,
    pub oscillation_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationAction {
    Log {
        message: String,
    },
    Publish {
        topic: String,
        payload: String,
        #[serde(default)]
        retain: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutomationConfig {
    pub on: TriggerKind,
    pub action: AutomationAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub fireplace: FireplaceConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub topics: TopicOverrides,
    #[serde(default)]
    pub automations: Vec<AutomationConfig>,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_http_port() -> u16 {
    8080
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fireplace: FireplaceConfig::default(),
            network: NetworkConfig::default(),
            topics: TopicOverrides::default(),
            automations: Vec::new(),
            http_port: default_http_port(),
        }
    }
}

impl NetworkConfig {
    pub fn sanitize(&mut self) {
        self.topic_prefix = self.topic_prefix.trim().trim_end_matches('/').to_string();
        if self.topic_prefix.is_empty() {
            self.topic_prefix = "fireplace".to_string();
        }
        if self.mqtt_port == 0 {
            self.mqtt_port = 1883;
        }
    }
}
