use crate::config::TopicOverrides;

pub const TOPIC_SUFFIX_STATE: &str = "state";
pub const TOPIC_SUFFIX_COMMAND: &str = "command";
pub const TOPIC_SUFFIX_AVAILABILITY: &str = "status";

pub const TOPIC_SUFFIX_POWER_STATE: &str = "power/state";
pub const TOPIC_SUFFIX_POWER_COMMAND: &str = "power/set";
pub const TOPIC_SUFFIX_POWER_LEVEL_STATE: &str = "power_level/state";
pub const TOPIC_SUFFIX_POWER_LEVEL_COMMAND: &str = "power_level/set";
pub const TOPIC_SUFFIX_PRESET_STATE: &str = "preset/state";
pub const TOPIC_SUFFIX_PRESET_COMMAND: &str = "preset/set";
pub const TOPIC_SUFFIX_OSCILLATION_STATE: &str = "oscillation/state";
pub const TOPIC_SUFFIX_OSCILLATION_COMMAND: &str = "oscillation/set";
pub const TOPIC_SUFFIX_RF_RAW: &str = "rf/raw";

pub const PAYLOAD_ONLINE: &str = "online";
pub const PAYLOAD_OFFLINE: &str = "offline";

/// Resolved topic set for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub state: String,
    pub command: String,
    pub availability: String,
    pub power_state: String,
    pub power_command: String,
    pub power_level_state: String,
    pub power_level_command: String,
    pub preset_state: String,
    pub preset_command: String,
    pub oscillation_state: String,
    pub oscillation_command: String,
    pub rf_raw: String,
}

impl Topics {
    pub fn new(prefix: &str, overrides: &TopicOverrides) -> Self {
        let topic = |suffix: &str| format!("{prefix}/{suffix}");
        let pick = |custom: &Option<String>, suffix: &str| {
            custom
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| topic(suffix))
        };

        Self {
            state: topic(TOPIC_SUFFIX_STATE),
            command: topic(TOPIC_SUFFIX_COMMAND),
            availability: topic(TOPIC_SUFFIX_AVAILABILITY),
            power_state: pick(&overrides.power_state, TOPIC_SUFFIX_POWER_STATE),
            power_command: pick(&overrides.power_command, TOPIC_SUFFIX_POWER_COMMAND),
            power_level_state: pick(&overrides.power_level_state, TOPIC_SUFFIX_POWER_LEVEL_STATE),
            power_level_command: pick(
                &overrides.power_level_command,
                TOPIC_SUFFIX_POWER_LEVEL_COMMAND,
            ),
            preset_state: pick(&overrides.preset_state, TOPIC_SUFFIX_PRESET_STATE),
            preset_command: pick(&overrides.preset_command, TOPIC_SUFFIX_PRESET_COMMAND),
            oscillation_state: pick(&overrides.oscillation_state, TOPIC_SUFFIX_OSCILLATION_STATE),
            oscillation_command: pick(
                &overrides.oscillation_command,
                TOPIC_SUFFIX_OSCILLATION_COMMAND,
            ),
            rf_raw: topic(TOPIC_SUFFIX_RF_RAW),
        }
    }

    pub fn subscriptions(&self) -> [&str; 6] {
        [
            self.command.as_str(),
            self.power_command.as_str(),
            self.power_level_command.as_str(),
            self.preset_command.as_str(),
            self.oscillation_command.as_str(),
            self.rf_raw.as_str(),
        ]
    }
}
