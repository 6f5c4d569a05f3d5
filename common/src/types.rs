use serde::{Deserialize, Serialize};

/// Power level of the fireplace, valid in `1..=max_power_level`.
pub type PowerLevel = u8;

pub const MIN_POWER_LEVEL: PowerLevel = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreMode {
    NoRestore,
    #[default]
    AlwaysOff,
    AlwaysOn,
    RestoreDefaultOff,
    RestoreDefaultOn,
    RestoreInvertedDefaultOff,
    RestoreInvertedDefaultOn,
}

impl RestoreMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoRestore => "NO_RESTORE",
            Self::AlwaysOff => "ALWAYS_OFF",
            Self::AlwaysOn => "ALWAYS_ON",
            Self::RestoreDefaultOff => "RESTORE_DEFAULT_OFF",
            Self::RestoreDefaultOn => "RESTORE_DEFAULT_ON",
            Self::RestoreInvertedDefaultOff => "RESTORE_INVERTED_DEFAULT_OFF",
            Self::RestoreInvertedDefaultOn => "RESTORE_INVERTED_DEFAULT_ON",
        }
    }

    /// Power state used when no usable record exists in the store.
    pub fn default_on(self) -> bool {
        matches!(
            self,
            Self::AlwaysOn | Self::RestoreDefaultOn | Self::RestoreInvertedDefaultOn
        )
    }

    /// Whether this mode consults the durable store at all.
    pub fn reads_storage(self) -> bool {
        !matches!(self, Self::NoRestore | Self::AlwaysOff | Self::AlwaysOn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    TurnOn,
    TurnOff,
    PowerSet,
    PresetSet,
}

impl TriggerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TurnOn => "TURN_ON",
            Self::TurnOff => "TURN_OFF",
            Self::PowerSet => "POWER_SET",
            Self::PresetSet => "PRESET_SET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleDirection {
    #[default]
    Up,
    Down,
}

/// Post-transition view of the entity, used as trigger payload and status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FireplaceSnapshot {
    pub id: String,
    #[serde(rename = "isOn")]
    pub is_on: bool,
    #[serde(rename = "powerLevel")]
    pub power_level: PowerLevel,
    pub oscillating: bool,
    #[serde(rename = "activePreset", skip_serializing_if = "Option::is_none")]
    pub active_preset: Option<String>,
}

impl FireplaceSnapshot {
    pub fn state_str(&self) -> &'static str {
        if self.is_on {
            "ON"
        } else {
            "OFF"
        }
    }
}

/// A trigger fired by a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub snapshot: FireplaceSnapshot,
}

/// Result of one command applied to the entity.
///
/// `changed` is true when any observable field moved, including oscillation,
/// which fires no trigger of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    pub triggers: Vec<TriggerEvent>,
}

impl Transition {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn trigger_kinds(&self) -> Vec<TriggerKind> {
        self.triggers.iter().map(|event| event.kind).collect()
    }

    pub fn fired(&self, kind: TriggerKind) -> bool {
        self.triggers.iter().any(|event| event.kind == kind)
    }
}
