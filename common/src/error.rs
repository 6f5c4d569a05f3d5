use thiserror::Error;

use crate::types::PowerLevel;

/// Static configuration rejected at construction. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("found duplicate preset name '{name}' at index {index}, presets must have unique names")]
    DuplicatePreset { index: usize, name: String },
    #[error("preset list is empty, at least one preset is required when presets are configured")]
    EmptyPresets,
    #[error("max_power_level must be at least 1, got {0}")]
    InvalidMaxPowerLevel(PowerLevel),
    #[error("preset '{name}' has power level {level}, outside 1..={max}")]
    PresetLevelOutOfRange {
        name: String,
        level: PowerLevel,
        max: PowerLevel,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FireplaceError {
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stored record is invalid: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, Error)]
#[error("publish to '{topic}' failed: {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
