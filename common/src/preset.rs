use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::PowerLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(rename = "powerLevel", alias = "power_level")]
    pub power_level: PowerLevel,
}

/// Configuration form of a preset: a bare name takes its 1-based position as
/// its power level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PresetSpec {
    Name(String),
    Explicit(Preset),
}

/// Read-only preset lookup table, validated once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetTable {
    presets: Vec<Preset>,
    by_name: HashMap<String, usize>,
    by_level: HashMap<PowerLevel, usize>,
}

impl PresetTable {
    /// Table for an entity configured without presets.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from preset names, assigning level `index + 1` to each.
    pub fn build<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let presets = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Preset {
                name: name.into(),
                power_level: PowerLevel::try_from(index + 1).unwrap_or(PowerLevel::MAX),
            })
            .collect();
        Self::from_presets(presets)
    }

    pub fn from_specs(specs: &[PresetSpec]) -> Result<Self, ConfigError> {
        let presets = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| match spec {
                PresetSpec::Name(name) => Preset {
                    name: name.clone(),
                    power_level: PowerLevel::try_from(index + 1).unwrap_or(PowerLevel::MAX),
                },
                PresetSpec::Explicit(preset) => preset.clone(),
            })
            .collect();
        Self::from_presets(presets)
    }

    pub fn from_presets(presets: Vec<Preset>) -> Result<Self, ConfigError> {
        if presets.is_empty() {
            return Err(ConfigError::EmptyPresets);
        }

        let mut seen = HashSet::new();
        for (index, preset) in presets.iter().enumerate() {
            if !seen.insert(preset.name.as_str()) {
                return Err(ConfigError::DuplicatePreset {
                    index,
                    name: preset.name.clone(),
                });
            }
        }

        let mut by_name = HashMap::with_capacity(presets.len());
        let mut by_level = HashMap::new();
        for (index, preset) in presets.iter().enumerate() {
            by_name.insert(preset.name.clone(), index);
            // First preset in configuration order owns a shared level.
            by_level.entry(preset.power_level).or_insert(index);
        }

        Ok(Self {
            presets,
            by_name,
            by_level,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Preset> {
        self.presets.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Preset> {
        self.index_of(name).map(|index| &self.presets[index])
    }

    pub fn index_of_level(&self, level: PowerLevel) -> Option<usize> {
        self.by_level.get(&level).copied()
    }

    pub fn by_power_level(&self, level: PowerLevel) -> Option<&Preset> {
        self.index_of_level(level).map(|index| &self.presets[index])
    }

    pub fn max_level(&self) -> Option<PowerLevel> {
        self.presets.iter().map(|preset| preset.power_level).max()
    }
}
