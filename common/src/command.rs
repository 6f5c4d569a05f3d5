use crate::types::{CycleDirection, PowerLevel};

/// Every operation of the entity command surface as a value, so that
/// automation, transport and physical inputs share one dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireplaceCommand {
    TurnOn { power: Option<PowerLevel> },
    TurnOff,
    Toggle,
    SetPower(PowerLevel),
    SetPreset(String),
    SetOscillating(bool),
    CycleSpeed(CycleDirection),
}

impl FireplaceCommand {
    /// Parses a textual command such as `turn on 3`, `set power 2`,
    /// `preset Eco` or `cycle down`. Keywords are case-insensitive; preset
    /// names keep their case.
    pub fn parse(message: &str) -> Option<Self> {
        let words: Vec<&str> = message.split_whitespace().collect();
        let lower: Vec<String> = words.iter().map(|word| word.to_ascii_lowercase()).collect();
        let keywords: Vec<&str> = lower.iter().map(String::as_str).collect();

        match keywords.as_slice() {
            ["turn", "on"] | ["on"] => Some(Self::TurnOn { power: None }),
            ["turn", "on", level] | ["on", level] => Some(Self::TurnOn {
                power: Some(parse_level(level)?),
            }),
            ["turn", "off"] | ["off"] => Some(Self::TurnOff),
            ["toggle"] => Some(Self::Toggle),
            ["set", "power", level] | ["power", level] => Some(Self::SetPower(parse_level(level)?)),
            ["set", "preset", _, ..] => Some(Self::SetPreset(after_words(message, 2).to_string())),
            ["preset", _, ..] => Some(Self::SetPreset(after_words(message, 1).to_string())),
            ["oscillate", value] | ["set", "oscillating", value] | ["oscillating", value] => {
                parse_switch(value).map(Self::SetOscillating)
            }
            ["cycle"] | ["cycle", "up"] => Some(Self::CycleSpeed(CycleDirection::Up)),
            ["cycle", "down"] => Some(Self::CycleSpeed(CycleDirection::Down)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOn { .. } => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
            Self::SetPower(_) => "set_power",
            Self::SetPreset(_) => "set_preset",
            Self::SetOscillating(_) => "set_oscillating",
            Self::CycleSpeed(_) => "cycle_speed",
        }
    }
}

/// Levels above the device range are accepted here and clamped by the entity.
pub fn parse_level(value: &str) -> Option<PowerLevel> {
    let digits = value.trim();
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    // All digits, so the only parse failure left is overflow.
    Some(digits.parse::<PowerLevel>().unwrap_or(PowerLevel::MAX))
}

/// The original text after the first `count` words, inner spacing intact.
fn after_words(message: &str, count: usize) -> &str {
    let mut rest = message.trim_start();
    for _ in 0..count {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

pub fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" | "oscillate_on" => Some(true),
        "off" | "false" | "0" | "no" | "oscillate_off" => Some(false),
        _ => None,
    }
}

pub fn parse_direction(value: &str) -> Option<CycleDirection> {
    match value.trim().to_ascii_lowercase().as_str() {
        "up" | "forward" | "next" => Some(CycleDirection::Up),
        "down" | "reverse" | "previous" => Some(CycleDirection::Down),
        _ => None,
    }
}
