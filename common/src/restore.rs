use crate::{
    config::PersistedState,
    types::{PowerLevel, RestoreMode, MIN_POWER_LEVEL},
};

/// Initial runtime state chosen by the restore policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredState {
    pub is_on: bool,
    pub power_level: PowerLevel,
    pub oscillating: bool,
    pub preset: Option<u8>,
}

impl RestoredState {
    /// State of a fresh device that never consulted storage.
    pub const DEFAULT: Self = Self {
        is_on: false,
        power_level: MIN_POWER_LEVEL,
        oscillating: false,
        preset: None,
    };

    fn fallback(is_on: bool) -> Self {
        Self {
            is_on,
            ..Self::DEFAULT
        }
    }

    fn from_persisted(persisted: &PersistedState, is_on: bool) -> Self {
        Self {
            is_on,
            power_level: PowerLevel::try_from(persisted.power_level).unwrap_or(PowerLevel::MAX),
            oscillating: persisted.oscillating,
            preset: persisted.preset,
        }
    }
}

/// Maps the stored record and the restore mode to the initial state.
///
/// `persisted` must already be validated; callers pass `None` for a missing
/// or malformed record.
pub fn resolve(mode: RestoreMode, persisted: Option<&PersistedState>) -> RestoredState {
    match mode {
        RestoreMode::NoRestore => RestoredState::DEFAULT,
        RestoreMode::AlwaysOff | RestoreMode::AlwaysOn => RestoredState::fallback(mode.default_on()),
        RestoreMode::RestoreDefaultOff | RestoreMode::RestoreDefaultOn => match persisted {
            Some(state) => RestoredState::from_persisted(state, state.is_on),
            None => RestoredState::fallback(mode.default_on()),
        },
        RestoreMode::RestoreInvertedDefaultOff | RestoreMode::RestoreInvertedDefaultOn => {
            match persisted {
                Some(state) => RestoredState::from_persisted(state, !state.is_on),
                None => RestoredState::fallback(mode.default_on()),
            }
        }
    }
}
