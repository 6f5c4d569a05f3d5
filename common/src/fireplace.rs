use tracing::{debug, info, warn};

use crate::{
    binding::TransportBindable,
    command::FireplaceCommand,
    component::Component,
    config::{FireplaceConfig, PersistedState},
    error::{ConfigError, FireplaceError},
    preset::PresetTable,
    restore::{self, RestoredState},
    storage::{SaveDebouncer, StateStore, SAVE_RETRY_MS},
    types::{
        CycleDirection, FireplaceSnapshot, PowerLevel, RestoreMode, Transition, TriggerEvent,
        TriggerKind, MIN_POWER_LEVEL,
    },
};

/// Fields whose change counts as a committed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    is_on: bool,
    power_level: PowerLevel,
    oscillating: bool,
    active_preset: Option<usize>,
}

#[derive(Debug)]
pub struct FireplaceEntity {
    id: String,
    name: String,
    restore_mode: RestoreMode,
    max_power_level: PowerLevel,
    off_speed_cycle: bool,
    presets: PresetTable,

    is_on: bool,
    power_level: PowerLevel,
    oscillating: bool,
    active_preset: Option<usize>,

    persistence: SaveDebouncer,
}

impl FireplaceEntity {
    pub fn new(config: &FireplaceConfig) -> Result<Self, ConfigError> {
        if config.max_power_level < MIN_POWER_LEVEL {
            return Err(ConfigError::InvalidMaxPowerLevel(config.max_power_level));
        }

        let presets = match &config.presets {
            Some(specs) => PresetTable::from_specs(specs)?,
            None => PresetTable::empty(),
        };
        if let Some(preset) = presets
            .iter()
            .find(|preset| !(MIN_POWER_LEVEL..=config.max_power_level).contains(&preset.power_level))
        {
            return Err(ConfigError::PresetLevelOutOfRange {
                name: preset.name.clone(),
                level: preset.power_level,
                max: config.max_power_level,
            });
        }

        let initial = RestoredState::DEFAULT;
        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            restore_mode: config.restore_mode,
            max_power_level: config.max_power_level,
            off_speed_cycle: config.off_speed_cycle,
            presets,
            is_on: initial.is_on,
            power_level: initial.power_level,
            oscillating: initial.oscillating,
            active_preset: None,
            persistence: SaveDebouncer::new(config.settings_save_debounce_ms),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn restore_mode(&self) -> RestoreMode {
        self.restore_mode
    }

    pub fn max_power_level(&self) -> PowerLevel {
        self.max_power_level
    }

    pub fn presets(&self) -> &PresetTable {
        &self.presets
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn is_off(&self) -> bool {
        !self.is_on
    }

    pub fn power_level(&self) -> PowerLevel {
        self.power_level
    }

    pub fn is_oscillating(&self) -> bool {
        self.oscillating
    }

    pub fn active_preset(&self) -> Option<&str> {
        self.active_preset
            .and_then(|index| self.presets.get(index))
            .map(|preset| preset.name.as_str())
    }

    pub fn has_pending_save(&self) -> bool {
        self.persistence.is_pending()
    }

    pub fn snapshot(&self) -> FireplaceSnapshot {
        FireplaceSnapshot {
            id: self.id.clone(),
            is_on: self.is_on,
            power_level: self.power_level,
            oscillating: self.oscillating,
            active_preset: self.active_preset().map(str::to_string),
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            is_on: self.is_on,
            power_level: u32::from(self.power_level),
            oscillating: self.oscillating,
            preset: self
                .active_preset
                .and_then(|index| u8::try_from(index).ok()),
        }
    }

    /// Seeds runtime state through the restore policy. Fires no triggers.
    pub fn restore(&mut self, persisted: Option<&PersistedState>) {
        let restored = restore::resolve(self.restore_mode, persisted);
        self.is_on = restored.is_on;
        self.power_level = self.clamp_level(restored.power_level);
        self.oscillating = restored.oscillating;
        self.active_preset = restored
            .preset
            .map(usize::from)
            .filter(|&index| {
                self.presets
                    .get(index)
                    .is_some_and(|preset| preset.power_level == self.power_level)
            })
            .or_else(|| self.presets.index_of_level(self.power_level));
    }

    pub fn turn_on(&mut self, power: Option<PowerLevel>) -> Transition {
        let prior = self.observed();
        self.is_on = true;
        if let Some(level) = power {
            self.apply_level(level);
        }

        let mut triggers = Vec::new();
        if !prior.is_on {
            triggers.push(TriggerKind::TurnOn);
        }
        self.push_level_triggers(prior, &mut triggers);
        self.commit(prior, &triggers)
    }

    /// Power level, oscillation and preset are kept for the next turn on.
    pub fn turn_off(&mut self) -> Transition {
        let prior = self.observed();
        self.is_on = false;

        let triggers: &[TriggerKind] = if prior.is_on {
            &[TriggerKind::TurnOff]
        } else {
            &[]
        };
        self.commit(prior, triggers)
    }

    pub fn toggle(&mut self) -> Transition {
        if self.is_on {
            self.turn_off()
        } else {
            self.turn_on(None)
        }
    }

    /// Ignored while off. Out-of-range levels are clamped to `1..=max`.
    pub fn set_power(&mut self, level: PowerLevel) -> Transition {
        if !self.is_on {
            debug!("'{}' - ignoring power {level} while off", self.name);
            return Transition::unchanged();
        }

        let prior = self.observed();
        self.apply_level(level);

        let mut triggers = Vec::new();
        self.push_level_triggers(prior, &mut triggers);
        self.commit(prior, &triggers)
    }

    pub fn set_preset(&mut self, name: &str) -> Result<Transition, FireplaceError> {
        let Some(index) = self.presets.index_of(name) else {
            warn!("'{}' - this fireplace does not support preset '{name}'", self.name);
            return Err(FireplaceError::UnknownPreset(name.to_string()));
        };
        let level = self.presets.get(index).map_or(self.power_level, |preset| preset.power_level);

        let prior = self.observed();
        self.is_on = true;
        self.power_level = level;
        self.active_preset = Some(index);

        let mut triggers = Vec::new();
        if !prior.is_on {
            triggers.push(TriggerKind::TurnOn);
        }
        if prior.active_preset != Some(index) {
            triggers.push(TriggerKind::PresetSet);
        }
        Ok(self.commit(prior, &triggers))
    }

    /// State-only: published and persisted, but no trigger kind exists for it.
    pub fn set_oscillating(&mut self, oscillating: bool) -> Transition {
        let prior = self.observed();
        self.oscillating = oscillating;
        self.commit(prior, &[])
    }

    pub fn cycle_speed(&mut self, direction: CycleDirection) -> Transition {
        if !self.is_on {
            return self.turn_on(Some(MIN_POWER_LEVEL));
        }

        let prior = self.observed();
        let next = match direction {
            CycleDirection::Up if self.power_level < self.max_power_level => {
                Some(self.power_level + 1)
            }
            CycleDirection::Down if self.power_level > MIN_POWER_LEVEL => {
                Some(self.power_level - 1)
            }
            _ => None,
        };

        let cycled_off = match next {
            Some(level) => {
                self.apply_level(level);
                false
            }
            None if self.off_speed_cycle => {
                self.is_on = false;
                if direction == CycleDirection::Up {
                    self.apply_level(MIN_POWER_LEVEL);
                }
                true
            }
            None => {
                let wrapped = match direction {
                    CycleDirection::Up => MIN_POWER_LEVEL,
                    CycleDirection::Down => self.max_power_level,
                };
                self.apply_level(wrapped);
                false
            }
        };

        let mut triggers = Vec::new();
        if cycled_off {
            triggers.push(TriggerKind::TurnOff);
        } else {
            self.push_level_triggers(prior, &mut triggers);
        }
        self.commit(prior, &triggers)
    }

    pub fn execute(&mut self, command: FireplaceCommand) -> Result<Transition, FireplaceError> {
        let transition = match command {
            FireplaceCommand::TurnOn { power } => self.turn_on(power),
            FireplaceCommand::TurnOff => self.turn_off(),
            FireplaceCommand::Toggle => self.toggle(),
            FireplaceCommand::SetPower(level) => self.set_power(level),
            FireplaceCommand::SetPreset(name) => self.set_preset(&name)?,
            FireplaceCommand::SetOscillating(oscillating) => self.set_oscillating(oscillating),
            FireplaceCommand::CycleSpeed(direction) => self.cycle_speed(direction),
        };
        Ok(transition)
    }

    fn clamp_level(&self, level: PowerLevel) -> PowerLevel {
        level.clamp(MIN_POWER_LEVEL, self.max_power_level)
    }

    /// Sets the level and re-derives the active preset from it.
    fn apply_level(&mut self, level: PowerLevel) {
        self.power_level = self.clamp_level(level);
        self.active_preset = self.presets.index_of_level(self.power_level);
    }

    /// POWER_SET when the level moved, PRESET_SET when the active preset
    /// moved. Presets sharing a level can switch without a level change.
    fn push_level_triggers(&self, prior: Observed, triggers: &mut Vec<TriggerKind>) {
        if self.power_level != prior.power_level {
            triggers.push(TriggerKind::PowerSet);
        }
        if self.active_preset != prior.active_preset {
            triggers.push(TriggerKind::PresetSet);
        }
    }

    fn observed(&self) -> Observed {
        Observed {
            is_on: self.is_on,
            power_level: self.power_level,
            oscillating: self.oscillating,
            active_preset: self.active_preset,
        }
    }

    fn commit(&mut self, prior: Observed, triggers: &[TriggerKind]) -> Transition {
        if self.observed() == prior {
            return Transition::unchanged();
        }

        self.persistence.mark_dirty();
        let snapshot = self.snapshot();
        debug!(
            "'{}' - state: {}, power: {}, oscillating: {}, preset: {}",
            self.name,
            snapshot.state_str(),
            snapshot.power_level,
            snapshot.oscillating,
            snapshot.active_preset.as_deref().unwrap_or("none")
        );

        Transition {
            changed: true,
            triggers: triggers
                .iter()
                .map(|&kind| TriggerEvent {
                    kind,
                    snapshot: snapshot.clone(),
                })
                .collect(),
        }
    }

    fn save(&mut self, store: &mut dyn StateStore, now_ms: u64) {
        if let Err(err) = store.save(&self.persisted_state()) {
            warn!("'{}' - failed to persist state: {err}", self.name);
            self.persistence.retry_after(now_ms, SAVE_RETRY_MS);
        }
    }
}

impl Component for FireplaceEntity {
    fn setup(&mut self, store: &mut dyn StateStore) {
        let persisted = if self.restore_mode.reads_storage() {
            match store.load() {
                Ok(Some(record)) => match record.validate(self.max_power_level) {
                    Ok(()) => Some(record),
                    Err(err) => {
                        warn!("'{}' - discarding stored state: {err}", self.name);
                        None
                    }
                },
                Ok(None) => None,
                Err(err) => {
                    warn!("'{}' - failed to load stored state: {err}", self.name);
                    None
                }
            }
        } else {
            None
        };

        self.restore(persisted.as_ref());
        info!(
            "'{}' - restored ({}): state {}, power {}",
            self.name,
            self.restore_mode.as_str(),
            if self.is_on { "ON" } else { "OFF" },
            self.power_level
        );
    }

    fn tick(&mut self, now_ms: u64, store: &mut dyn StateStore) {
        if self.persistence.poll(now_ms) {
            self.save(store, now_ms);
        }
    }

    fn shutdown(&mut self, store: &mut dyn StateStore) {
        if self.persistence.take() {
            if let Err(err) = store.save(&self.persisted_state()) {
                warn!("'{}' - failed to persist state on shutdown: {err}", self.name);
            }
        }
    }

    fn dump_config(&self) {
        info!("Fireplace '{}' ({})", self.name, self.id);
        info!("  Restore mode: {}", self.restore_mode.as_str());
        info!("  Power levels: {}", self.max_power_level);
        info!("  Off speed cycle: {}", if self.off_speed_cycle { "YES" } else { "NO" });
        if !self.presets.is_empty() {
            info!("  Supported presets:");
            for preset in self.presets.iter() {
                info!("    - {} (power {})", preset.name, preset.power_level);
            }
        }
    }
}

impl TransportBindable for FireplaceEntity {
    fn snapshot(&self) -> FireplaceSnapshot {
        FireplaceEntity::snapshot(self)
    }

    fn execute(&mut self, command: FireplaceCommand) -> Result<Transition, FireplaceError> {
        FireplaceEntity::execute(self, command)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{preset::PresetSpec, storage::MemoryStore};

    fn config(presets: &[&str]) -> FireplaceConfig {
        FireplaceConfig {
            presets: if presets.is_empty() {
                None
            } else {
                Some(
                    presets
                        .iter()
                        .map(|name| PresetSpec::Name(name.to_string()))
                        .collect(),
                )
            },
            max_power_level: 5,
            ..FireplaceConfig::default()
        }
    }

    fn entity(presets: &[&str]) -> FireplaceEntity {
        FireplaceEntity::new(&config(presets)).unwrap()
    }

    #[test]
    fn set_power_reads_back_and_tracks_presets() {
        let mut fireplace = entity(&["low", "medium", "high"]);
        fireplace.turn_on(None);

        for level in 1..=5 {
            fireplace.set_power(level);
            assert_eq!(fireplace.power_level(), level);
            let expected = match level {
                1 => Some("low"),
                2 => Some("medium"),
                3 => Some("high"),
                _ => None,
            };
            assert_eq!(fireplace.active_preset(), expected);
        }
    }

    #[test]
    fn set_power_fires_power_set_once() {
        let mut fireplace = entity(&[]);
        fireplace.turn_on(None);

        let transition = fireplace.set_power(4);
        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::PowerSet]);
        assert_eq!(transition.triggers[0].snapshot.power_level, 4);

        let repeat = fireplace.set_power(4);
        assert_eq!(repeat, Transition::unchanged());
    }

    #[test]
    fn set_power_while_off_is_ignored() {
        let mut fireplace = entity(&[]);
        let transition = fireplace.set_power(3);

        assert_eq!(transition, Transition::unchanged());
        assert_eq!(fireplace.power_level(), MIN_POWER_LEVEL);
        assert!(!fireplace.has_pending_save());
    }

    #[test]
    fn set_power_clamps_out_of_range() {
        let mut fireplace = entity(&[]);
        fireplace.turn_on(None);

        fireplace.set_power(200);
        assert_eq!(fireplace.power_level(), 5);

        fireplace.set_power(0);
        assert_eq!(fireplace.power_level(), 1);
    }

    #[test]
    fn shared_preset_level_picks_first_configured() {
        let mut config = config(&[]);
        config.presets = Some(
            serde_json::from_str(
                r#"[{"name": "cozy", "power_level": 2}, {"name": "night", "power_level": 2}]"#,
            )
            .unwrap(),
        );
        let mut fireplace = FireplaceEntity::new(&config).unwrap();

        fireplace.set_preset("night").unwrap();
        assert_eq!(fireplace.active_preset(), Some("night"));

        fireplace.set_power(3);
        fireplace.set_power(2);
        assert_eq!(fireplace.active_preset(), Some("cozy"));
    }

    #[test]
    fn same_level_preset_switch_fires_preset_set() {
        let mut config = config(&[]);
        config.presets = Some(
            serde_json::from_str(
                r#"[{"name": "cozy", "power_level": 2}, {"name": "night", "power_level": 2}]"#,
            )
            .unwrap(),
        );
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        fireplace.set_preset("night").unwrap();

        let transition = fireplace.set_power(2);
        assert!(transition.changed);
        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::PresetSet]);
        assert_eq!(
            transition.triggers[0].snapshot.active_preset.as_deref(),
            Some("cozy")
        );

        fireplace.set_preset("night").unwrap();
        let transition = fireplace.turn_on(Some(2));
        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::PresetSet]);
    }

    #[test]
    fn cycling_onto_a_preset_level_fires_both() {
        let mut fireplace = entity(&["low", "medium"]);
        fireplace.turn_on(Some(1));

        let transition = fireplace.cycle_speed(CycleDirection::Up);
        assert_eq!(
            transition.trigger_kinds(),
            vec![TriggerKind::PowerSet, TriggerKind::PresetSet]
        );

        let transition = fireplace.cycle_speed(CycleDirection::Up);
        assert_eq!(
            transition.trigger_kinds(),
            vec![TriggerKind::PowerSet, TriggerKind::PresetSet]
        );
        assert_eq!(fireplace.active_preset(), None);
    }

    #[test]
    fn set_preset_turns_on_and_sets_level() {
        let names = ["low", "medium", "high"];
        for (index, name) in names.iter().enumerate() {
            let mut fireplace = entity(&names);
            assert!(fireplace.is_off());

            let transition = fireplace.set_preset(name).unwrap();

            assert!(fireplace.is_on());
            assert_eq!(usize::from(fireplace.power_level()), index + 1);
            assert_eq!(fireplace.active_preset(), Some(*name));
            assert_eq!(
                transition.trigger_kinds(),
                vec![TriggerKind::TurnOn, TriggerKind::PresetSet]
            );
        }
    }

    #[test]
    fn unknown_preset_leaves_state_untouched() {
        let mut fireplace = entity(&["low"]);
        fireplace.turn_on(Some(3));
        let before = fireplace.snapshot();

        let err = fireplace.set_preset("turbo").unwrap_err();

        assert_eq!(err, FireplaceError::UnknownPreset("turbo".to_string()));
        assert_eq!(fireplace.snapshot(), before);
    }

    #[test]
    fn turn_on_with_power_fires_turn_on_then_power_set() {
        let mut fireplace = entity(&["low", "medium"]);
        let transition = fireplace.turn_on(Some(2));

        assert_eq!(
            transition.trigger_kinds(),
            vec![TriggerKind::TurnOn, TriggerKind::PowerSet, TriggerKind::PresetSet]
        );
        assert_eq!(fireplace.active_preset(), Some("medium"));
        assert!(transition
            .triggers
            .iter()
            .all(|event| event.snapshot == fireplace.snapshot()));
    }

    #[test]
    fn turn_off_retains_settings() {
        let mut fireplace = entity(&["low", "medium"]);
        fireplace.set_preset("medium").unwrap();
        fireplace.set_oscillating(true);

        let transition = fireplace.turn_off();

        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::TurnOff]);
        assert_eq!(fireplace.power_level(), 2);
        assert!(fireplace.is_oscillating());
        assert_eq!(fireplace.active_preset(), Some("medium"));
        assert_eq!(fireplace.turn_off(), Transition::unchanged());
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut fireplace = entity(&["low", "medium"]);
        fireplace.turn_on(None);
        fireplace.set_power(2);
        fireplace.set_oscillating(true);
        let original = fireplace.snapshot();

        assert_eq!(fireplace.toggle().trigger_kinds(), vec![TriggerKind::TurnOff]);
        assert_eq!(fireplace.toggle().trigger_kinds(), vec![TriggerKind::TurnOn]);
        assert_eq!(fireplace.snapshot(), original);
    }

    #[test]
    fn oscillation_is_state_only() {
        let mut fireplace = entity(&[]);
        let transition = fireplace.set_oscillating(true);

        assert!(transition.changed);
        assert!(transition.triggers.is_empty());
        assert!(fireplace.has_pending_save());
    }

    #[test]
    fn cycle_down_from_one_turns_off_when_enabled() {
        let mut config = config(&[]);
        config.off_speed_cycle = true;
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        fireplace.turn_on(Some(1));

        let transition = fireplace.cycle_speed(CycleDirection::Down);

        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::TurnOff]);
        assert!(!transition.fired(TriggerKind::PowerSet));
        assert!(fireplace.is_off());
    }

    #[test]
    fn cycle_wraps_without_off_cycle() {
        let mut fireplace = entity(&[]);
        fireplace.turn_on(Some(1));

        let transition = fireplace.cycle_speed(CycleDirection::Down);
        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::PowerSet]);
        assert_eq!(fireplace.power_level(), 5);

        fireplace.cycle_speed(CycleDirection::Up);
        assert_eq!(fireplace.power_level(), 1);
        assert!(fireplace.is_on());
    }

    #[test]
    fn cycle_up_past_max_turns_off_and_resets_level() {
        let mut config = config(&[]);
        config.off_speed_cycle = true;
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        fireplace.turn_on(Some(5));

        let transition = fireplace.cycle_speed(CycleDirection::Up);

        assert_eq!(transition.trigger_kinds(), vec![TriggerKind::TurnOff]);
        assert_eq!(fireplace.power_level(), 1);
    }

    #[test]
    fn cycle_steps_and_starts_from_off() {
        let mut fireplace = entity(&[]);
        fireplace.turn_on(Some(3));
        fireplace.turn_off();

        let transition = fireplace.cycle_speed(CycleDirection::Up);
        assert_eq!(
            transition.trigger_kinds(),
            vec![TriggerKind::TurnOn, TriggerKind::PowerSet]
        );
        assert_eq!(fireplace.power_level(), 1);

        fireplace.cycle_speed(CycleDirection::Up);
        assert_eq!(fireplace.power_level(), 2);
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let err = FireplaceEntity::new(&config(&["low", "low", "high"])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicatePreset {
                index: 1,
                name: "low".to_string()
            }
        );

        let mut empty = config(&[]);
        empty.presets = Some(Vec::new());
        assert_eq!(
            FireplaceEntity::new(&empty).unwrap_err(),
            ConfigError::EmptyPresets
        );

        let mut too_many = config(&["a", "b", "c", "d", "e", "f"]);
        too_many.max_power_level = 5;
        assert!(matches!(
            FireplaceEntity::new(&too_many),
            Err(ConfigError::PresetLevelOutOfRange { level: 6, .. })
        ));

        let mut zero = config(&[]);
        zero.max_power_level = 0;
        assert_eq!(
            FireplaceEntity::new(&zero).unwrap_err(),
            ConfigError::InvalidMaxPowerLevel(0)
        );
    }

    #[test]
    fn execute_dispatches_commands() {
        let mut fireplace = entity(&["low", "high"]);

        fireplace
            .execute(FireplaceCommand::SetPreset("high".to_string()))
            .unwrap();
        assert_eq!(fireplace.power_level(), 2);

        fireplace.execute(FireplaceCommand::SetOscillating(true)).unwrap();
        fireplace.execute(FireplaceCommand::Toggle).unwrap();
        assert!(fireplace.is_off());
        assert!(fireplace.is_oscillating());

        assert!(fireplace
            .execute(FireplaceCommand::SetPreset("medium".to_string()))
            .is_err());
    }

    #[test]
    fn setup_restores_with_preset_index() {
        let mut config = config(&[]);
        config.restore_mode = RestoreMode::RestoreDefaultOff;
        config.presets = Some(
            serde_json::from_str(
                r#"[{"name": "cozy", "power_level": 2}, {"name": "night", "power_level": 2}]"#,
            )
            .unwrap(),
        );
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        let mut store = MemoryStore::with_record(PersistedState {
            is_on: true,
            power_level: 2,
            oscillating: true,
            preset: Some(1),
        });

        fireplace.setup(&mut store);

        assert!(fireplace.is_on());
        assert!(fireplace.is_oscillating());
        assert_eq!(fireplace.active_preset(), Some("night"));
        assert!(!fireplace.has_pending_save());
    }

    #[test]
    fn setup_discards_out_of_range_record() {
        let mut config = config(&["low"]);
        config.restore_mode = RestoreMode::RestoreDefaultOn;
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        let mut store = MemoryStore::with_record(PersistedState {
            is_on: false,
            power_level: 42,
            oscillating: true,
            preset: None,
        });

        fireplace.setup(&mut store);

        assert!(fireplace.is_on());
        assert_eq!(fireplace.power_level(), 1);
        assert!(!fireplace.is_oscillating());
        assert_eq!(fireplace.active_preset(), Some("low"));
    }

    #[test]
    fn setup_treats_failed_load_as_absent() {
        let mut config = config(&["low"]);
        config.restore_mode = RestoreMode::RestoreDefaultOn;
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        let mut store = MemoryStore {
            fail_loads: true,
            ..MemoryStore::default()
        };

        fireplace.setup(&mut store);

        assert_eq!(store.loads, 1);
        assert!(fireplace.is_on());
        assert_eq!(fireplace.power_level(), 1);
        assert!(!fireplace.is_oscillating());
        assert_eq!(fireplace.active_preset(), Some("low"));
        assert!(!fireplace.has_pending_save());
    }

    #[test]
    fn setup_never_reads_store_for_fixed_modes() {
        for mode in [RestoreMode::NoRestore, RestoreMode::AlwaysOn, RestoreMode::AlwaysOff] {
            let mut config = config(&[]);
            config.restore_mode = mode;
            let mut fireplace = FireplaceEntity::new(&config).unwrap();
            let mut store = MemoryStore::default();

            fireplace.setup(&mut store);

            assert_eq!(store.loads, 0);
            assert_eq!(fireplace.is_on(), mode == RestoreMode::AlwaysOn);
        }
    }

    #[test]
    fn tick_persists_after_debounce() {
        let mut config = config(&[]);
        config.settings_save_debounce_ms = 1_000;
        let mut fireplace = FireplaceEntity::new(&config).unwrap();
        let mut store = MemoryStore::default();

        fireplace.turn_on(Some(3));
        fireplace.tick(0, &mut store);
        fireplace.tick(999, &mut store);
        assert_eq!(store.saves, 0);

        fireplace.tick(1_000, &mut store);
        assert_eq!(store.saves, 1);
        assert_eq!(
            store.record,
            Some(PersistedState {
                is_on: true,
                power_level: 3,
                oscillating: false,
                preset: None,
            })
        );
    }

    #[test]
    fn failed_save_is_retried_without_touching_state() {
        let mut fireplace = entity(&[]);
        let mut store = MemoryStore {
            fail_saves: true,
            ..MemoryStore::default()
        };

        fireplace.turn_on(None);
        fireplace.tick(0, &mut store);
        fireplace.tick(10_000, &mut store);
        assert!(fireplace.is_on());
        assert!(fireplace.has_pending_save());

        store.fail_saves = false;
        fireplace.tick(10_000 + SAVE_RETRY_MS, &mut store);
        assert_eq!(store.saves, 1);
    }

    #[test]
    fn shutdown_flushes_pending_state() {
        let mut fireplace = entity(&[]);
        let mut store = MemoryStore::default();

        fireplace.shutdown(&mut store);
        assert_eq!(store.saves, 0);

        fireplace.set_oscillating(true);
        fireplace.shutdown(&mut store);
        assert_eq!(store.saves, 1);
        assert!(!fireplace.has_pending_save());
    }
}
