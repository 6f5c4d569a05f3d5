pub mod binding;
pub mod command;
pub mod component;
pub mod config;
pub mod error;
pub mod fireplace;
pub mod preset;
pub mod remote;
pub mod restore;
pub mod storage;
pub mod topics;
pub mod trigger;
pub mod types;

pub use binding::{Publisher, TransportBindable, TransportBinding};
pub use command::FireplaceCommand;
pub use component::Component;
pub use config::{
    AutomationAction, AutomationConfig, FireplaceConfig, NetworkConfig, PersistedState,
    RuntimeConfig, TopicOverrides,
};
pub use error::{ConfigError, FireplaceError, ListenerError, PublishError, StorageError};
pub use fireplace::FireplaceEntity;
pub use preset::{Preset, PresetSpec, PresetTable};
pub use restore::{resolve, RestoredState};
pub use storage::{MemoryStore, SaveDebouncer, StateStore};
pub use topics::*;
pub use trigger::{DispatchReport, TriggerBus, TriggerListener};
pub use types::{
    CycleDirection, FireplaceSnapshot, PowerLevel, RestoreMode, Transition, TriggerEvent,
    TriggerKind, MIN_POWER_LEVEL,
};
