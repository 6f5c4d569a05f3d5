use crate::{config::PersistedState, error::StorageError};

const MIN_SAVE_DEBOUNCE_MS: u64 = 250;
pub const SAVE_RETRY_MS: u64 = 10_000;

/// Logical contract with the durable key-value store.
pub trait StateStore {
    fn load(&mut self) -> Result<Option<PersistedState>, StorageError>;
    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError>;
}

/// In-process store, used by tests and by hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub record: Option<PersistedState>,
    pub loads: usize,
    pub saves: usize,
    pub fail_saves: bool,
    pub fail_loads: bool,
}

impl MemoryStore {
    pub fn with_record(record: PersistedState) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<Option<PersistedState>, StorageError> {
        self.loads += 1;
        if self.fail_loads {
            return Err(StorageError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(self.record)
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), StorageError> {
        if self.fail_saves {
            return Err(StorageError::Io(std::io::Error::other("store unavailable")));
        }
        self.saves += 1;
        self.record = Some(*state);
        Ok(())
    }
}

/// Quiet-period debounce for persistence writes.
///
/// Every change pushes the deadline out; the save happens once changes stop.
#[derive(Debug, Clone, Default)]
pub struct SaveDebouncer {
    debounce_ms: u64,
    dirty: bool,
    deadline_ms: Option<u64>,
}

impl SaveDebouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms: debounce_ms.max(MIN_SAVE_DEBOUNCE_MS),
            dirty: false,
            deadline_ms: None,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_pending(&self) -> bool {
        self.dirty || self.deadline_ms.is_some()
    }

    /// Returns true when a save is due at `now_ms`, clearing the deadline.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.dirty {
            self.dirty = false;
            self.deadline_ms = Some(now_ms.saturating_add(self.debounce_ms));
            return false;
        }

        match self.deadline_ms {
            Some(due_ms) if now_ms >= due_ms => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }

    pub fn retry_after(&mut self, now_ms: u64, delay_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(delay_ms));
    }

    /// Clears any pending save, returning whether one was pending.
    pub fn take(&mut self) -> bool {
        let pending = self.is_pending();
        self.dirty = false;
        self.deadline_ms = None;
        pending
    }
}
