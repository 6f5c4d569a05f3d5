use crate::storage::StateStore;

/// Lifecycle hooks the host drives on its single execution context.
pub trait Component {
    /// Restores state from `store` before the first command is accepted.
    fn setup(&mut self, store: &mut dyn StateStore);

    /// Periodic loop hook; flushes debounced persistence.
    fn tick(&mut self, now_ms: u64, store: &mut dyn StateStore);

    /// Final flush before the process exits.
    fn shutdown(&mut self, store: &mut dyn StateStore);

    fn dump_config(&self);
}
