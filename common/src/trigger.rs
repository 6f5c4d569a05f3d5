use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::{
    error::ListenerError,
    types::{TriggerEvent, TriggerKind},
};

/// Automation hook invoked when its trigger kind fires.
pub trait TriggerListener: Send + Sync {
    fn on_trigger(&self, event: &TriggerEvent) -> Result<(), ListenerError>;
}

impl<F> TriggerListener for F
where
    F: Fn(&TriggerEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_trigger(&self, event: &TriggerEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub failed: usize,
}

struct Registration {
    kind: TriggerKind,
    listener: Box<dyn TriggerListener>,
}

/// Fan-out from entity transitions to registered listeners.
///
/// Registration happens during startup wiring; dispatch is synchronous and in
/// registration order.
#[derive(Default)]
pub struct TriggerBus {
    registrations: Vec<Registration>,
}

impl TriggerBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: TriggerKind, listener: impl TriggerListener + 'static) {
        self.registrations.push(Registration {
            kind,
            listener: Box::new(listener),
        });
    }

    pub fn listener_count(&self, kind: TriggerKind) -> usize {
        self.registrations
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    pub fn fire(&self, event: &TriggerEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        debug!("firing {} for '{}'", event.kind.as_str(), event.snapshot.id);

        for (position, registration) in self
            .registrations
            .iter()
            .filter(|registration| registration.kind == event.kind)
            .enumerate()
        {
            report.invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| registration.listener.on_trigger(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        "{} listener #{position} failed: {err}",
                        event.kind.as_str()
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    warn!("{} listener #{position} panicked", event.kind.as_str());
                }
            }
        }

        report
    }

    pub fn fire_all<'a>(&self, events: impl IntoIterator<Item = &'a TriggerEvent>) -> DispatchReport {
        events
            .into_iter()
            .fold(DispatchReport::default(), |mut total, event| {
                let report = self.fire(event);
                total.invoked += report.invoked;
                total.failed += report.failed;
                total
            })
    }
}

impl std::fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerBus")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}
