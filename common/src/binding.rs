use tracing::warn;

use crate::{
    command::{self, FireplaceCommand},
    error::{FireplaceError, PublishError},
    remote,
    topics::Topics,
    trigger::TriggerBus,
    types::{FireplaceSnapshot, Transition},
};

pub const MAX_PAYLOAD_BYTES: usize = 512;

/// Capability an entity exposes to a transport: a state view and a command sink.
pub trait TransportBindable {
    fn snapshot(&self) -> FireplaceSnapshot;
    fn execute(&mut self, command: FireplaceCommand) -> Result<Transition, FireplaceError>;
}

/// Outbound side of the pub/sub transport. Implementations must not block.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), PublishError>;
}

/// Adapter between an entity and its pub/sub command and status channels.
#[derive(Debug, Clone)]
pub struct TransportBinding {
    topics: Topics,
}

impl TransportBinding {
    pub fn new(topics: Topics) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Translates an inbound message into a command. Unrecognised messages are
    /// logged and dropped.
    pub fn parse_message(&self, topic: &str, payload: &[u8]) -> Option<FireplaceCommand> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            warn!(
                "dropping oversized payload on topic {topic} ({} bytes)",
                payload.len()
            );
            return None;
        }
        let Ok(message) = std::str::from_utf8(payload) else {
            warn!("dropping non utf8 payload on topic {topic}");
            return None;
        };
        let message = message.trim();
        let topics = &self.topics;

        let parsed = if topic == topics.command {
            FireplaceCommand::parse(message)
        } else if topic == topics.power_command {
            match message.to_ascii_uppercase().as_str() {
                "ON" => Some(FireplaceCommand::TurnOn { power: None }),
                "OFF" => Some(FireplaceCommand::TurnOff),
                "TOGGLE" => Some(FireplaceCommand::Toggle),
                _ => None,
            }
        } else if topic == topics.power_level_command {
            command::parse_level(message).map(FireplaceCommand::SetPower)
        } else if topic == topics.preset_command {
            Some(message)
                .filter(|name| !name.is_empty())
                .map(|name| FireplaceCommand::SetPreset(name.to_string()))
        } else if topic == topics.oscillation_command {
            command::parse_switch(message).map(FireplaceCommand::SetOscillating)
        } else if topic == topics.rf_raw {
            return self.parse_remote(message);
        } else {
            warn!("ignoring message on unbound topic {topic}");
            return None;
        };

        if parsed.is_none() {
            warn!("unrecognised command on {topic}: '{message}'");
        }
        parsed
    }

    fn parse_remote(&self, message: &str) -> Option<FireplaceCommand> {
        let Some(capture) = remote::parse_capture(message) else {
            warn!("malformed remote capture on {}", self.topics.rf_raw);
            return None;
        };
        match remote::decode(&capture) {
            Ok(code) => Some(code.command()),
            Err(err) => {
                warn!("remote capture not decoded: {err}");
                None
            }
        }
    }

    /// Applies a command, fires its triggers and publishes the new state.
    pub fn dispatch<E>(
        &self,
        entity: &mut E,
        bus: &TriggerBus,
        publisher: &mut dyn Publisher,
        command: FireplaceCommand,
    ) -> Result<Transition, FireplaceError>
    where
        E: TransportBindable + ?Sized,
    {
        let transition = entity.execute(command)?;
        bus.fire_all(&transition.triggers);
        if transition.changed {
            self.publish_state(&entity.snapshot(), publisher);
        }
        Ok(transition)
    }

    /// Inbound message path: parse, then dispatch. Failures are logged only.
    pub fn handle_message<E>(
        &self,
        entity: &mut E,
        bus: &TriggerBus,
        publisher: &mut dyn Publisher,
        topic: &str,
        payload: &[u8],
    ) -> Option<Transition>
    where
        E: TransportBindable + ?Sized,
    {
        let command = self.parse_message(topic, payload)?;
        let name = command.name();
        match self.dispatch(entity, bus, publisher, command) {
            Ok(transition) => Some(transition),
            Err(err) => {
                warn!("{name} from {topic} rejected: {err}");
                None
            }
        }
    }

    /// Best effort: each failed publish is logged and the rest still go out.
    /// Returns the number of failed publishes.
    pub fn publish_state(&self, snapshot: &FireplaceSnapshot, publisher: &mut dyn Publisher) -> usize {
        let topics = &self.topics;
        let mut messages: Vec<(&str, Vec<u8>)> = Vec::with_capacity(5);

        match serde_json::to_vec(snapshot) {
            Ok(body) => messages.push((topics.state.as_str(), body)),
            Err(err) => warn!("fireplace state serialization failed: {err}"),
        }
        messages.push((topics.power_state.as_str(), snapshot.state_str().into()));
        messages.push((
            topics.power_level_state.as_str(),
            snapshot.power_level.to_string().into_bytes(),
        ));
        messages.push((
            topics.preset_state.as_str(),
            snapshot.active_preset.clone().unwrap_or_default().into_bytes(),
        ));
        let oscillation = if snapshot.oscillating {
            "oscillate_on"
        } else {
            "oscillate_off"
        };
        messages.push((topics.oscillation_state.as_str(), oscillation.into()));

        let mut failures = 0;
        for (topic, payload) in messages {
            if let Err(err) = publisher.publish(topic, payload, true) {
                failures += 1;
                warn!("fireplace state publish failed: {err}");
            }
        }
        failures
    }
}
