use rumqttc::{AsyncClient, QoS};
use tracing::info;

use fireplace_common::{
    AutomationAction, AutomationConfig, FireplaceSnapshot, ListenerError, TriggerBus,
    TriggerEvent, TriggerListener,
};

/// Registers the configured automations on a fresh bus, in config order.
pub fn build_trigger_bus(automations: &[AutomationConfig], mqtt: &AsyncClient) -> TriggerBus {
    let mut bus = TriggerBus::new();
    for automation in automations {
        let listener = AutomationListener {
            action: automation.action.clone(),
            mqtt: mqtt.clone(),
        };
        bus.register(automation.on, listener);
    }
    bus
}

struct AutomationListener {
    action: AutomationAction,
    mqtt: AsyncClient,
}

impl TriggerListener for AutomationListener {
    fn on_trigger(&self, event: &TriggerEvent) -> Result<(), ListenerError> {
        match &self.action {
            AutomationAction::Log { message } => {
                info!(
                    "automation {}: {}",
                    event.kind.as_str(),
                    render(message, &event.snapshot)
                );
                Ok(())
            }
            AutomationAction::Publish {
                topic,
                payload,
                retain,
            } => {
                let body = render(payload, &event.snapshot);
                self.mqtt
                    .try_publish(topic.as_str(), QoS::AtLeastOnce, *retain, body)?;
                Ok(())
            }
        }
    }
}

/// Substitutes `{id}`, `{state}`, `{power_level}`, `{oscillating}` and
/// `{preset}` with values from the snapshot.
pub fn render(template: &str, snapshot: &FireplaceSnapshot) -> String {
    template
        .replace("{id}", &snapshot.id)
        .replace("{state}", snapshot.state_str())
        .replace("{power_level}", &snapshot.power_level.to_string())
        .replace("{oscillating}", if snapshot.oscillating { "true" } else { "false" })
        .replace("{preset}", snapshot.active_preset.as_deref().unwrap_or(""))
}
