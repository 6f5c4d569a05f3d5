use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, watch},
    time::MissedTickBehavior,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fireplace_common::{
    command, Component, CycleDirection, FireplaceCommand, FireplaceEntity, FireplaceError,
    FireplaceSnapshot, PublishError, Publisher, RuntimeConfig, StateStore, Topics,
    TransportBinding, TriggerBus, PAYLOAD_OFFLINE, PAYLOAD_ONLINE,
};

use crate::{automations, store::AppStore};

const REQUEST_QUEUE_DEPTH: usize = 32;
const TICK_INTERVAL: Duration = Duration::from_secs(1);

type CommandReply = oneshot::Sender<Result<FireplaceSnapshot, FireplaceError>>;

/// Work handed to the entity task. Everything that touches the entity goes
/// through here so mutations stay serialized.
enum EntityRequest {
    Message { topic: String, payload: Vec<u8> },
    Command {
        command: FireplaceCommand,
        reply: CommandReply,
    },
    Shutdown,
}

#[derive(Clone)]
struct AppState {
    requests: mpsc::Sender<EntityRequest>,
    status: watch::Receiver<FireplaceSnapshot>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload)
            .map_err(|err| PublishError {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }
}

struct EntityRuntime {
    entity: FireplaceEntity,
    store: Box<dyn StateStore + Send>,
    bus: TriggerBus,
    binding: TransportBinding,
    publisher: Box<dyn Publisher + Send>,
    status: watch::Sender<FireplaceSnapshot>,
}

impl EntityRuntime {
    async fn run(mut self, mut requests: mpsc::Receiver<EntityRequest>) -> Self {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.entity.tick(monotonic_ms(), self.store.as_mut());
                }
                request = requests.recv() => match request {
                    Some(EntityRequest::Shutdown) | None => break,
                    Some(request) => self.handle(request),
                },
            }
        }

        self.entity.shutdown(self.store.as_mut());
        self
    }

    fn handle(&mut self, request: EntityRequest) {
        match request {
            EntityRequest::Message { topic, payload } => {
                self.binding.handle_message(
                    &mut self.entity,
                    &self.bus,
                    self.publisher.as_mut(),
                    &topic,
                    &payload,
                );
            }
            EntityRequest::Command { command, reply } => {
                let name = command.name();
                let result = self
                    .binding
                    .dispatch(&mut self.entity, &self.bus, self.publisher.as_mut(), command)
                    .map(|_| self.entity.snapshot());
                if let Err(err) = &result {
                    warn!("{name} from http rejected: {err}");
                }
                // The caller may have gone away; the command still applied.
                let _ = reply.send(result);
            }
            EntityRequest::Shutdown => {}
        }
        self.status.send_replace(self.entity.snapshot());
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.network.sanitize();

    let mut entity =
        FireplaceEntity::new(&runtime.fireplace).context("invalid fireplace configuration")?;
    let mut state_store = store.state_store();
    entity.setup(&mut state_store);
    entity.dump_config();

    let topics = Topics::new(&runtime.network.topic_prefix, &runtime.topics);
    let network = &runtime.network;
    let mut mqtt_options = MqttOptions::new(
        network.client_id.clone(),
        network.mqtt_host.clone(),
        network.mqtt_port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_last_will(LastWill::new(
        topics.availability.clone(),
        PAYLOAD_OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user.clone(), network.mqtt_pass.clone());
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let bus = automations::build_trigger_bus(&runtime.automations, &mqtt);
    let binding = TransportBinding::new(topics.clone());
    let mut publisher = MqttPublisher {
        client: mqtt.clone(),
    };
    binding.publish_state(&entity.snapshot(), &mut publisher);

    let (status_tx, status_rx) = watch::channel(entity.snapshot());
    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);

    let entity_runtime = EntityRuntime {
        entity,
        store: Box::new(state_store),
        bus,
        binding,
        publisher: Box::new(publisher),
        status: status_tx,
    };
    let entity_task = tokio::spawn(entity_runtime.run(requests_rx));
    spawn_mqtt_loop(eventloop, mqtt.clone(), topics.clone(), requests_tx.clone());

    let app_state = AppState {
        requests: requests_tx.clone(),
        status: status_rx,
    };
    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind fireplace server at {addr}"))?;

    info!("fireplace controller listening on http://{addr}");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(err) = &served {
        warn!("http server stopped with error: {err}");
    }

    info!("shutting down, flushing fireplace state");
    stop_entity(&requests_tx, entity_task).await?;

    if let Err(err) = mqtt
        .publish(topics.availability.as_str(), QoS::AtLeastOnce, true, PAYLOAD_OFFLINE)
        .await
    {
        warn!("offline announcement failed: {err}");
    }
    if let Err(err) = mqtt.disconnect().await {
        warn!("mqtt disconnect failed: {err}");
    }
    served.context("http server failed")?;
    Ok(())
}

/// Asks the entity task to flush and exit, then waits for it.
async fn stop_entity(
    requests: &mpsc::Sender<EntityRequest>,
    entity_task: tokio::task::JoinHandle<EntityRuntime>,
) -> anyhow::Result<EntityRuntime> {
    if requests.send(EntityRequest::Shutdown).await.is_err() {
        warn!("entity task already stopped");
    }
    entity_task.await.context("entity task failed")
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    let network = &mut runtime.network;
    if let Ok(host) = std::env::var("MQTT_HOST") {
        network.mqtt_host = host;
    }
    if let Some(port) = env_u16("MQTT_PORT") {
        network.mqtt_port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Ok(pass) = std::env::var("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
    if let Some(port) = env_u16("FIREPLACE_HTTP_PORT") {
        runtime.http_port = port;
    }
}

fn env_u16(name: &str) -> Option<u16> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/on", post(handle_turn_on))
        .route("/api/off", post(handle_turn_off))
        .route("/api/toggle", post(handle_toggle))
        .route("/api/power", post(handle_set_power))
        .route("/api/preset", post(handle_set_preset))
        .route("/api/oscillation", post(handle_set_oscillation))
        .route("/api/cycle", post(handle_cycle_speed))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Subscriptions and the online announcement are repeated on every connect;
/// the broker session is not assumed to survive a reconnect.
fn announce(mqtt: &AsyncClient, topics: &Topics) {
    for topic in topics.subscriptions() {
        if let Err(err) = mqtt.try_subscribe(topic, QoS::AtMostOnce) {
            warn!("mqtt subscribe to {topic} failed: {err}");
        }
    }
    if let Err(err) = mqtt.try_publish(
        topics.availability.as_str(),
        QoS::AtLeastOnce,
        true,
        PAYLOAD_ONLINE,
    ) {
        warn!("online announcement failed: {err}");
    }
}

fn spawn_mqtt_loop(
    mut eventloop: rumqttc::EventLoop,
    mqtt: AsyncClient,
    topics: Topics,
    requests: mpsc::Sender<EntityRequest>,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let request = EntityRequest::Message {
                        topic: message.topic,
                        payload: message.payload.to_vec(),
                    };
                    if requests.send(request).await.is_err() {
                        info!("entity task stopped, leaving mqtt loop");
                        break;
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    announce(&mqtt, &topics);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.status.borrow().clone();
    Json(snapshot)
}

async fn handle_turn_on(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let power = match params.get("power") {
        None => None,
        Some(value) => match command::parse_level(value) {
            Some(level) => Some(level),
            None => return error_response(StatusCode::BAD_REQUEST, "Invalid 'power' value"),
        },
    };
    submit(&state, FireplaceCommand::TurnOn { power }).await
}

async fn handle_turn_off(State(state): State<AppState>) -> Response {
    submit(&state, FireplaceCommand::TurnOff).await
}

async fn handle_toggle(State(state): State<AppState>) -> Response {
    submit(&state, FireplaceCommand::Toggle).await
}

async fn handle_set_power(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(level) = command::parse_level(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid power level");
    };
    submit(&state, FireplaceCommand::SetPower(level)).await
}

async fn handle_set_preset(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(name) = params
        .get("value")
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    submit(&state, FireplaceCommand::SetPreset(name.to_string())).await
}

async fn handle_set_oscillation(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(oscillating) = command::parse_switch(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid oscillation value. Use 'on' or 'off'");
    };
    submit(&state, FireplaceCommand::SetOscillating(oscillating)).await
}

async fn handle_cycle_speed(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let direction = match params.get("direction") {
        None => CycleDirection::default(),
        Some(value) => match command::parse_direction(value) {
            Some(direction) => direction,
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Invalid direction. Use 'up' or 'down'",
                )
            }
        },
    };
    submit(&state, FireplaceCommand::CycleSpeed(direction)).await
}

async fn submit(state: &AppState, command: FireplaceCommand) -> Response {
    let (reply, response) = oneshot::channel();
    let request = EntityRequest::Command { command, reply };
    if state.requests.send(request).await.is_err() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Fireplace is not running");
    }

    match response.await {
        Ok(Ok(snapshot)) => Json(snapshot).into_response(),
        Ok(Err(err)) => error_response(error_status(&err), &err.to_string()),
        Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "Fireplace is not running"),
    }
}

fn error_status(err: &FireplaceError) -> StatusCode {
    match err {
        FireplaceError::UnknownPreset(_) => StatusCode::NOT_FOUND,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
