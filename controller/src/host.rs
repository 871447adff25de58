use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use chrono::Local;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    io::AsyncWriteExt,
    net::TcpListener,
    sync::{watch, Mutex},
    time::MissedTickBehavior,
};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use vivarium_common::{
    ControlConfig, ControlDecision, CycleEngine, FaultSummary, HabitatConfig, RelayState,
    SensorSample, TelemetryRecord, Transition, TOPIC_CONTROLLER_AVAILABILITY,
    TOPIC_CONTROLLER_STATE,
};

use crate::{
    relays::{apply_commands, LoggingRelays},
    sensors::{SensorReader, SimulatedBus},
    store::ConfigStore,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<CycleEngine>>,
    config: Arc<Mutex<HabitatConfig>>,
    last_sample: Arc<Mutex<Option<SensorSample>>>,
    store: ConfigStore,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    relays: RelayState,
    last_decision: Option<ControlDecision>,
    faults: FaultSummary,
    telemetry: Option<TelemetryRecord>,
    next_transition: Transition,
    config: HabitatConfig,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let config = store.load().await.context("failed to load configuration")?;
    config
        .validate()
        .context("refusing to start with invalid configuration")?;

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(config.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.network.mqtt_port);

    let mut mqtt_options = MqttOptions::new("vivarium-controller", mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(config.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(config.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);
    spawn_mqtt_loop(eventloop);

    if let Err(err) = mqtt
        .publish(TOPIC_CONTROLLER_AVAILABILITY, QoS::AtLeastOnce, true, "online")
        .await
    {
        warn!("availability publish failed: {err}");
    }

    let state = AppState {
        engine: Arc::new(Mutex::new(CycleEngine::new())),
        config: Arc::new(Mutex::new(config.clone())),
        last_sample: Arc::new(Mutex::new(None)),
        store,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control = tokio::spawn(control_loop(state.clone(), mqtt.clone(), shutdown_rx));

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/config", get(handle_get_config).put(handle_put_config))
        .fallback_service(ServeDir::new(web_root))
        .with_state(state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.network.http_port);
    let addr: SocketAddr = format!("0.0.0.0:{port}")
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the control loop; it drives the relays to the safe state on the
    // way out.
    let _ = shutdown_tx.send(true);
    control.await.context("control loop task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
    }
}

fn spawn_mqtt_loop(mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
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

/// The single control loop. One cycle runs to completion before the next
/// begins; configuration reloads land only between cycles, so a hysteresis
/// decision never straddles two setpoints.
async fn control_loop(state: AppState, mqtt: AsyncClient, mut shutdown: watch::Receiver<bool>) {
    let initial = { state.config.lock().await.clone() };
    let mut reader = SensorReader::new(SimulatedBus::new());
    let mut driver = LoggingRelays::new(&initial.hardware);
    let mut readings = ReadingsLog::new();

    let mut period = Duration::from_secs(initial.control.cycle_period_s);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("control loop started, cycle period {period:?}");

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        // Snapshot the config at the cycle boundary.
        let config = { state.config.lock().await.clone() };
        let configured_period = Duration::from_secs(config.control.cycle_period_s);
        if configured_period != period {
            period = configured_period;
            ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("cycle period changed to {period:?}");
        }

        let started = Instant::now();
        let sample = reader.read_all(&config.control).await;
        let now = Local::now().time();

        let (decision, commands) = {
            let mut engine = state.engine.lock().await;
            engine.run_cycle(now, &sample, &config)
        };
        apply_commands(&mut driver, &commands);

        if decision.degraded {
            warn!("sensor fault ceiling reached, heat forced off");
        }

        let record = TelemetryRecord::from_cycle(&sample, &decision);
        publish_telemetry(&mqtt, &record).await;
        readings.maybe_append(&record, &config.control).await;
        *state.last_sample.lock().await = Some(sample);

        let elapsed = started.elapsed();
        if elapsed > period {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = period.as_millis() as u64,
                "control cycle overran its period"
            );
        }
    }

    let commands = {
        let mut engine = state.engine.lock().await;
        engine.shutdown_commands()
    };
    apply_commands(&mut driver, &commands);
    info!("relays driven to safe state");

    if let Err(err) = mqtt
        .publish(TOPIC_CONTROLLER_AVAILABILITY, QoS::AtLeastOnce, true, "offline")
        .await
    {
        warn!("availability publish failed: {err}");
    }
}

/// Telemetry is fire-and-forget: a sink failure never blocks or cancels
/// the control cycle.
async fn publish_telemetry(mqtt: &AsyncClient, record: &TelemetryRecord) {
    match serde_json::to_vec(record) {
        Ok(body) => {
            if let Err(err) = mqtt
                .publish(TOPIC_CONTROLLER_STATE, QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("telemetry publish failed: {err}");
            }
        }
        Err(err) => warn!("telemetry serialization failed: {err}"),
    }
}

/// Append-only CSV readings log, throttled to the configured interval.
/// The historical store proper (rotation, charts) is a downstream consumer.
struct ReadingsLog {
    path: PathBuf,
    last_write: Option<Instant>,
}

impl ReadingsLog {
    fn new() -> Self {
        let path = std::env::var("VIVARIUM_READINGS_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./vivarium-readings.csv"));
        Self {
            path,
            last_write: None,
        }
    }

    async fn maybe_append(&mut self, record: &TelemetryRecord, control: &ControlConfig) {
        let interval = Duration::from_secs(control.readings_log_interval_s);
        if self
            .last_write
            .is_some_and(|last| last.elapsed() < interval)
        {
            return;
        }

        let line = format!("{}\n", record.csv_line());
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        match result {
            Ok(()) => self.last_write = Some(Instant::now()),
            Err(err) => warn!("readings log write failed: {err}"),
        }
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.lock().await.clone();
    let engine = state.engine.lock().await;
    let sample = state.last_sample.lock().await;

    let telemetry = match (&*sample, engine.last_decision()) {
        (Some(sample), Some(decision)) => Some(TelemetryRecord::from_cycle(sample, &decision)),
        _ => None,
    };

    Json(StatusView {
        relays: engine.relay_state(),
        last_decision: engine.last_decision(),
        faults: engine.fault_summary(),
        telemetry,
        next_transition: config.lights.next_transition(Local::now().time()),
        config,
    })
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.config.lock().await.clone();
    Json(config)
}

async fn handle_put_config(
    State(state): State<AppState>,
    Json(config): Json<HabitatConfig>,
) -> impl IntoResponse {
    if let Err(err) = config.validate() {
        return error_response(StatusCode::BAD_REQUEST, &err.to_string());
    }

    if let Err(err) = state.store.save(&config).await {
        warn!("failed to persist config update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist configuration",
        );
    }

    {
        // The running loop snapshots this at the next cycle boundary.
        let mut active = state.config.lock().await;
        *active = config.clone();
    }

    Json(config).into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
