// ── Hub ──
//
// Full lifecycle for one signed-in session against the backend.
// Handles authentication, the parallel refresh, realtime reconciliation,
// command routing, and reactive data streaming through the DataStore.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use homeboard_api::store::functions::{DEVICE_COMMAND, DeviceCommandRequest, DeviceCommandResponse};
use homeboard_api::store::rows::{
    ActivityLogRow, DeviceRow, DeviceStatusPatch, EnergyUsageRow, NewActivityLog, NewPlatform,
    PlatformRow,
};
use homeboard_api::store::tables;
use homeboard_api::vendor::smartthings::VendorCommand;
use homeboard_api::{
    ChangeEvent, ChangeFilter, ChangeKind, Order, Query, RealtimeHandle, ReconnectConfig,
    StoreClient, TlsMode, TransportConfig, token_source,
};

use crate::command::{Command, CommandEnvelope, CommandResult, ConnectPlatformRequest, PtzDirection};
use crate::config::{AuthCredentials, CommandDispatch, DisconnectScope, HubConfig, TlsVerification};
use crate::error::CoreError;
use crate::model::{
    ActivityLog, Device, EnergySample, Notice, Platform, PlatformCredentials, PlatformKind,
    PowerState, actions,
};
use crate::store::DataStore;
use crate::stream::EntityStream;
use crate::sync::{self, SyncContext, smartthings};

const COMMAND_CHANNEL_SIZE: usize = 64;
const NOTICE_CHANNEL_SIZE: usize = 256;

const DEVICE_SELECT: &str = "*,smart_home_platforms(platform_name)";
const LOG_SELECT: &str = "*,smart_home_devices(device_name)";

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Hub ──────────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<HubInner>`. Owns the mirror, the realtime
/// subscription, and the command processor.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    client: StoreClient,
    transport: TransportConfig,
    store: Arc<DataStore>,
    connection_state: watch::Sender<ConnectionState>,
    notice_tx: broadcast::Sender<Notice>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    realtime: Mutex<Option<RealtimeHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    in_flight: DashMap<Uuid, ()>,
}

impl Hub {
    /// Create a hub from configuration. Does NOT connect: call
    /// [`connect()`](Self::connect) to sign in and start background tasks.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = StoreClient::new(config.url.as_str(), &config.anon_key, &transport)?;
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(HubInner {
                config,
                client,
                transport,
                store: Arc::new(DataStore::new()),
                connection_state,
                notice_tx,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                realtime: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                in_flight: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Access the backend client.
    pub fn client(&self) -> &StoreClient {
        &self.inner.client
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Sign in, load the mirror, and start the command processor and
    /// (when enabled) the realtime subscription.
    ///
    /// Calling this again while connected replaces the realtime
    /// subscription and reloads the mirror.
    pub async fn connect(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        if let Err(e) = self.establish().await {
            self.inner.connection_state.send_replace(ConnectionState::Failed);
            return Err(e);
        }

        self.inner.connection_state.send_replace(ConnectionState::Connected);
        info!(url = %self.inner.config.url, "connected to backend");
        Ok(())
    }

    async fn establish(&self) -> Result<(), CoreError> {
        let client = &self.inner.client;
        let session = match &self.inner.config.auth {
            AuthCredentials::Password { email, password } => {
                client.sign_in_with_password(email, password).await?
            }
            AuthCredentials::AccessToken(token) => client.sign_in_with_token(token).await?,
        };
        debug!(user_id = %session.user_id, "signed in");

        self.refresh_inner().await?;

        let mut handles = self.inner.task_handles.lock().await;
        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            handles.push(tokio::spawn(command_processor_task(self.clone(), rx)));
        }

        if self.inner.config.realtime_enabled {
            let mut slot = self.inner.realtime.lock().await;
            if let Some(previous) = slot.take() {
                debug!("replacing realtime subscription");
                previous.shutdown();
            }
            let filter = format!("user_id=eq.{}", session.user_id);
            let weak = Arc::downgrade(&self.inner);
            let token = token_source(move || {
                let weak = weak.clone();
                async move {
                    let inner = weak.upgrade()?;
                    match inner.client.current_access_token().await {
                        Ok(token) => Some(token),
                        Err(e) => {
                            warn!(error = %e, "no usable token for realtime");
                            None
                        }
                    }
                }
            });
            let handle = RealtimeHandle::connect(
                client.realtime_url()?,
                token,
                vec![
                    ChangeFilter::new(tables::DEVICES, ChangeKind::Update)
                        .with_filter(filter.clone()),
                    ChangeFilter::new(tables::ACTIVITY_LOGS, ChangeKind::Insert)
                        .with_filter(filter),
                ],
                ReconnectConfig::default(),
                self.inner.cancel.clone(),
            )?;
            handles.push(tokio::spawn(realtime_bridge_task(
                self.clone(),
                handle.subscribe(),
                handle.joins(),
                self.inner.cancel.clone(),
            )));
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Stop background tasks, drop the realtime subscription, and sign out.
    ///
    /// A disconnected hub stays disconnected; build a new one to reconnect.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        if let Some(handle) = self.inner.realtime.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        if matches!(self.inner.config.auth, AuthCredentials::Password { .. }) {
            if let Err(e) = self.inner.client.sign_out().await {
                warn!(error = %e, "sign-out failed (non-fatal)");
            }
        } else {
            self.inner.client.clear_session();
        }

        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!("disconnected");
    }

    /// Reload every slice of the mirror and emit one notice.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = self.refresh_inner().await;
        match &result {
            Ok(()) => self.notify(Notice::success(
                "Refresh",
                format!(
                    "Loaded {} platform(s) and {} device(s)",
                    self.inner.store.platform_count(),
                    self.inner.store.device_count()
                ),
            )),
            Err(e) => self.notify(Notice::error("Refresh", e.to_string())),
        }
        result
    }

    /// Fetch platforms, devices, recent logs, and recent energy samples
    /// in parallel. Each slice that loaded is applied even when another
    /// failed; the first failure is returned.
    async fn refresh_inner(&self) -> Result<(), CoreError> {
        let client = &self.inner.client;
        let user_id = client.user_id()?;
        let owned = || Query::new().eq("user_id", user_id);
        let platform_query = owned().order("created_at", Order::Desc);
        let device_query = owned().select(DEVICE_SELECT);
        let energy_query = owned()
            .order("recorded_at", Order::Desc)
            .limit(self.inner.config.energy_sample_limit);

        let (platforms, devices, logs, energy) = tokio::join!(
            client.select::<PlatformRow>(tables::PLATFORMS, &platform_query),
            client.select::<DeviceRow>(tables::DEVICES, &device_query),
            self.fetch_logs(),
            client.select::<EnergyUsageRow>(tables::ENERGY_USAGE, &energy_query),
        );

        let store = &self.inner.store;
        let mut first_error: Option<CoreError> = None;

        match platforms {
            Ok(rows) => store.apply_platforms(rows.into_iter().map(Platform::from).collect()),
            Err(e) => {
                warn!(error = %e, "platform fetch failed");
                first_error.get_or_insert(e.into());
            }
        }
        match devices {
            Ok(rows) => store.apply_devices(rows.into_iter().map(Device::from).collect()),
            Err(e) => {
                warn!(error = %e, "device fetch failed");
                first_error.get_or_insert(e.into());
            }
        }
        match logs {
            Ok(logs) => store.apply_activity_logs(logs),
            Err(e) => {
                warn!(error = %e, "activity log fetch failed");
                first_error.get_or_insert(e);
            }
        }
        match energy {
            Ok(rows) => {
                let mut samples: Vec<EnergySample> =
                    rows.into_iter().map(EnergySample::from).collect();
                samples.reverse();
                store.apply_energy(samples);
            }
            Err(e) => {
                warn!(error = %e, "energy fetch failed");
                first_error.get_or_insert(e.into());
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        store.mark_refreshed();
        debug!(
            platforms = store.platform_count(),
            devices = store.device_count(),
            "data refresh complete"
        );
        Ok(())
    }

    async fn fetch_logs(&self) -> Result<Vec<ActivityLog>, CoreError> {
        let user_id = self.inner.client.user_id()?;
        let rows: Vec<ActivityLogRow> = self
            .inner
            .client
            .select(
                tables::ACTIVITY_LOGS,
                &Query::new()
                    .select(LOG_SELECT)
                    .eq("user_id", user_id)
                    .order("timestamp", Order::Desc)
                    .limit(self.inner.config.activity_log_limit),
            )
            .await?;
        Ok(rows.into_iter().map(ActivityLog::from).collect())
    }

    // ── Command execution ────────────────────────────────────────────

    /// Execute a command and emit exactly one notice for it.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let title = cmd.title();
        let result = self.dispatch(cmd).await;
        match &result {
            Ok(outcome) => self.notify(Notice::success(title, outcome.summary())),
            Err(e) => self.notify(Notice::error(title, e.to_string())),
        }
        result
    }

    async fn dispatch(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.connection_state.borrow() != ConnectionState::Connected {
            return Err(CoreError::Disconnected);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disconnected)?;

        rx.await.map_err(|_| CoreError::Disconnected)?
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: connect, run closure, disconnect.
    ///
    /// Disables the realtime subscription since a single
    /// request-response cycle never needs it.
    pub async fn oneshot<F, Fut, T>(config: HubConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Hub) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.realtime_enabled = false;

        let hub = Hub::new(cfg)?;
        hub.connect().await?;
        let result = f(hub.clone()).await;
        hub.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to user-facing notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notice_tx.subscribe()
    }

    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            debug!(title = %notice.title, message = %notice.message, "error notice");
        }
        let _ = self.inner.notice_tx.send(notice);
    }

    // ── Snapshot accessors (delegate to DataStore) ───────────────────

    pub fn platforms_snapshot(&self) -> Arc<Vec<Arc<Platform>>> {
        self.inner.store.platforms_snapshot()
    }

    pub fn devices_snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.store.devices_snapshot()
    }

    pub fn activity_logs_snapshot(&self) -> Arc<Vec<ActivityLog>> {
        self.inner.store.activity_logs_snapshot()
    }

    pub fn energy_snapshot(&self) -> Arc<Vec<EnergySample>> {
        self.inner.store.energy_snapshot()
    }

    // ── Stream accessors (delegate to DataStore) ─────────────────────

    pub fn platforms(&self) -> EntityStream<Platform> {
        self.inner.store.subscribe_platforms()
    }

    pub fn devices(&self) -> EntityStream<Device> {
        self.inner.store.subscribe_devices()
    }

    pub fn activity_logs(&self) -> watch::Receiver<Arc<Vec<ActivityLog>>> {
        self.inner.store.subscribe_activity_logs()
    }

    pub fn energy(&self) -> watch::Receiver<Arc<Vec<EnergySample>>> {
        self.inner.store.subscribe_energy()
    }

    // ── Realtime ─────────────────────────────────────────────────────

    async fn apply_change(&self, change: &ChangeEvent) {
        match (change.table.as_str(), change.kind) {
            (tables::DEVICES, ChangeKind::Update) => {
                let outcome = self.inner.store.merge_device_update(&change.record);
                debug!(?outcome, "device change merged");
            }
            (tables::ACTIVITY_LOGS, ChangeKind::Insert) => match self.fetch_logs().await {
                Ok(logs) => self.inner.store.apply_activity_logs(logs),
                Err(e) => warn!(error = %e, "activity log refetch failed"),
            },
            (table, kind) => debug!(table, ?kind, "ignoring change"),
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Pull commands off the channel. Each command runs in its own task so
/// different devices can be mutated concurrently.
async fn command_processor_task(hub: Hub, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = hub.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let hub = hub.clone();
                tokio::spawn(async move {
                    let result = route_command(&hub, envelope.command).await;
                    let _ = envelope.response_tx.send(result);
                });
            }
        }
    }
}

/// Route realtime row changes into the mirror.
///
/// The first join follows the initial load; every later one reloads the
/// mirror since changes made while the socket was down are not replayed.
async fn realtime_bridge_task(
    hub: Hub,
    mut rx: broadcast::Receiver<Arc<ChangeEvent>>,
    mut joins: watch::Receiver<u64>,
    cancel: CancellationToken,
) {
    let mut joins_open = true;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = joins.changed(), if joins_open => {
                if changed.is_err() {
                    joins_open = false;
                    continue;
                }
                let count = *joins.borrow_and_update();
                if count > 1 {
                    info!(joins = count, "realtime rejoined, reloading mirror");
                    if let Err(e) = hub.refresh_inner().await {
                        warn!(error = %e, "reload after rejoin failed");
                    }
                }
            }
            change = rx.recv() => match change {
                Ok(change) => hub.apply_change(&change).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime receiver lagged, reloading mirror");
                    if let Err(e) = hub.refresh_inner().await {
                        warn!(error = %e, "reload after lag failed");
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(hub: &Hub, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::Toggle { .. }
        | Command::SetBrightness { .. }
        | Command::SetColor { .. }
        | Command::SetThermostat { .. }
        | Command::SetLock { .. }
        | Command::Ptz { .. }
        | Command::NightVision { .. } => mutate_device(hub, &cmd, true).await,
        Command::TurnOffAllLights => turn_off_all_lights(hub).await,
        Command::ConnectPlatform(req) => connect_platform(hub, req).await,
        Command::DisconnectPlatform { name } => disconnect_platform(hub, &name).await,
        Command::CleanupDuplicates { name } => cleanup_duplicates(hub, &name).await,
        Command::SyncPlatform { platform_id } => sync_platform(hub, platform_id).await,
        Command::ClearAllPlatforms => clear_all_platforms(hub).await,
    }
}

// ── Device mutations ─────────────────────────────────────────────────

/// Marks a device as updating for as long as it lives.
struct InFlight<'a> {
    map: &'a DashMap<Uuid, ()>,
    id: Uuid,
}

impl<'a> InFlight<'a> {
    fn acquire(map: &'a DashMap<Uuid, ()>, device: &Device) -> Result<Self, CoreError> {
        match map.entry(device.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CoreError::DeviceBusy {
                identifier: device.name.clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self {
                    map,
                    id: device.id,
                })
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.id);
    }
}

/// What one device command changes.
struct DeviceChange {
    /// Dashboard `(command, value)` pairs for translated vendor dispatch.
    vendor: Vec<(&'static str, Value)>,
    /// Status keys for a direct row update.
    patch: Map<String, Value>,
    action: &'static str,
    description: String,
}

fn plan_change(device: &Device, cmd: &Command) -> Result<DeviceChange, CoreError> {
    let name = &device.name;
    let mut patch = Map::new();
    let change = match cmd {
        Command::Toggle { .. } => {
            if !device.category.is_switchable() {
                return Err(CoreError::validation(format!("{name} cannot be toggled")));
            }
            let next = device.power().unwrap_or(PowerState::Unknown).toggled();
            patch.insert("state".into(), next.as_wire().into());
            DeviceChange {
                vendor: vec![("switch", next.as_wire().into())],
                patch,
                action: actions::DEVICE_TOGGLE,
                description: format!("{name} turned {}", next.as_wire()),
            }
        }
        Command::SetBrightness { level, .. } => {
            if *level > 100 {
                return Err(CoreError::validation("brightness must be between 0 and 100"));
            }
            patch.insert("brightness".into(), (*level).into());
            DeviceChange {
                vendor: vec![("switchLevel", (*level).into())],
                patch,
                action: actions::BRIGHTNESS_CHANGE,
                description: format!("{name} brightness set to {level}%"),
            }
        }
        Command::SetColor { color, .. } => {
            let in_range = |v: f64| (0.0..=100.0).contains(&v);
            if !in_range(color.hue) || !in_range(color.saturation) {
                return Err(CoreError::validation(
                    "hue and saturation must be between 0 and 100",
                ));
            }
            patch.insert("hue".into(), color.hue.into());
            patch.insert("saturation".into(), color.saturation.into());
            DeviceChange {
                vendor: vec![(
                    "colorControl",
                    json!({ "hue": color.hue, "saturation": color.saturation }),
                )],
                patch,
                action: actions::COLOR_CHANGE,
                description: format!(
                    "{name} color set to hue {} saturation {}",
                    color.hue, color.saturation
                ),
            }
        }
        Command::SetThermostat { request, .. } => {
            let mut vendor = Vec::new();
            let mut parts = Vec::new();
            if let Some(setpoint) = request.setpoint {
                patch.insert("target_temperature".into(), setpoint.into());
                vendor.push(("thermostatSetpoint", setpoint.into()));
                parts.push(format!("setpoint {setpoint}°"));
            }
            if let Some(mode) = request.mode.as_deref() {
                patch.insert("mode".into(), mode.into());
                vendor.push(("thermostatMode", mode.into()));
                parts.push(format!("mode {mode}"));
            }
            if vendor.is_empty() {
                return Err(CoreError::validation(
                    "thermostat change needs a setpoint or a mode",
                ));
            }
            DeviceChange {
                vendor,
                patch,
                action: actions::THERMOSTAT_CHANGE,
                description: format!("{name} {}", parts.join(", ")),
            }
        }
        Command::SetLock { locked, .. } => {
            let state = if *locked { "locked" } else { "unlocked" };
            patch.insert("locked".into(), (*locked).into());
            patch.insert("state".into(), state.into());
            DeviceChange {
                vendor: vec![("lock", (*locked).into())],
                patch,
                action: actions::LOCK_CHANGE,
                description: format!("{name} {state}"),
            }
        }
        Command::Ptz { direction, .. } => {
            patch.insert("last_command".into(), direction.to_string().into());
            if *direction == PtzDirection::Home {
                patch.insert("preset".into(), "home".into());
            }
            DeviceChange {
                vendor: Vec::new(),
                patch,
                action: actions::PTZ_COMMAND,
                description: format!("{name} PTZ {direction}"),
            }
        }
        Command::NightVision { mode, .. } => {
            patch.insert("mode".into(), mode.to_string().into());
            DeviceChange {
                vendor: Vec::new(),
                patch,
                action: actions::NIGHT_VISION_CHANGE,
                description: format!("{name} night vision {mode}"),
            }
        }
        _ => return Err(CoreError::Internal(format!("{} is not a device command", cmd.title()))),
    };
    Ok(change)
}

async fn mutate_device(hub: &Hub, cmd: &Command, log: bool) -> Result<CommandResult, CoreError> {
    let store = &hub.inner.store;
    let device_id = cmd
        .device_id()
        .ok_or_else(|| CoreError::Internal("device command without a device".into()))?;
    let device = store
        .device_by_id(&device_id)
        .ok_or_else(|| CoreError::DeviceNotFound {
            identifier: device_id.to_string(),
        })?;
    let _guard = InFlight::acquire(&hub.inner.in_flight, &device)?;
    let change = plan_change(&device, cmd)?;

    let platform = device.platform_id.and_then(|id| store.platform_by_id(&id));
    let translated = platform
        .as_ref()
        .filter(|p| p.kind == PlatformKind::SmartThings);

    let confirmed = match translated {
        Some(_) if change.vendor.is_empty() => {
            return Err(CoreError::unsupported(
                cmd.title(),
                format!("{} does not support this command", PlatformKind::SmartThings.label()),
            ));
        }
        Some(platform) => match hub.inner.config.command_dispatch {
            CommandDispatch::Remote => remote_command(hub, &device, &change).await?,
            CommandDispatch::Local => local_command(hub, &device, platform, &change).await?,
        },
        None => {
            let status = merge_status(&device.status, &change.patch);
            persist_status(hub, &device, status).await?;
            true
        }
    };

    if log {
        write_log(
            hub,
            Some(device.id),
            change.action,
            json!({ "description": change.description, "device_name": device.name }),
        )
        .await;
    }

    let device = store
        .device_by_id(&device_id)
        .map_or_else(|| (*device).clone(), |d| (*d).clone());
    Ok(CommandResult::Device {
        device,
        status_confirmed: confirmed,
    })
}

/// Server-side handler dispatch. The mirror moves only when the handler
/// returns a status payload.
async fn remote_command(
    hub: &Hub,
    device: &Device,
    change: &DeviceChange,
) -> Result<bool, CoreError> {
    let mut fresh: Option<Value> = None;
    for (command, value) in &change.vendor {
        let resp: DeviceCommandResponse = hub
            .inner
            .client
            .invoke(
                DEVICE_COMMAND,
                &DeviceCommandRequest {
                    device_id: device.id,
                    command: (*command).to_owned(),
                    value: value.clone(),
                },
            )
            .await?;
        if let Some(message) = resp.error {
            return Err(CoreError::Function {
                name: DEVICE_COMMAND.into(),
                message,
            });
        }
        if resp.success == Some(false) {
            return Err(CoreError::Function {
                name: DEVICE_COMMAND.into(),
                message: format!("handler rejected '{command}'"),
            });
        }
        if resp.status.is_some() {
            fresh = resp.status;
        }
    }

    match fresh {
        Some(status) => {
            hub.inner.store.set_device_status(&device.id, status, None);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// In-process vendor dispatch with the platform's stored token.
async fn local_command(
    hub: &Hub,
    device: &Device,
    platform: &Platform,
    change: &DeviceChange,
) -> Result<bool, CoreError> {
    let commands = change
        .vendor
        .iter()
        .map(|(command, value)| {
            VendorCommand::translate(command, value).ok_or_else(|| {
                CoreError::validation(format!("cannot translate '{command}' for SmartThings"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let token = smartthings::platform_token(platform)?;
    let vendor = smartthings::vendor_client(&hub.inner.config, &hub.inner.transport, token)?;
    vendor
        .execute_commands(&device.external_id, &commands)
        .await?;
    let live = vendor.device_status(&device.external_id).await?;

    let fresh = smartthings::status_from_vendor(&live);
    let status = match fresh {
        Value::Object(map) => merge_status(&device.status, &map),
        _ => device.status.clone(),
    };
    persist_status(hub, device, status).await?;
    Ok(true)
}

/// PATCH the status column and adopt the row the backend hands back.
async fn persist_status(hub: &Hub, device: &Device, status: Value) -> Result<(), CoreError> {
    let user_id = hub.inner.client.user_id()?;
    let rows: Vec<DeviceRow> = hub
        .inner
        .client
        .update(
            tables::DEVICES,
            &Query::new().eq("id", device.id).eq("user_id", user_id),
            &DeviceStatusPatch {
                status,
                last_updated: Utc::now(),
            },
        )
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::DeviceNotFound {
            identifier: device.id.to_string(),
        })?;
    hub.inner
        .store
        .set_device_status(&device.id, row.status, row.last_updated);
    Ok(())
}

fn merge_status(base: &Value, patch: &Map<String, Value>) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

/// Toggle every lit light in turn. The count is toggles issued, whether
/// or not each one succeeded; nothing is rolled back.
async fn turn_off_all_lights(hub: &Hub) -> Result<CommandResult, CoreError> {
    let lit: Vec<Uuid> = hub
        .inner
        .store
        .devices_snapshot()
        .iter()
        .filter(|d| d.is_lit_light())
        .map(|d| d.id)
        .collect();

    let mut count = 0;
    for device_id in lit {
        count += 1;
        if let Err(e) = mutate_device(hub, &Command::Toggle { device_id }, false).await {
            warn!(error = %e, %device_id, "toggle during all-lights-off failed");
        }
    }

    write_log(
        hub,
        None,
        actions::ALL_LIGHTS_OFF,
        json!({ "count": count, "description": format!("Turned off {count} light(s)") }),
    )
    .await;
    Ok(CommandResult::LightsOff { count })
}

// ── Platform commands ────────────────────────────────────────────────

async fn connect_platform(
    hub: &Hub,
    req: ConnectPlatformRequest,
) -> Result<CommandResult, CoreError> {
    let ConnectPlatformRequest {
        name,
        kind,
        credentials,
    } = req;
    PlatformCredentials::decode(&kind, &credentials)?;
    let name = name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| kind.label().to_owned());

    let client = &hub.inner.client;
    let rows: Vec<PlatformRow> = client
        .insert(
            tables::PLATFORMS,
            &[NewPlatform {
                user_id: client.user_id()?,
                platform_name: name,
                platform_type: kind.as_str().to_owned(),
                credentials,
                is_connected: true,
            }],
        )
        .await?;
    let platform = rows
        .into_iter()
        .next()
        .map(Platform::from)
        .ok_or_else(|| CoreError::Internal("platform insert returned no row".into()))?;

    hub.inner.store.upsert_platform(platform.clone());
    write_log(
        hub,
        None,
        actions::PLATFORM_CONNECTED,
        json!({
            "description": format!("Connected {}", platform.name),
            "platform": platform.name,
            "platform_type": platform.kind.as_str(),
        }),
    )
    .await;
    info!(platform = %platform.name, kind = %platform.kind, "platform connected");
    Ok(CommandResult::Platform(platform))
}

async fn disconnect_platform(hub: &Hub, name: &str) -> Result<CommandResult, CoreError> {
    let client = &hub.inner.client;
    let user_id = client.user_id()?;
    let named = || {
        Query::new()
            .eq("user_id", user_id)
            .eq("platform_name", name)
    };

    let rows: Vec<PlatformRow> = client.select(tables::PLATFORMS, &named()).await?;
    if rows.is_empty() {
        return Err(CoreError::PlatformNotFound { name: name.into() });
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let platforms = client
        .delete::<Value>(tables::PLATFORMS, &named())
        .await?
        .len();

    let device_query = match hub.inner.config.disconnect_scope {
        DisconnectScope::AllDevices => Query::new().eq("user_id", user_id),
        DisconnectScope::PlatformOnly => Query::new()
            .eq("user_id", user_id)
            .in_list("platform_id", &ids),
    };
    let devices = client
        .delete::<Value>(tables::DEVICES, &device_query)
        .await?
        .len();

    write_log(
        hub,
        None,
        actions::PLATFORM_DISCONNECTED,
        json!({
            "description": format!("Disconnected {name}"),
            "platform": name,
            "devices_removed": devices,
        }),
    )
    .await;

    hub.inner.store.clear_devices();
    hub.refresh_inner().await?;
    info!(platform = name, platforms, devices, "platform disconnected");
    Ok(CommandResult::Disconnected { platforms, devices })
}

/// Keep the newest row named `name`, delete the rest one by one.
async fn cleanup_duplicates(hub: &Hub, name: &str) -> Result<CommandResult, CoreError> {
    let client = &hub.inner.client;
    let user_id = client.user_id()?;
    let rows: Vec<PlatformRow> = client
        .select(
            tables::PLATFORMS,
            &Query::new()
                .eq("user_id", user_id)
                .eq("platform_name", name)
                .order("created_at", Order::Desc),
        )
        .await?;

    let kept = rows.first().map(|r| r.id);
    if rows.len() <= 1 {
        return Ok(CommandResult::Cleanup { kept, removed: 0 });
    }

    let mut removed = 0;
    for row in &rows[1..] {
        let _: Vec<Value> = client
            .delete(
                tables::PLATFORMS,
                &Query::new().eq("id", row.id).eq("user_id", user_id),
            )
            .await?;
        removed += 1;
    }

    hub.refresh_inner().await?;
    info!(platform = name, removed, "duplicate platforms removed");
    Ok(CommandResult::Cleanup { kept, removed })
}

async fn sync_platform(hub: &Hub, platform_id: Uuid) -> Result<CommandResult, CoreError> {
    let client = &hub.inner.client;
    let user_id = client.user_id()?;

    let platform = match hub.inner.store.platform_by_id(&platform_id) {
        Some(p) => (*p).clone(),
        None => client
            .select::<PlatformRow>(
                tables::PLATFORMS,
                &Query::new().eq("id", platform_id).eq("user_id", user_id),
            )
            .await?
            .into_iter()
            .next()
            .map(Platform::from)
            .ok_or_else(|| CoreError::PlatformNotFound {
                name: platform_id.to_string(),
            })?,
    };

    let ctx = SyncContext {
        store: client,
        user_id,
        transport: &hub.inner.transport,
        config: &hub.inner.config,
    };
    let report = sync::run(&ctx, &platform).await?;
    hub.refresh_inner().await?;
    Ok(CommandResult::Synced(report))
}

async fn clear_all_platforms(hub: &Hub) -> Result<CommandResult, CoreError> {
    let client = &hub.inner.client;
    let owned = Query::new().eq("user_id", client.user_id()?);

    let devices = client
        .delete::<Value>(tables::DEVICES, &owned)
        .await?
        .len();
    let platforms = client
        .delete::<Value>(tables::PLATFORMS, &owned)
        .await?
        .len();

    hub.inner.store.clear();
    hub.refresh_inner().await?;
    info!(platforms, devices, "all platforms cleared");
    Ok(CommandResult::Cleared { platforms, devices })
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Append one activity log. A failed write is logged, never surfaced.
async fn write_log(hub: &Hub, device_id: Option<Uuid>, action: &str, details: Value) {
    let client = &hub.inner.client;
    let user_id = match client.user_id() {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, action, "cannot write activity log");
            return;
        }
    };
    let row = NewActivityLog {
        user_id,
        device_id,
        action: action.to_owned(),
        details,
    };
    if let Err(e) = client
        .insert::<Value, _>(tables::ACTIVITY_LOGS, &[row])
        .await
    {
        warn!(error = %e, action, "activity log write failed");
    }
}

/// Build a [`TransportConfig`] from the hub configuration.
fn build_transport(config: &HubConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
