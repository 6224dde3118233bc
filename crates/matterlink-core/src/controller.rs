//! Controller: drives one bridge-server session and keeps the device
//! registry in sync with it.
//!
//! Mutations go upstream first and the registry is refreshed from a full
//! node listing afterwards, so the cache never claims a state change the
//! bridge did not confirm. Commissioning runs as a background job because
//! pairing regularly outlives any sane request timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use matterlink_api::{NodeData, RpcClient, RpcClientConfig, commands};

use crate::command::DeviceCommand;
use crate::config::ControllerConfig;
use crate::convert::device_from_node;
use crate::error::CoreError;
use crate::model::Device;
use crate::store::DeviceStore;

/// Per-attempt receive window for the session's reader task.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Finished commissioning jobs kept for status polling; older terminal
/// jobs are evicted so the table stays bounded over process lifetime.
const MAX_FINISHED_JOBS: usize = 32;

// ── Connection state ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── Commissioning jobs ───────────────────────────────────────────────

/// Lifecycle of one commissioning attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed { error: String },
}

/// A tracked commissioning attempt. Snapshots of this record are what
/// callers poll while pairing runs in the background.
#[derive(Debug, Clone, Serialize)]
pub struct CommissioningJob {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

// ── Controller ───────────────────────────────────────────────────────

/// Handle to the bridge session and device registry.
///
/// Cheaply cloneable; all clones share one session, registry, and job
/// table.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    store: DeviceStore,
    rpc: Mutex<Option<RpcClient>>,
    connection: watch::Sender<ConnectionState>,
    jobs: DashMap<Uuid, CommissioningJob>,
    /// Operator-assigned names, re-applied after every resync so a
    /// rename survives refreshes even though the upstream label does
    /// not change.
    name_overrides: StdMutex<HashMap<u64, String>>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                store: DeviceStore::new(),
                rpc: Mutex::new(None),
                connection,
                jobs: DashMap::new(),
                name_overrides: StdMutex::new(HashMap::new()),
            }),
        }
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Establish the session, subscribe to server events, and load the
    /// initial device listing. On failure the controller stays
    /// disconnected and can be retried.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner
            .connection
            .send_replace(ConnectionState::Connecting);
        tracing::info!(url = %self.inner.config.url, "connecting to bridge server");

        let rpc_config = RpcClientConfig {
            connect_timeout: self.inner.config.connect_timeout,
            call_timeout: self.inner.config.call_timeout,
            receive_timeout: RECEIVE_TIMEOUT,
        };

        let result = async {
            let client = RpcClient::connect(&self.inner.config.url, rpc_config).await?;
            client.call(commands::START_LISTENING, json!({})).await?;
            self.refresh_with(&client).await?;
            Ok::<RpcClient, CoreError>(client)
        }
        .await;

        match result {
            Ok(client) => {
                *self.inner.rpc.lock().await = Some(client);
                self.inner.connection.send_replace(ConnectionState::Connected);
                tracing::info!(devices = self.inner.store.len(), "bridge session ready");
                Ok(())
            }
            Err(e) => {
                self.inner
                    .connection
                    .send_replace(ConnectionState::Disconnected);
                tracing::warn!(error = %e, "bridge connection failed");
                Err(e)
            }
        }
    }

    /// Close the session. Idempotent.
    pub async fn disconnect(&self) {
        if let Some(client) = self.inner.rpc.lock().await.take() {
            client.close().await;
        }
        self.inner
            .connection
            .send_replace(ConnectionState::Disconnected);
        tracing::info!("bridge session closed");
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    /// Clone the session handle, or fail when there is none.
    async fn rpc(&self) -> Result<RpcClient, CoreError> {
        self.inner
            .rpc
            .lock()
            .await
            .clone()
            .ok_or_else(|| CoreError::ServiceUnavailable {
                reason: "no active bridge session".to_owned(),
            })
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Re-pull the full node listing and resync the registry.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let client = self.rpc().await?;
        self.refresh_with(&client).await
    }

    async fn refresh_with(&self, client: &RpcClient) -> Result<(), CoreError> {
        let result = client.call(commands::GET_NODES, json!({})).await?;

        let raw = match result {
            Value::Array(nodes) => nodes,
            Value::Null => Vec::new(),
            other => {
                return Err(CoreError::Internal(format!(
                    "get_nodes returned a non-list payload: {other}"
                )));
            }
        };

        let overrides = self
            .inner
            .name_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut devices = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<NodeData>(value) {
                Ok(node) => {
                    let mut device = device_from_node(&node);
                    if let Some(name) = overrides.get(&device.node_id) {
                        device.name.clone_from(name);
                    }
                    devices.push(device);
                }
                // One bad descriptor must not poison the whole listing.
                Err(e) => tracing::warn!(error = %e, "skipping malformed node descriptor"),
            }
        }

        tracing::debug!(devices = devices.len(), "registry resynced");
        self.inner.store.resync(devices);
        Ok(())
    }

    /// All known devices, in first-seen order.
    pub fn list_devices(&self) -> Vec<Arc<Device>> {
        self.inner.store.list()
    }

    pub fn get_device(&self, node_id: u64) -> Result<Arc<Device>, CoreError> {
        self.inner
            .store
            .get(node_id)
            .ok_or(CoreError::DeviceNotFound { node_id })
    }

    pub fn device_count(&self) -> usize {
        self.inner.store.len()
    }

    /// When the registry last completed a resync.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.store.last_refresh()
    }

    // ── Device operations ────────────────────────────────────────────

    /// Validate and run one command against a device, then resync.
    ///
    /// Unknown devices and malformed parameters fail before any network
    /// traffic.
    pub async fn send_command(
        &self,
        node_id: u64,
        name: &str,
        params: &Value,
    ) -> Result<Value, CoreError> {
        let device = self.get_device(node_id)?;
        let command = DeviceCommand::parse(name, params)?;
        let client = self.rpc().await?;

        tracing::info!(node_id, command = command.wire_name(), "sending device command");
        let result = client
            .call(
                commands::DEVICE_COMMAND,
                json!({
                    "node_id": node_id,
                    "endpoint_id": device.endpoint_id,
                    "name": command.wire_name(),
                    "params": command.wire_params(),
                }),
            )
            .await?;

        self.refresh_with(&client).await?;
        Ok(result)
    }

    /// Remove a device from the fabric and the registry.
    pub async fn remove_device(&self, node_id: u64) -> Result<(), CoreError> {
        self.get_device(node_id)?;
        let client = self.rpc().await?;

        tracing::info!(node_id, "removing device");
        client
            .call(commands::REMOVE_NODE, json!({ "node_id": node_id }))
            .await?;

        self.inner
            .name_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node_id);

        self.refresh_with(&client).await?;
        Ok(())
    }

    /// Assign a local display name to a device. Purely local; the
    /// upstream node label is untouched.
    pub fn rename_device(&self, node_id: u64, name: &str) -> Result<Arc<Device>, CoreError> {
        let renamed = self
            .inner
            .store
            .rename(node_id, name)
            .ok_or(CoreError::DeviceNotFound { node_id })?;

        self.inner
            .name_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id, name.to_owned());

        tracing::info!(node_id, name, "device renamed");
        Ok(renamed)
    }

    // ── Commissioning ────────────────────────────────────────────────

    /// Start pairing a new device in the background and return the job
    /// identifier to poll. Fails fast when there is no session.
    pub async fn start_commissioning(&self, setup_code: String) -> Result<Uuid, CoreError> {
        let client = self.rpc().await?;
        self.prune_finished_jobs();

        let id = Uuid::new_v4();
        self.inner.jobs.insert(
            id,
            CommissioningJob {
                id,
                state: JobState::Queued,
                started_at: Utc::now(),
                finished_at: None,
            },
        );

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_commissioning(id, client, setup_code).await;
        });

        tracing::info!(job_id = %id, "commissioning job started");
        Ok(id)
    }

    async fn run_commissioning(&self, id: Uuid, client: RpcClient, setup_code: String) {
        self.set_job_state(id, JobState::Running);

        let outcome = client
            .call_with_timeout(
                commands::COMMISSION_WITH_CODE,
                json!({ "code": setup_code, "use_network_manager": false }),
                self.inner.config.commission_timeout,
            )
            .await;

        match outcome {
            Ok(_) => {
                // Pairing succeeded even if the follow-up listing fails.
                if let Err(e) = self.refresh_with(&client).await {
                    tracing::warn!(job_id = %id, error = %e, "post-commissioning refresh failed");
                }
                tracing::info!(job_id = %id, "commissioning succeeded");
                self.set_job_state(id, JobState::Succeeded);
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "commissioning failed");
                let error: CoreError = e.into();
                self.set_job_state(
                    id,
                    JobState::Failed {
                        error: error.to_string(),
                    },
                );
            }
        }
    }

    /// Evict the oldest terminal jobs beyond the retention cap. Queued
    /// and running jobs are never touched.
    fn prune_finished_jobs(&self) {
        let mut finished: Vec<(Uuid, DateTime<Utc>)> = self
            .inner
            .jobs
            .iter()
            .filter(|j| matches!(j.state, JobState::Succeeded | JobState::Failed { .. }))
            .map(|j| (j.id, j.started_at))
            .collect();

        if finished.len() <= MAX_FINISHED_JOBS {
            return;
        }

        finished.sort_by_key(|(_, started_at)| *started_at);
        let excess = finished.len() - MAX_FINISHED_JOBS;
        for (id, _) in finished.into_iter().take(excess) {
            self.inner.jobs.remove(&id);
        }
    }

    fn set_job_state(&self, id: Uuid, state: JobState) {
        if let Some(mut job) = self.inner.jobs.get_mut(&id) {
            if matches!(state, JobState::Succeeded | JobState::Failed { .. }) {
                job.finished_at = Some(Utc::now());
            }
            job.state = state;
        }
    }

    /// Snapshot of one commissioning job.
    pub fn commissioning_job(&self, id: Uuid) -> Result<CommissioningJob, CoreError> {
        self.inner
            .jobs
            .get(&id)
            .map(|job| job.value().clone())
            .ok_or(CoreError::JobNotFound { job_id: id })
    }

    /// Snapshots of every commissioning job, newest last.
    pub fn commissioning_jobs(&self) -> Vec<CommissioningJob> {
        let mut jobs: Vec<CommissioningJob> =
            self.inner.jobs.iter().map(|j| j.value().clone()).collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }
}
