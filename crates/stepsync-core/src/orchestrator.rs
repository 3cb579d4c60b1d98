//! Sync orchestration.
//!
//! [`SyncOrchestrator`] drives the device workflow: scan, optionally attach
//! over the network, select a device, pull its database. It runs on the
//! owner's task and never blocks; each request starts at most one background
//! dispatch whose single [`SyncMessage::Completed`] comes back through the
//! owner's queue and is fed to [`SyncOrchestrator::handle`].
//!
//! ```text
//!            refresh()                connect(addr)
//!   Idle ─────────────▶ Scanning    Idle ─────────────▶ Connecting
//!    ▲  ◀── DeviceList ──┘           ▲  ◀── Connected ───┘
//!    │                               │      (posts Continue(Rescan))
//!    │        pull()                 │
//!    └───── Failed ◀── Pulling ──── PullComplete ──▶ Finished
//! ```
//!
//! Work that follows a completion (the re-scan after a network attach) is
//! never started inside `handle`; it is posted as a [`Continuation`] and
//! runs when the owner delivers it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::commands::{DispatchCompletion, SyncCommand, SyncResult};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, OrchestratorError};

/// Workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Scanning,
    Connecting,
    Pulling,
    /// A database was pulled; no further requests are accepted.
    Finished,
}

/// Follow-up work posted back to the owner's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Rescan,
}

/// Messages the orchestrator posts to its owner.
#[derive(Debug)]
pub enum SyncMessage {
    Completed(DispatchCompletion),
    Continue(Continuation),
}

/// What a handled message meant, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    DevicesListed { ids: Vec<String> },
    Connected { address: String },
    SyncComplete { local_path: PathBuf },
    Failed { command: SyncCommand, error: DispatchError },
}

/// Shared flag telling a front end whether interactive controls are usable.
#[derive(Debug, Clone)]
pub struct Controls {
    enabled: Arc<AtomicBool>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Controls {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Disable controls until the returned lease is dropped.
    pub fn lease(&self) -> ControlsLease {
        self.enabled.store(false, Ordering::Release);
        ControlsLease {
            enabled: Arc::clone(&self.enabled),
        }
    }
}

/// Keeps controls disabled while alive.
///
/// Held in the orchestrator's in-flight slot, so controls come back on
/// however the dispatch ends.
#[derive(Debug)]
pub struct ControlsLease {
    enabled: Arc<AtomicBool>,
}

impl Drop for ControlsLease {
    fn drop(&mut self) {
        self.enabled.store(true, Ordering::Release);
    }
}

struct InFlight {
    command: SyncCommand,
    _lease: ControlsLease,
    _handle: JoinHandle<()>,
}

/// Drives device discovery and database pulls.
pub struct SyncOrchestrator<B, M> {
    dispatcher: Arc<Dispatcher<B>>,
    outbox: mpsc::UnboundedSender<M>,
    state: SyncState,
    devices: Vec<String>,
    selected: Option<String>,
    controls: Controls,
    in_flight: Option<InFlight>,
}

impl<B, M> SyncOrchestrator<B, M>
where
    B: Bridge + 'static,
    M: From<SyncMessage> + Send + 'static,
{
    pub fn new(dispatcher: Arc<Dispatcher<B>>, outbox: mpsc::UnboundedSender<M>) -> Self {
        Self {
            dispatcher,
            outbox,
            state: SyncState::Idle,
            devices: Vec::new(),
            selected: None,
            controls: Controls::default(),
            in_flight: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Devices from the last successful scan.
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Handle to the controls flag.
    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    /// True while a dispatch is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The command currently running, if any.
    pub fn pending(&self) -> Option<&SyncCommand> {
        self.in_flight.as_ref().map(|f| &f.command)
    }

    /// Scan for attached devices.
    pub fn refresh(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        self.start(SyncState::Scanning, SyncCommand::ListDevices);
        Ok(())
    }

    /// Attach a device at `address` (`host:port`).
    pub fn connect(&mut self, address: &str) -> Result<(), OrchestratorError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OrchestratorError::EmptyAddress);
        }
        self.ensure_ready()?;
        self.start(SyncState::Connecting, SyncCommand::connect(address));
        Ok(())
    }

    /// Choose the device to pull from. Must be one from the last scan.
    pub fn select(&mut self, device_id: &str) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        if !self.devices.iter().any(|d| d == device_id) {
            return Err(OrchestratorError::UnknownDevice(device_id.to_string()));
        }
        debug!(device_id, "Device selected");
        self.selected = Some(device_id.to_string());
        Ok(())
    }

    /// Pull the database from the selected device.
    pub fn pull(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_ready()?;
        let device_id = self
            .selected
            .clone()
            .ok_or(OrchestratorError::NoDeviceSelected)?;
        self.start(SyncState::Pulling, SyncCommand::pull(device_id));
        Ok(())
    }

    /// Apply a message from the queue.
    ///
    /// Returns what the completion meant, or `None` for continuations.
    pub fn handle(&mut self, message: SyncMessage) -> Option<SyncOutcome> {
        match message {
            SyncMessage::Completed(completion) => Some(self.on_completed(completion)),
            SyncMessage::Continue(Continuation::Rescan) => {
                if let Err(e) = self.refresh() {
                    warn!(error = %e, "Skipping re-scan");
                }
                None
            }
        }
    }

    fn ensure_ready(&self) -> Result<(), OrchestratorError> {
        if self.state == SyncState::Finished {
            return Err(OrchestratorError::SessionFinished);
        }
        if self.in_flight.is_some() {
            return Err(OrchestratorError::Busy);
        }
        Ok(())
    }

    fn start(&mut self, next: SyncState, command: SyncCommand) {
        info!(%command, "Starting device command");
        let lease = self.controls.lease();
        let dispatcher = Arc::clone(&self.dispatcher);
        let outbox = self.outbox.clone();
        let task_command = command.clone();

        let handle = tokio::spawn(async move {
            let worker_command = task_command.clone();
            let joined =
                tokio::spawn(async move { dispatcher.dispatch(&worker_command).await }).await;

            let result = joined.unwrap_or_else(|e| SyncResult::Failed {
                error: DispatchError::Worker {
                    reason: e.to_string(),
                },
            });

            let completion = DispatchCompletion {
                command: task_command,
                result,
            };
            // Receiver gone means the owner shut down
            let _ = outbox.send(SyncMessage::Completed(completion).into());
        });

        self.state = next;
        self.in_flight = Some(InFlight {
            command,
            _lease: lease,
            _handle: handle,
        });
    }

    fn on_completed(&mut self, completion: DispatchCompletion) -> SyncOutcome {
        // Dropping the slot drops the lease.
        self.in_flight = None;

        let DispatchCompletion { command, result } = completion;
        match result {
            SyncResult::DeviceList { ids } => {
                self.state = SyncState::Idle;
                let keep = self
                    .selected
                    .as_ref()
                    .is_some_and(|s| ids.iter().any(|d| d == s));
                if !keep {
                    self.selected = ids.first().cloned();
                }
                info!(count = ids.len(), "Devices listed");
                self.devices = ids.clone();
                SyncOutcome::DevicesListed { ids }
            }
            SyncResult::Connected { address } => {
                self.state = SyncState::Idle;
                info!(%address, "Connected, re-scanning");
                let _ = self
                    .outbox
                    .send(SyncMessage::Continue(Continuation::Rescan).into());
                SyncOutcome::Connected { address }
            }
            SyncResult::PullComplete { local_path } => {
                self.state = SyncState::Finished;
                info!("Database pulled to {}", local_path.display());
                SyncOutcome::SyncComplete { local_path }
            }
            SyncResult::Failed { error } => {
                self.state = SyncState::Idle;
                warn!(%command, %error, "Device command failed");
                SyncOutcome::Failed { command, error }
            }
        }
    }
}
