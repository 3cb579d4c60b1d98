//! The coordinating context.
//!
//! A [`Session`] owns the current [`Dataset`], the [`LoadCoordinator`] and the
//! [`SyncOrchestrator`]. Both feed one queue of [`SessionMessage`]s; the
//! session drains it together with the device activity stream and hands each
//! message to its owner. Nothing here blocks on I/O: loads run on the
//! blocking pool and device commands on background tasks.
//!
//! The request methods (`load`, `refresh`, `connect`, `pull`, `sync`) start
//! one operation and pump the queue until it finishes, reporting progress to
//! the session's observer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use stepsync_core::{
    Activity, ActivityReceiver, Bridge, Dispatcher, SyncMessage, SyncOrchestrator, SyncOutcome,
};
use stepsync_store::{AggregationEngine, DataError, Dataset, LoadCoordinator, LoadMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// Everything that arrives on the session queue.
#[derive(Debug)]
pub enum SessionMessage {
    Load(LoadMessage),
    Sync(SyncMessage),
}

impl From<LoadMessage> for SessionMessage {
    fn from(msg: LoadMessage) -> Self {
        Self::Load(msg)
    }
}

impl From<SyncMessage> for SessionMessage {
    fn from(msg: SyncMessage) -> Self {
        Self::Sync(msg)
    }
}

/// Progress reported while a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Status line from the load path.
    Status(String),
    /// Device activity (command lines, output, notes).
    Activity(Activity),
    /// Outcome of a device command.
    Outcome(SyncOutcome),
}

type Observer = Box<dyn FnMut(&SessionEvent) + Send>;

enum Pumped {
    Sync(SyncOutcome),
    Loaded,
}

enum Next {
    Activity(Activity),
    Message(SessionMessage),
}

/// Owner of the dataset and of both background paths.
pub struct Session<B> {
    dataset: Dataset,
    loader: LoadCoordinator<SessionMessage>,
    sync: SyncOrchestrator<B, SessionMessage>,
    queue: mpsc::UnboundedReceiver<SessionMessage>,
    backlog: VecDeque<SessionMessage>,
    activity: Option<ActivityReceiver>,
    load_error: Option<DataError>,
    observer: Observer,
}

impl<B: Bridge + 'static> Session<B> {
    /// Build a session. `activity` is the receiving end of the log the
    /// dispatcher was created with, if any.
    pub fn new(
        engine: AggregationEngine,
        dispatcher: Arc<Dispatcher<B>>,
        activity: Option<ActivityReceiver>,
    ) -> Self {
        let (tx, queue) = mpsc::unbounded_channel();
        Self {
            dataset: Dataset::default(),
            loader: LoadCoordinator::new(engine, tx.clone()),
            sync: SyncOrchestrator::new(dispatcher, tx),
            queue,
            backlog: VecDeque::new(),
            activity,
            load_error: None,
            observer: Box::new(|_| {}),
        }
    }

    /// Receive progress events.
    pub fn with_observer(mut self, observer: impl FnMut(&SessionEvent) + Send + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator<B, SessionMessage> {
        &self.sync
    }

    /// Load `path`, replacing the current dataset.
    ///
    /// On failure the dataset is left empty.
    pub async fn load(&mut self, path: impl Into<PathBuf>) -> Result<&Dataset> {
        let path = path.into();
        self.loader.load(&path)?;
        self.load_error = None;

        loop {
            if let Pumped::Loaded = self.pump().await? {
                break;
            }
        }

        match self.load_error.take() {
            Some(error) => {
                Err(anyhow::Error::new(error).context(format!("Failed to load {}", path.display())))
            }
            None => Ok(&self.dataset),
        }
    }

    /// Scan for devices.
    pub async fn refresh(&mut self) -> Result<Vec<String>> {
        self.sync.refresh()?;
        match self.next_outcome().await? {
            SyncOutcome::DevicesListed { ids } => Ok(ids),
            other => Err(outcome_error(other)),
        }
    }

    /// Attach a device over the network and wait for the follow-up scan.
    pub async fn connect(&mut self, address: &str) -> Result<Vec<String>> {
        self.sync.connect(address)?;
        match self.next_outcome().await? {
            SyncOutcome::Connected { .. } => {}
            other => return Err(outcome_error(other)),
        }
        // The re-scan arrives as a continuation on the queue.
        match self.next_outcome().await? {
            SyncOutcome::DevicesListed { ids } => Ok(ids),
            other => Err(outcome_error(other)),
        }
    }

    /// Pull from `device_id`, or from the current selection.
    pub async fn pull(&mut self, device_id: Option<&str>) -> Result<PathBuf> {
        if let Some(id) = device_id {
            self.sync.select(id)?;
        }
        self.sync.pull()?;
        match self.next_outcome().await? {
            SyncOutcome::SyncComplete { local_path } => Ok(local_path),
            other => Err(outcome_error(other)),
        }
    }

    /// Full flow: optional network attach, scan, pull, load.
    pub async fn sync(&mut self, connect: Option<&str>, device_id: Option<&str>) -> Result<&Dataset> {
        let devices = match connect {
            Some(address) => self.connect(address).await?,
            None => self.refresh().await?,
        };
        if devices.is_empty() {
            bail!("No devices found. Is USB debugging enabled and the device authorized?");
        }

        let local_path = self.pull(device_id).await?;
        self.load(local_path).await
    }

    async fn next_outcome(&mut self) -> Result<SyncOutcome> {
        loop {
            if let Pumped::Sync(outcome) = self.pump().await? {
                return Ok(outcome);
            }
        }
    }

    /// Wait for and apply the next message.
    async fn pump(&mut self) -> Result<Pumped> {
        loop {
            let message = match self.backlog.pop_front() {
                Some(message) => message,
                None => match self.next_message().await? {
                    Next::Activity(entry) => {
                        self.emit(SessionEvent::Activity(entry));
                        continue;
                    }
                    Next::Message(message) => message,
                },
            };

            match message {
                SessionMessage::Load(LoadMessage::Status(text)) => {
                    self.emit(SessionEvent::Status(text));
                }
                SessionMessage::Load(LoadMessage::Finished(completion)) => {
                    match self.loader.complete(completion) {
                        Ok(dataset) => self.dataset = dataset,
                        Err(e) => {
                            self.dataset = Dataset::default();
                            self.load_error = Some(e);
                        }
                    }
                    // The terminal status is already queued behind this message.
                    self.drain_status();
                    return Ok(Pumped::Loaded);
                }
                SessionMessage::Sync(message) => {
                    if let Some(outcome) = self.sync.handle(message) {
                        debug!(?outcome, "Device command finished");
                        self.emit(SessionEvent::Outcome(outcome.clone()));
                        return Ok(Pumped::Sync(outcome));
                    }
                }
            }
        }
    }

    async fn next_message(&mut self) -> Result<Next> {
        // Activity first, so command lines precede their outcome.
        tokio::select! {
            biased;
            Some(entry) = recv_activity(&mut self.activity) => Ok(Next::Activity(entry)),
            Some(message) = self.queue.recv() => Ok(Next::Message(message)),
            else => Err(anyhow!("session queue closed")),
        }
    }

    fn drain_status(&mut self) {
        while let Ok(message) = self.queue.try_recv() {
            match message {
                SessionMessage::Load(LoadMessage::Status(text)) => {
                    self.emit(SessionEvent::Status(text));
                }
                other => {
                    self.backlog.push_back(other);
                    break;
                }
            }
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        (self.observer)(&event);
    }
}

async fn recv_activity(rx: &mut Option<ActivityReceiver>) -> Option<Activity> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

fn outcome_error(outcome: SyncOutcome) -> anyhow::Error {
    match outcome {
        SyncOutcome::Failed { command, error } => anyhow!(error).context(format!("Failed to {command}")),
        other => anyhow!("unexpected device outcome: {other:?}"),
    }
}

/// Local database to use when no path is given.
pub fn resolve_source(path: Option<&Path>, default: &Path) -> PathBuf {
    path.unwrap_or(default).to_path_buf()
}
