//! Command dispatcher.
//!
//! Turns a [`SyncCommand`] into bridge invocations, echoes each one to the
//! [`ActivityLog`] and folds every failure into [`SyncResult::Failed`].

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::activity::ActivityLog;
use crate::bridge::Bridge;
use crate::commands::{SyncCommand, SyncResult, is_connect_success, parse_device_list};
use crate::error::DispatchError;

/// Database location on the device.
pub const DEFAULT_REMOTE_SOURCE: &str = "/data/data/com.miui.rom/databases/Steps.db";
/// World-readable staging location on the device.
pub const DEFAULT_REMOTE_TEMP: &str = "/sdcard/Steps_tmp.db";
/// Destination of the pulled copy.
pub const DEFAULT_LOCAL_PATH: &str = "Steps.db";

/// File locations used by the pull sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub remote_source: String,
    pub remote_temp: String,
    pub local_path: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            remote_source: DEFAULT_REMOTE_SOURCE.to_string(),
            remote_temp: DEFAULT_REMOTE_TEMP.to_string(),
            local_path: PathBuf::from(DEFAULT_LOCAL_PATH),
        }
    }
}

/// Executes [`SyncCommand`]s against a [`Bridge`].
#[derive(Debug)]
pub struct Dispatcher<B> {
    bridge: B,
    config: DispatcherConfig,
    activity: ActivityLog,
}

impl<B: Bridge> Dispatcher<B> {
    pub fn new(bridge: B, config: DispatcherConfig, activity: ActivityLog) -> Self {
        Self {
            bridge,
            config,
            activity,
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Run `command` to completion. Never fails; errors come back as
    /// [`SyncResult::Failed`].
    pub async fn dispatch(&self, command: &SyncCommand) -> SyncResult {
        let outcome = match command {
            SyncCommand::ListDevices => self
                .list_devices()
                .await
                .map(|ids| SyncResult::DeviceList { ids }),
            SyncCommand::ConnectNetwork { address } => self
                .connect_network(address)
                .await
                .map(|address| SyncResult::Connected { address }),
            SyncCommand::PullDatabaseRooted { device_id } => self
                .pull_database_rooted(device_id)
                .await
                .map(|local_path| SyncResult::PullComplete { local_path }),
        };

        outcome.unwrap_or_else(|error| {
            warn!(%command, %error, "Device command failed");
            SyncResult::Failed { error }
        })
    }

    async fn list_devices(&self) -> Result<Vec<String>, DispatchError> {
        let output = self.run(argv(["devices"])).await?;
        let ids = parse_device_list(&output);
        info!(count = ids.len(), "Listed devices");
        Ok(ids)
    }

    async fn connect_network(&self, address: &str) -> Result<String, DispatchError> {
        self.activity
            .note(format!("Attempting to connect to {address}..."));
        let response = self.run(argv(["connect", address])).await?;

        if is_connect_success(&response, address) {
            Ok(address.to_string())
        } else {
            Err(DispatchError::ProtocolMismatch { response })
        }
    }

    /// Copy to world-readable storage as root, pull the copy, then delete it.
    ///
    /// Stops at the first failing step. Earlier steps are not undone, so a
    /// failed pull can leave the staging copy on the device.
    async fn pull_database_rooted(&self, device_id: &str) -> Result<PathBuf, DispatchError> {
        let DispatcherConfig {
            remote_source,
            remote_temp,
            local_path,
        } = &self.config;

        self.activity.note("Attempting DB pull using root method...");
        let copy = format!("\"cp {remote_source} {remote_temp} && chmod 644 {remote_temp}\"");
        self.run(argv(["-s", device_id, "shell", "su", "-c", &copy]))
            .await?;

        remove_stale(local_path).await?;

        self.activity
            .note("Pulling database from temporary location...");
        let local = local_path.to_string_lossy();
        self.run(argv(["-s", device_id, "pull", remote_temp, &local]))
            .await?;

        self.activity.note("Cleaning up temporary file on device...");
        self.run(argv(["-s", device_id, "shell", "rm", remote_temp]))
            .await?;

        self.activity.note("Database pull successful!");
        Ok(local_path.clone())
    }

    async fn run(&self, args: Vec<String>) -> Result<String, DispatchError> {
        self.activity.running(self.bridge.program(), &args);
        let output = self.bridge.run(&args).await?;
        self.activity.output(&output);
        Ok(output)
    }
}

async fn remove_stale(path: &Path) -> Result<(), DispatchError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DispatchError::LocalFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.into_iter().map(str::to_string).collect()
}
