//! Device command set and response parsing.
//!
//! The dispatcher understands exactly three commands. Each maps to one or more
//! bridge invocations and ends in one [`SyncResult`].

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::DispatchError;

/// Header line printed by `adb devices` before the device table.
pub const DEVICE_LIST_HEADER: &str = "List of devices attached";

/// Status field of a device that is attached and authorized.
pub const READY_STATUS: &str = "device";

/// A unit of device work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SyncCommand {
    /// Enumerate attached devices.
    ListDevices,
    /// Attach a device over the network by `host:port`.
    ConnectNetwork { address: String },
    /// Copy the step database off a rooted device.
    PullDatabaseRooted { device_id: String },
}

impl SyncCommand {
    pub fn connect(address: impl Into<String>) -> Self {
        Self::ConnectNetwork {
            address: address.into(),
        }
    }

    pub fn pull(device_id: impl Into<String>) -> Self {
        Self::PullDatabaseRooted {
            device_id: device_id.into(),
        }
    }
}

impl fmt::Display for SyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListDevices => write!(f, "list devices"),
            Self::ConnectNetwork { address } => write!(f, "connect to {address}"),
            Self::PullDatabaseRooted { device_id } => write!(f, "pull database from {device_id}"),
        }
    }
}

/// Terminal result of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncResult {
    DeviceList { ids: Vec<String> },
    Connected { address: String },
    PullComplete { local_path: PathBuf },
    Failed { error: DispatchError },
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// A command paired with its result, as posted back to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchCompletion {
    pub command: SyncCommand,
    pub result: SyncResult,
}

/// Extract ready device ids from `adb devices` output.
///
/// Everything up to and including [`DEVICE_LIST_HEADER`] is skipped, which
/// also drops daemon start-up banners. Without a header only the first line
/// is skipped. Rows in any state other than [`READY_STATUS`] (`offline`,
/// `unauthorized`, ...) are ignored.
pub fn parse_device_list(output: &str) -> Vec<String> {
    let lines: Vec<&str> = output.lines().collect();
    let body = match lines.iter().position(|l| l.trim() == DEVICE_LIST_HEADER) {
        Some(header) => &lines[header + 1..],
        None => lines.get(1..).unwrap_or_default(),
    };

    body.iter()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            let status = fields.next()?;
            (status == READY_STATUS).then(|| id.to_string())
        })
        .collect()
}

/// Whether an `adb connect` response reports success for `address`.
pub fn is_connect_success(response: &str, address: &str) -> bool {
    response.contains(&format!("connected to {address}"))
        || response.contains(&format!("already connected to {address}"))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn status() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "device",
            "offline",
            "unauthorized",
            "recovery",
            "sideload",
            "devices",
            "no permissions",
        ])
    }

    proptest! {
        /// Exactly the ready ids come back, in listing order.
        #[test]
        fn parse_device_list_keeps_ready_rows_in_order(
            rows in prop::collection::vec(("[A-Za-z0-9.:_-]{1,24}", status()), 0..12),
        ) {
            let mut output = format!("{DEVICE_LIST_HEADER}\n");
            for (id, status) in &rows {
                output.push_str(&format!("{id}\t{status}\n"));
            }

            let expected: Vec<String> = rows
                .iter()
                .filter(|(_, status)| *status == READY_STATUS)
                .map(|(id, _)| id.clone())
                .collect();
            prop_assert_eq!(parse_device_list(&output), expected);
        }

        /// Arbitrary bridge output never panics the parser.
        #[test]
        fn parse_device_list_never_panics(output in ".*") {
            let _ = parse_device_list(&output);
        }
    }
}
