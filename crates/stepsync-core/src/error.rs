//! Error types for stepsync-core.
//!
//! Two families live here:
//!
//! | Type | Raised by | Reaches the owner as |
//! |------|-----------|----------------------|
//! | [`DispatchError`] | bridge and dispatcher | `SyncResult::Failed` inside a completion message |
//! | [`OrchestratorError`] | orchestrator requests | the synchronous return value |
//!
//! [`DispatchError`] is `Clone` so it can travel inside queued messages and be
//! shown more than once.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure of one bridge invocation or dispatcher step.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchError {
    /// The bridge executable could not be started.
    #[error("{program} executable not found ({reason}). Make sure it's in your system's PATH.")]
    BinaryNotFound { program: String, reason: String },

    /// The bridge ran but exited unsuccessfully.
    #[error("Command failed{}:\n{stderr}", .code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    NonZeroExit { code: Option<i32>, stderr: String },

    /// The bridge did not finish in time and was killed.
    #[error("Command timed out after {}s. Is the device responsive?", .after.as_secs())]
    Timeout { after: Duration },

    /// The bridge succeeded but its response was not the expected one.
    #[error("Unexpected response: {response}")]
    ProtocolMismatch { response: String },

    /// The stale local copy could not be removed before pulling.
    #[error("Could not replace local file {}: {message}", .path.display())]
    LocalFile { path: PathBuf, message: String },

    /// The background dispatch task died before producing a result.
    #[error("Dispatch task failed: {reason}")]
    Worker { reason: String },
}

/// A request the orchestrator refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("Another device operation is still running")]
    Busy,

    #[error("No device selected")]
    NoDeviceSelected,

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Address must not be empty")]
    EmptyAddress,

    #[error("Sync already completed")]
    SessionFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::BinaryNotFound {
            program: "adb".into(),
            reason: "No such file or directory".into(),
        };
        assert!(err.to_string().starts_with("adb executable not found"));

        let err = DispatchError::NonZeroExit {
            code: Some(1),
            stderr: "error: no devices/emulators found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Command failed with exit code 1:\nerror: no devices/emulators found"
        );

        let err = DispatchError::NonZeroExit {
            code: None,
            stderr: "killed".into(),
        };
        assert_eq!(err.to_string(), "Command failed:\nkilled");

        let err = DispatchError::Timeout {
            after: Duration::from_secs(20),
        };
        assert!(err.to_string().contains("20s"));
    }

    #[test]
    fn test_protocol_mismatch_keeps_response() {
        let err = DispatchError::ProtocolMismatch {
            response: "failed to connect to '10.0.0.9:5555': Connection refused".into(),
        };
        assert!(err.to_string().ends_with("Connection refused"));
    }

    #[test]
    fn test_dispatch_error_serializes_tagged() {
        let err = DispatchError::ProtocolMismatch {
            response: "nope".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "protocol_mismatch");
        assert_eq!(json["response"], "nope");
    }

    #[test]
    fn test_orchestrator_error_display() {
        assert_eq!(
            OrchestratorError::UnknownDevice("xyz".into()).to_string(),
            "Unknown device: xyz"
        );
        assert_eq!(OrchestratorError::Busy.to_string(), "Another device operation is still running");
    }
}
