//! Device bridge abstraction.
//!
//! A [`Bridge`] runs one command-line invocation of the device bridge and
//! returns its trimmed standard output. [`AdbBridge`] spawns the real
//! executable; [`crate::MockBridge`] scripts replies for tests.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::DispatchError;

/// Default bridge executable, looked up on `PATH`.
pub const DEFAULT_PROGRAM: &str = "adb";

/// Default per-invocation time limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Runs bridge invocations.
///
/// Implementations must be safe to share between tasks; one dispatch may run
/// on a background task while the owner keeps its own handle.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Name of the executable, used when echoing command lines.
    fn program(&self) -> &str;

    /// Run the bridge with `args` and return its trimmed stdout.
    ///
    /// A non-zero exit is an error carrying the trimmed stderr.
    async fn run(&self, args: &[String]) -> Result<String, DispatchError>;
}

/// Bridge backed by a child process.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: String,
    timeout: Duration,
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, DEFAULT_TIMEOUT)
    }
}

impl AdbBridge {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> Result<String, DispatchError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!(program = %self.program, error = %e, "Failed to start bridge");
                DispatchError::BinaryNotFound {
                    program: self.program.clone(),
                    reason: e.to_string(),
                }
            })?;

        // On timeout the future owning the child is dropped, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DispatchError::NonZeroExit {
                    code: None,
                    stderr: e.to_string(),
                });
            }
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "Bridge command timed out");
                return Err(DispatchError::Timeout {
                    after: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("Bridge command failed:\n{stderr}");
            return Err(DispatchError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(bytes = stdout.len(), "Bridge command succeeded");
        Ok(stdout)
    }
}
