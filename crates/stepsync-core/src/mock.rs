//! Mock bridge implementation for testing.
//!
//! [`MockBridge`] implements [`Bridge`] without spawning anything, so the
//! dispatcher and orchestrator can be exercised without a phone attached.
//!
//! # Features
//!
//! - **Scripted replies**: answer invocations whose joined arguments contain a pattern
//! - **Failure injection**: fail every invocation with a given error
//! - **Call log**: inspect the exact argument vectors that were run
//! - **Pull fixture**: copy a local file to the destination of a `pull`
//! - **Latency simulation**: delay each invocation

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bridge::Bridge;
use crate::error::DispatchError;

type Reply = Result<String, DispatchError>;

/// A scripted bridge for tests.
///
/// Replies are matched against the space-joined arguments; the most recently
/// added matching pattern wins. Unmatched invocations succeed with empty
/// output.
///
/// # Example
///
/// ```
/// use stepsync_core::{Bridge, MockBridge};
///
/// #[tokio::main]
/// async fn main() {
///     let bridge = MockBridge::new()
///         .with_reply("devices", Ok("List of devices attached\nabc\tdevice".into()));
///
///     let out = bridge.run(&["devices".to_string()]).await.unwrap();
///     assert!(out.ends_with("device"));
///     assert_eq!(bridge.call_count().await, 1);
/// }
/// ```
pub struct MockBridge {
    program: String,
    replies: RwLock<Vec<(String, Reply)>>,
    failure: RwLock<Option<DispatchError>>,
    calls: RwLock<Vec<Vec<String>>>,
    pull_fixture: RwLock<Option<PathBuf>>,
    /// Simulated latency per invocation in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBridge")
            .field("program", &self.program)
            .field("latency_ms", &self.latency_ms.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            program: "adb".to_string(),
            replies: RwLock::new(Vec::new()),
            failure: RwLock::new(None),
            calls: RwLock::new(Vec::new()),
            pull_fixture: RwLock::new(None),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// Reply with `reply` to invocations containing `pattern`.
    pub fn with_reply(mut self, pattern: impl Into<String>, reply: Reply) -> Self {
        self.replies.get_mut().push((pattern.into(), reply));
        self
    }

    /// Fail every invocation with `error`.
    pub fn with_failure(mut self, error: DispatchError) -> Self {
        *self.failure.get_mut() = Some(error);
        self
    }

    /// Copy `path` to the local destination of every successful `pull`.
    pub fn with_pull_fixture(mut self, path: impl AsRef<Path>) -> Self {
        *self.pull_fixture.get_mut() = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub async fn set_reply(&self, pattern: impl Into<String>, reply: Reply) {
        self.replies.write().await.push((pattern.into(), reply));
    }

    pub async fn set_failure(&self, error: Option<DispatchError>) {
        *self.failure.write().await = error;
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Every argument vector run so far, in order.
    pub async fn calls(&self) -> Vec<Vec<String>> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn reply_for(&self, joined: &str) -> Reply {
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        self.replies
            .read()
            .await
            .iter()
            .rev()
            .find(|(pattern, _)| joined.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(String::new()))
    }

    async fn deliver_pull(&self, args: &[String]) -> Result<(), DispatchError> {
        let Some(fixture) = self.pull_fixture.read().await.clone() else {
            return Ok(());
        };
        // [-s, <id>, pull, <remote>, <local>]
        let Some(local) = args.iter().skip_while(|a| *a != "pull").nth(2) else {
            return Ok(());
        };
        tokio::fs::copy(&fixture, local)
            .await
            .map(|_| ())
            .map_err(|e| DispatchError::NonZeroExit {
                code: Some(1),
                stderr: format!("adb: error: failed to copy '{}': {e}", fixture.display()),
            })
    }
}

#[async_trait]
impl Bridge for MockBridge {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> Result<String, DispatchError> {
        self.calls.write().await.push(args.to_vec());

        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let output = self.reply_for(&args.join(" ")).await?;
        if args.iter().any(|a| a == "pull") {
            self.deliver_pull(args).await?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split(' ').map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_default_reply_is_empty() {
        let bridge = MockBridge::new();
        assert_eq!(bridge.run(&args("devices")).await.unwrap(), "");
        assert_eq!(bridge.calls().await, vec![args("devices")]);
    }

    #[tokio::test]
    async fn test_latest_matching_reply_wins() {
        let bridge = MockBridge::new().with_reply("connect", Ok("first".into()));
        bridge.set_reply("connect", Ok("second".into())).await;
        assert_eq!(bridge.run(&args("connect 1.2.3.4")).await.unwrap(), "second");
        assert_eq!(bridge.run(&args("devices")).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let bridge = MockBridge::new().with_reply("devices", Ok("ok".into()));
        bridge
            .set_failure(Some(DispatchError::Timeout {
                after: Duration::from_secs(1),
            }))
            .await;
        assert!(matches!(
            bridge.run(&args("devices")).await,
            Err(DispatchError::Timeout { .. })
        ));

        bridge.set_failure(None).await;
        assert_eq!(bridge.run(&args("devices")).await.unwrap(), "ok");
        assert_eq!(bridge.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_pull_fixture_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = dir.path().join("src.db");
        std::fs::write(&fixture, b"db").unwrap();
        let dest = dir.path().join("out.db");

        let bridge = MockBridge::new().with_pull_fixture(&fixture);
        let pull = vec![
            "-s".to_string(),
            "abc".to_string(),
            "pull".to_string(),
            "/sdcard/tmp.db".to_string(),
            dest.to_string_lossy().to_string(),
        ];
        bridge.run(&pull).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"db");
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let bridge = MockBridge::new().with_latency(Duration::from_secs(5));
        let start = tokio::time::Instant::now();
        bridge.run(&args("devices")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
