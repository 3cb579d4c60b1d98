//! End-to-end orchestrator workflows against the mock bridge.

use std::sync::Arc;

use stepsync_core::{
    Activity, ActivityLog, Dispatcher, DispatcherConfig, MockBridge, SyncMessage,
    SyncOrchestrator, SyncOutcome, SyncState,
};
use tokio::sync::mpsc;

/// Owner-side message type multiplexing several producers, as a front end would.
#[derive(Debug)]
enum AppMessage {
    Sync(SyncMessage),
}

impl From<SyncMessage> for AppMessage {
    fn from(msg: SyncMessage) -> Self {
        Self::Sync(msg)
    }
}

async fn next_outcome(
    orch: &mut SyncOrchestrator<MockBridge, AppMessage>,
    rx: &mut mpsc::UnboundedReceiver<AppMessage>,
) -> SyncOutcome {
    loop {
        let AppMessage::Sync(msg) = rx.recv().await.expect("queue closed");
        if let Some(outcome) = orch.handle(msg) {
            return outcome;
        }
    }
}

#[tokio::test]
async fn test_connect_scan_pull() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("device-copy.db");
    std::fs::write(&fixture, b"SQLite format 3\0").unwrap();
    let local = dir.path().join("Steps.db");

    let bridge = MockBridge::new()
        .with_reply("connect", Ok("connected to 192.168.1.5:5555".into()))
        .with_reply(
            "devices",
            Ok("List of devices attached\n192.168.1.5:5555\tdevice".into()),
        )
        .with_pull_fixture(&fixture);

    let (activity, mut activity_rx) = ActivityLog::channel();
    let dispatcher = Arc::new(Dispatcher::new(
        bridge,
        DispatcherConfig {
            local_path: local.clone(),
            ..DispatcherConfig::default()
        },
        activity,
    ));
    let (tx, mut rx) = mpsc::unbounded_channel::<AppMessage>();
    let mut orch = SyncOrchestrator::new(Arc::clone(&dispatcher), tx);

    orch.connect("192.168.1.5:5555").unwrap();
    assert!(matches!(
        next_outcome(&mut orch, &mut rx).await,
        SyncOutcome::Connected { .. }
    ));
    // The continuation re-scan is delivered through the queue.
    assert_eq!(
        next_outcome(&mut orch, &mut rx).await,
        SyncOutcome::DevicesListed {
            ids: vec!["192.168.1.5:5555".into()]
        }
    );
    assert_eq!(orch.selected(), Some("192.168.1.5:5555"));

    orch.pull().unwrap();
    assert_eq!(
        next_outcome(&mut orch, &mut rx).await,
        SyncOutcome::SyncComplete {
            local_path: local.clone()
        }
    );
    assert_eq!(orch.state(), SyncState::Finished);
    assert_eq!(std::fs::read(&local).unwrap(), b"SQLite format 3\0");

    let lines: Vec<String> = std::iter::from_fn(|| activity_rx.try_recv().ok())
        .filter_map(|a| match a {
            Activity::Running(line) => Some(line),
            _ => None,
        })
        .collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "adb connect 192.168.1.5:5555");
    assert_eq!(lines[1], "adb devices");
    assert!(lines[4].ends_with("shell rm /sdcard/Steps_tmp.db"));
}

#[tokio::test]
async fn test_no_devices_leaves_nothing_to_pull() {
    let bridge = MockBridge::new().with_reply("devices", Ok("List of devices attached".into()));
    let dispatcher = Arc::new(Dispatcher::new(
        bridge,
        DispatcherConfig::default(),
        ActivityLog::discard(),
    ));
    let (tx, mut rx) = mpsc::unbounded_channel::<AppMessage>();
    let mut orch = SyncOrchestrator::new(dispatcher, tx);

    orch.refresh().unwrap();
    assert_eq!(
        next_outcome(&mut orch, &mut rx).await,
        SyncOutcome::DevicesListed { ids: vec![] }
    );
    assert!(orch.selected().is_none());
    assert!(orch.pull().is_err());
}
