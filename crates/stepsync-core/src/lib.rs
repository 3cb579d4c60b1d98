//! Device side of stepsync: talking to a phone through the Android Debug
//! Bridge and copying its step database to the local machine.
//!
//! # Features
//!
//! - **Bridge abstraction**: [`Bridge`] trait with a process-backed [`AdbBridge`]
//! - **Command dispatch**: list devices, attach over the network, pull the database
//! - **Activity stream**: every invocation echoed to an injected [`ActivityLog`]
//! - **Orchestration**: a non-blocking state machine with a single in-flight dispatch
//! - **Testing**: [`MockBridge`] with scripted replies and a call log
//!
//! # Quick Start
//!
//! ```no_run
//! use stepsync_core::{ActivityLog, AdbBridge, Dispatcher, DispatcherConfig, SyncCommand, SyncResult};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::new(
//!         AdbBridge::default(),
//!         DispatcherConfig::default(),
//!         ActivityLog::discard(),
//!     );
//!
//!     match dispatcher.dispatch(&SyncCommand::ListDevices).await {
//!         SyncResult::DeviceList { ids } => println!("{} device(s)", ids.len()),
//!         other => eprintln!("{other:?}"),
//!     }
//! }
//! ```

pub mod activity;
pub mod bridge;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod mock;
pub mod orchestrator;

pub use activity::{Activity, ActivityLog, ActivityReceiver};
pub use bridge::{AdbBridge, Bridge};
pub use commands::{DispatchCompletion, SyncCommand, SyncResult};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DispatchError, OrchestratorError};
pub use mock::MockBridge;
pub use orchestrator::{
    Continuation, Controls, ControlsLease, SyncMessage, SyncOrchestrator, SyncOutcome, SyncState,
};
