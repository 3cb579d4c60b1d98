//! Activity stream for device interactions.
//!
//! Every bridge invocation is echoed to an [`ActivityLog`] so a front end can
//! show what is being run. The log is a cheap, clonable handle passed in
//! explicitly; a handle without a receiver silently drops entries. Entries
//! are mirrored to `tracing` either way.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

/// One line of device activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Activity {
    /// A command line about to run.
    Running(String),
    /// Non-empty output of the previous command.
    Output(String),
    /// Progress note from the dispatcher.
    Note(String),
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running(command) => write!(f, "Running: {command}"),
            Self::Output(output) => write!(f, "Output:\n{output}"),
            Self::Note(text) => f.write_str(text),
        }
    }
}

/// Receiving end of an activity channel.
pub type ActivityReceiver = mpsc::UnboundedReceiver<Activity>;

/// Clonable sink for [`Activity`] entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    sender: Option<mpsc::UnboundedSender<Activity>>,
}

impl ActivityLog {
    /// A log paired with its receiver.
    pub fn channel() -> (Self, ActivityReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// A log that only writes to `tracing`.
    pub fn discard() -> Self {
        Self::default()
    }

    pub fn emit(&self, activity: Activity) {
        if let Some(sender) = &self.sender {
            // Ignore error if the receiver is gone
            let _ = sender.send(activity);
        }
    }

    /// Record a command line before running it.
    pub fn running(&self, program: &str, args: &[String]) {
        let line = command_line(program, args);
        info!("Running: {line}");
        self.emit(Activity::Running(line));
    }

    /// Record command output. Empty output is not recorded.
    pub fn output(&self, output: &str) {
        if output.is_empty() {
            return;
        }
        info!("Output:\n{output}");
        self.emit(Activity::Output(output.to_string()));
    }

    pub fn note(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        self.emit(Activity::Note(text));
    }
}

/// `program` and `args` joined by single spaces.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
