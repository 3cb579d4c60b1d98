//! Background loading of step databases.
//!
//! The [`LoadCoordinator`] runs the [`AggregationEngine`] on tokio's blocking
//! pool and reports back to its owner through a message queue:
//!
//! ```text
//! +------------------+   load(path)    +--------------------+
//! |      Owner       | --------------> |  spawn_blocking    |
//! | (single task)    |                 |  engine.load(path) |
//! |                  | <-------------- |                    |
//! +------------------+   LoadMessage   +--------------------+
//! ```
//!
//! Exactly one [`LoadMessage::Finished`] is posted per accepted load, even if
//! the blocking task panics. The owner hands it back to
//! [`LoadCoordinator::complete`], which frees the slot and yields the result.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dataset::Dataset;
use crate::engine::AggregationEngine;
use crate::error::DataError;

/// Messages posted to the owner's queue.
#[derive(Debug)]
pub enum LoadMessage {
    /// Informational status text.
    Status(String),
    /// The in-flight load has finished.
    Finished(LoadCompletion),
}

/// Terminal result of one load.
#[derive(Debug)]
pub struct LoadCompletion {
    /// Path that was loaded.
    pub path: PathBuf,
    /// The dataset, or why there is none.
    pub result: Result<Dataset, DataError>,
}

/// Errors returned when a load cannot be started.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A load is already in flight.
    #[error("A load of {} is already in progress", .0.display())]
    Busy(PathBuf),
}

struct InFlight {
    path: PathBuf,
    handle: JoinHandle<()>,
}

/// Owns at most one in-flight load.
///
/// `M` is the owner's message type; anything that can be built from a
/// [`LoadMessage`] works, so one queue can carry several producers.
pub struct LoadCoordinator<M> {
    engine: AggregationEngine,
    outbox: mpsc::UnboundedSender<M>,
    in_flight: Option<InFlight>,
}

impl<M> LoadCoordinator<M>
where
    M: From<LoadMessage> + Send + 'static,
{
    pub fn new(engine: AggregationEngine, outbox: mpsc::UnboundedSender<M>) -> Self {
        Self {
            engine,
            outbox,
            in_flight: None,
        }
    }

    /// True while a load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Path of the outstanding load, if any.
    pub fn loading_path(&self) -> Option<&Path> {
        self.in_flight.as_ref().map(|f| f.path.as_path())
    }

    /// Start loading `path` in the background.
    ///
    /// Must be called from within a tokio runtime. Loads are neither queued
    /// nor cancelled: a second call while one is outstanding is rejected.
    pub fn load(&mut self, path: impl Into<PathBuf>) -> Result<(), LoadError> {
        if let Some(current) = &self.in_flight {
            return Err(LoadError::Busy(current.path.clone()));
        }

        let path = path.into();
        info!("Loading {}", path.display());
        self.post(LoadMessage::Status(format!("Loading {}...", path.display())));

        let engine = self.engine;
        let outbox = self.outbox.clone();
        let worker_path = path.clone();

        let handle = tokio::spawn(async move {
            let blocking_path = worker_path.clone();
            let joined =
                tokio::task::spawn_blocking(move || engine.load(&blocking_path)).await;

            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(DataError::Worker(e.to_string())),
            };

            let completion = LoadCompletion {
                path: worker_path,
                result,
            };
            // Receiver gone means the owner shut down; nothing left to notify.
            let _ = outbox.send(LoadMessage::Finished(completion).into());
        });

        self.in_flight = Some(InFlight { path, handle });
        Ok(())
    }

    /// Retire the in-flight load and return its result.
    ///
    /// Emits the terminal status message. An empty source is reported
    /// separately from a failure but still returned as `Ok`.
    pub fn complete(&mut self, completion: LoadCompletion) -> Result<Dataset, DataError> {
        if let Some(done) = self.in_flight.take() {
            // The supervising task has already sent its only message.
            drop(done.handle);
        }

        let LoadCompletion { path, result } = completion;
        match &result {
            Ok(dataset) if dataset.is_empty() => {
                warn!("Database table is empty: {}", path.display());
                self.post(LoadMessage::Status(format!(
                    "No step data in {} (database table is empty)",
                    path.display()
                )));
            }
            Ok(dataset) => {
                info!(samples = dataset.len(), "Loaded {}", path.display());
                self.post(LoadMessage::Status(format!(
                    "Loaded successfully from {}",
                    path.display()
                )));
            }
            Err(e) => {
                error!(error = %e, "Error processing database {}", path.display());
                self.post(LoadMessage::Status(format!("Error: {e}")));
            }
        }
        result
    }

    fn post(&self, message: LoadMessage) {
        let _ = self.outbox.send(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OffsetSource;
    use rusqlite::Connection;
    use time::macros::offset;

    fn engine() -> AggregationEngine {
        AggregationEngine::new(OffsetSource::Fixed(offset!(UTC)))
    }

    fn source(dir: &tempfile::TempDir, rows: &[(i64, i64)]) -> PathBuf {
        let path = dir.path().join("Steps.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE StepsTable (_begin_time INTEGER, _steps INTEGER)")
            .unwrap();
        for (begin, steps) in rows {
            conn.execute(
                "INSERT INTO StepsTable (_begin_time, _steps) VALUES (?1, ?2)",
                [begin, steps],
            )
            .unwrap();
        }
        path
    }

    async fn next_finished(rx: &mut mpsc::UnboundedReceiver<LoadMessage>) -> LoadCompletion {
        loop {
            match rx.recv().await.expect("queue closed") {
                LoadMessage::Finished(done) => return done,
                LoadMessage::Status(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_load_delivers_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, &[(1_714_550_400_000, 120), (1_714_552_200_000, 80)]);
        let (tx, mut rx) = mpsc::unbounded_channel::<LoadMessage>();
        let mut coordinator = LoadCoordinator::new(engine(), tx);

        coordinator.load(&path).unwrap();
        assert!(coordinator.is_loading());

        match rx.recv().await.unwrap() {
            LoadMessage::Status(text) => assert!(text.starts_with("Loading")),
            other => panic!("expected status first, got {other:?}"),
        }

        let done = next_finished(&mut rx).await;
        let dataset = coordinator.complete(done).unwrap();
        assert!(!coordinator.is_loading());
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.summary().total_steps, 200);

        match rx.recv().await.unwrap() {
            LoadMessage::Status(text) => assert!(text.starts_with("Loaded successfully")),
            other => panic!("expected terminal status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_missing_path_reports_error_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel::<LoadMessage>();
        let mut coordinator = LoadCoordinator::new(engine(), tx);

        coordinator.load(dir.path().join("missing.db")).unwrap();
        let done = next_finished(&mut rx).await;
        let err = coordinator.complete(done).unwrap_err();
        assert!(matches!(err, DataError::SourceMissing(_)));

        // Only the terminal status may follow; no second completion.
        drop(coordinator);
        while let Some(msg) = rx.recv().await {
            assert!(matches!(msg, LoadMessage::Status(_)));
        }
    }

    #[tokio::test]
    async fn test_worker_failure_frees_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, &[(1_714_550_400_000, 1)]);
        let (tx, mut rx) = mpsc::unbounded_channel::<LoadMessage>();
        let mut coordinator = LoadCoordinator::new(engine(), tx);

        coordinator.load(&path).unwrap();
        // Stand in for a panicked worker: its completion carries no dataset.
        let real = next_finished(&mut rx).await;
        let failed = LoadCompletion {
            path: real.path,
            result: Err(DataError::Worker("task panicked".into())),
        };

        let err = coordinator.complete(failed).unwrap_err();
        assert!(matches!(err, DataError::Worker(_)));
        assert!(!coordinator.is_loading());
        match rx.recv().await.unwrap() {
            LoadMessage::Status(text) => assert!(text.contains("Load worker failed")),
            other => panic!("unexpected {other:?}"),
        }

        drop(coordinator);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_table_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, &[]);
        let (tx, mut rx) = mpsc::unbounded_channel::<LoadMessage>();
        let mut coordinator = LoadCoordinator::new(engine(), tx);

        coordinator.load(&path).unwrap();
        let done = next_finished(&mut rx).await;
        let dataset = coordinator.complete(done).unwrap();
        assert!(dataset.is_empty());

        match rx.recv().await.unwrap() {
            LoadMessage::Status(text) => assert!(text.contains("empty")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_load_while_busy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(&dir, &[(1_714_550_400_000, 1)]);
        let (tx, mut rx) = mpsc::unbounded_channel::<LoadMessage>();
        let mut coordinator = LoadCoordinator::new(engine(), tx);

        coordinator.load(&path).unwrap();
        let err = coordinator.load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Busy(ref p) if p == &path));
        assert_eq!(coordinator.loading_path(), Some(path.as_path()));

        let done = next_finished(&mut rx).await;
        coordinator.complete(done).unwrap();

        // Slot is free again.
        coordinator.load(&path).unwrap();
        let done = next_finished(&mut rx).await;
        assert!(coordinator.complete(done).is_ok());
    }
}
