//! Step-count loading and aggregation.
//!
//! This crate reads the step database pulled from a phone and builds
//! hourly, daily, monthly and yearly step totals from it, off the caller's
//! task.
//!
//! # Features
//!
//! - Read-only access to the device's `StepsTable`
//! - Timezone-aware bucketing with a single offset per load
//! - Sparse aggregate indices with zero-filled series queries
//! - Background loading with exactly-once completion delivery
//!
//! # Example
//!
//! ```no_run
//! use stepsync_store::{AggregationEngine, OffsetSource};
//!
//! let engine = AggregationEngine::new(OffsetSource::Local);
//! let dataset = engine.load("Steps.db".as_ref())?;
//!
//! if let Some(day) = dataset.latest_date() {
//!     println!("{day}: {} steps", dataset.steps_on(day));
//! }
//! # Ok::<(), stepsync_store::DataError>(())
//! ```

mod coordinator;
mod dataset;
mod engine;
mod error;
mod models;
pub mod schema;

pub use coordinator::{LoadCompletion, LoadCoordinator, LoadError, LoadMessage};
pub use dataset::{Dataset, DatasetBuilder, HourKey};
pub use engine::{AggregationEngine, OffsetSource};
pub use error::{DataError, Result};
pub use models::{DatasetSummary, MonthKey, Sample, SeriesStats};
