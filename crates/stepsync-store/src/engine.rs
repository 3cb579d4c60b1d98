//! Aggregation engine: read a step database and build a [`Dataset`].

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use time::UtcOffset;
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, DatasetBuilder};
use crate::error::{DataError, Result};
use crate::models::Sample;
use crate::schema;

/// Where the engine takes its UTC offset from.
///
/// The offset is resolved once per load and applied to every sample, so
/// samples recorded under a different daylight-saving offset than the one in
/// effect at load time land one hour off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetSource {
    /// The process's local zone at the moment the load starts.
    #[default]
    Local,
    /// A fixed offset.
    Fixed(UtcOffset),
}

impl OffsetSource {
    /// Resolve to a concrete offset.
    pub fn resolve(&self) -> Result<UtcOffset> {
        match self {
            Self::Fixed(offset) => Ok(*offset),
            Self::Local => {
                let seconds = chrono::Local::now().offset().local_minus_utc();
                UtcOffset::from_whole_seconds(seconds)
                    .map_err(|e| DataError::InvalidOffset(e.to_string()))
            }
        }
    }
}

/// Loads a source database and aggregates it. Holds no state between loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregationEngine {
    offset: OffsetSource,
}

impl AggregationEngine {
    pub fn new(offset: OffsetSource) -> Self {
        Self { offset }
    }

    /// Read every sample from `path` and build all aggregate indices.
    ///
    /// An existing but empty steps table yields an empty dataset.
    pub fn load(&self, path: &Path) -> Result<Dataset> {
        if !path.exists() {
            return Err(DataError::SourceMissing(path.to_path_buf()));
        }

        info!("Connecting to database: {}", path.display());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        schema::verify(&conn)?;

        let offset = self.offset.resolve()?;
        debug!(%offset, "Bucketing samples");

        let dataset = aggregate(&conn, offset)?.with_source(path.to_path_buf());

        if dataset.is_empty() {
            warn!("Database table is empty: {}", path.display());
        } else {
            info!(
                samples = dataset.len(),
                days = dataset.daily().len(),
                "Data processing complete"
            );
        }

        Ok(dataset)
    }
}

fn aggregate(conn: &Connection, offset: UtcOffset) -> Result<Dataset> {
    let mut stmt = conn.prepare(&schema::select_samples_sql())?;
    let mut rows = stmt.query([])?;
    let mut builder = DatasetBuilder::new(offset);

    while let Some(row) = rows.next()? {
        let timestamp_ms: i64 = row.get(0)?;
        let steps: i64 = row.get(1)?;
        builder.push(Sample::from_row(timestamp_ms, steps)?)?;
    }

    Ok(builder.finish())
}
