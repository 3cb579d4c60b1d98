//! Expected layout of the device step database.

use rusqlite::Connection;

use crate::error::{DataError, Result};

/// Table holding raw step samples.
pub const STEPS_TABLE: &str = "StepsTable";
/// Window start, epoch milliseconds.
pub const BEGIN_TIME_COLUMN: &str = "_begin_time";
/// Steps counted in the window.
pub const STEPS_COLUMN: &str = "_steps";

/// Check that the source has the steps table with both columns.
pub fn verify(conn: &Connection) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
        [STEPS_TABLE],
        |row| row.get(0),
    )?;

    if !exists {
        return Err(DataError::Schema(format!("missing table {STEPS_TABLE}")));
    }

    let columns = table_columns(conn, STEPS_TABLE)?;
    let missing: Vec<&str> = [BEGIN_TIME_COLUMN, STEPS_COLUMN]
        .into_iter()
        .filter(|c| !columns.iter().any(|have| have == c))
        .collect();

    if !missing.is_empty() {
        return Err(DataError::Schema(format!(
            "table {STEPS_TABLE} is missing column(s) {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Column names of `table`.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(columns)
}

/// SQL selecting every sample, oldest first.
pub(crate) fn select_samples_sql() -> String {
    format!(
        "SELECT {BEGIN_TIME_COLUMN}, {STEPS_COLUMN} FROM {STEPS_TABLE} ORDER BY {BEGIN_TIME_COLUMN}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_device_layout() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE StepsTable (_id INTEGER PRIMARY KEY, _begin_time INTEGER,
             _end_time INTEGER, _mode INTEGER, _steps INTEGER)",
        )
        .unwrap();
        verify(&conn).unwrap();
    }

    #[test]
    fn test_verify_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = verify(&conn).unwrap_err();
        assert!(matches!(err, DataError::Schema(ref m) if m.contains("missing table")));
    }

    #[test]
    fn test_verify_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE StepsTable (_begin_time INTEGER, steps INTEGER)")
            .unwrap();
        let err = verify(&conn).unwrap_err();
        assert!(matches!(err, DataError::Schema(ref m) if m.contains("_steps")));
    }
}
