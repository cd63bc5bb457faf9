//! SQLite output backend (feature `sqlite`).
//!
//! Creates a single `output.db` file in the configured output directory with
//! two tables: `rows` and `row_values`.

use std::path::Path;

use rusqlite::Connection;

use crate::writer::OutputWriter;
use crate::{OutputResult, RowRecord, ValueRecord};

/// Writes data rows to an SQLite database.
pub struct SqliteWriter {
    conn: Connection,
}

impl SqliteWriter {
    /// Open (or create) `output.db` in `dir` and initialise the schema.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        let conn = Connection::open(dir.join("output.db"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS rows (
                 row          INTEGER NOT NULL,
                 tick         INTEGER NOT NULL,
                 model_time   REAL    NOT NULL,
                 wall_time_ms INTEGER NOT NULL,
                 seed         INTEGER NOT NULL,
                 flags        INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS row_values (
                 row   INTEGER NOT NULL,
                 kind  TEXT    NOT NULL,
                 name  TEXT    NOT NULL,
                 value TEXT    NOT NULL
             );",
        )?;

        Ok(Self { conn })
    }
}

impl OutputWriter for SqliteWriter {
    fn write_row(&mut self, row: &RowRecord) -> OutputResult<()> {
        self.conn.execute(
            "INSERT INTO rows (row, tick, model_time, wall_time_ms, seed, flags) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                row.row as i64,
                row.tick as i64,
                row.model_time,
                row.wall_time_ms as i64,
                // Seeds use the full u64 range; stored as the same bits.
                row.seed as i64,
                row.flags.bits(),
            ],
        )?;
        Ok(())
    }

    fn write_values(&mut self, values: &[ValueRecord]) -> OutputResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO row_values (row, kind, name, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for v in values {
                stmt.execute(rusqlite::params![v.row as i64, v.kind, v.name, v.value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
