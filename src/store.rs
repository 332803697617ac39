//! SQLite-backed record store for environmental readings.
//!
//! Timestamps are persisted in the canonical text form `%Y-%m-%d %H:%M:%S`,
//! which sorts lexicographically in chronological order, so range filters run
//! directly on the stored text like the rest of the tooling expects.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::contract::RecordStore;

/// Canonical on-disk timestamp format; second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DB_FILE_NAME: &str = "mr_envlog.db";

/// Upper bound on the operator identifier, enforced on insert.
pub const OPERATOR_MAX_LEN: usize = 10;

/// Two-token status field (helium level ok, forced extraction ok).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    Si,
    No,
}

impl StatusFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusFlag::Si => "SI",
            StatusFlag::No => "NO",
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SI" => Ok(StatusFlag::Si),
            "NO" => Ok(StatusFlag::No),
            other => Err(format!("expected SI or NO, got '{other}'")),
        }
    }
}

/// A reading as returned by the store. No field is ever null.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub o2: f64,
    pub rh1: f64,
    pub temp1: f64,
    pub rh2: f64,
    pub temp2: f64,
    pub elio_ok: StatusFlag,
    pub aspirazione_ok: StatusFlag,
    pub operatore: String,
}

/// A reading as submitted by the caller; the store stamps the timestamp.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub o2: f64,
    pub rh1: f64,
    pub temp1: f64,
    pub rh2: f64,
    pub temp2: f64,
    pub elio_ok: StatusFlag,
    pub aspirazione_ok: StatusFlag,
    pub operatore: String,
}

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// A persisted value could not be decoded into the typed model.
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "database error: {e}"),
            StoreError::Io(e) => write!(f, "database file error: {e}"),
            StoreError::Decode(msg) => write!(f, "corrupt record: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

const SELECT_COLUMNS: &str =
    "timestamp, o2, rh1, temp1, rh2, temp2, elio_ok, aspirazione_ok, operatore";

/// Store handle owning the SQLite connection.
pub struct LogStore {
    conn: Connection,
    path: PathBuf,
}

impl LogStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                o2 REAL NOT NULL,
                rh1 REAL NOT NULL,
                temp1 REAL NOT NULL,
                rh2 REAL NOT NULL,
                temp2 REAL NOT NULL,
                elio_ok TEXT NOT NULL CHECK(elio_ok IN ('SI','NO')),
                aspirazione_ok TEXT NOT NULL CHECK(aspirazione_ok IN ('SI','NO')),
                operatore TEXT NOT NULL
            )",
            [],
        )?;
        debug!(path = %path.display(), "Opened log store");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies the database file to `dest` as a backup.
    pub fn backup_to<P: AsRef<Path>>(&self, dest: P) -> Result<(), StoreError> {
        let dest = dest.as_ref();
        fs::copy(&self.path, dest)?;
        info!(from = %self.path.display(), to = %dest.display(), "Database backed up");
        Ok(())
    }

    /// Replaces the database at `db_path` with the backup at `src`.
    ///
    /// Must be called while no store handle is open on `db_path`.
    pub fn restore_from<P: AsRef<Path>, Q: AsRef<Path>>(
        src: P,
        db_path: Q,
    ) -> Result<(), StoreError> {
        let src = src.as_ref();
        let db_path = db_path.as_ref();
        fs::copy(src, db_path)?;
        info!(from = %src.display(), to = %db_path.display(), "Database restored from backup");
        Ok(())
    }

    fn rows_to_readings(
        &self,
        sql: &str,
        bind: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Reading>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(bind, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut readings = Vec::new();
        for row in rows {
            let (ts, o2, rh1, temp1, rh2, temp2, elio, aspirazione, operatore) = row?;
            readings.push(Reading {
                timestamp: parse_timestamp(&ts)?,
                o2,
                rh1,
                temp1,
                rh2,
                temp2,
                elio_ok: parse_flag(&elio)?,
                aspirazione_ok: parse_flag(&aspirazione)?,
                operatore,
            });
        }
        Ok(readings)
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Decode(format!("bad timestamp '{raw}': {e}")))
}

fn parse_flag(raw: &str) -> Result<StatusFlag, StoreError> {
    raw.parse().map_err(StoreError::Decode)
}

impl RecordStore for LogStore {
    fn insert(&self, reading: NewReading) -> Result<Reading, StoreError> {
        let operatore: String = reading
            .operatore
            .trim()
            .chars()
            .take(OPERATOR_MAX_LEN)
            .collect();

        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.conn.execute(
            "INSERT INTO logs (timestamp, o2, rh1, temp1, rh2, temp2, elio_ok, aspirazione_ok, operatore)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                stamp,
                reading.o2,
                reading.rh1,
                reading.temp1,
                reading.rh2,
                reading.temp2,
                reading.elio_ok.as_str(),
                reading.aspirazione_ok.as_str(),
                operatore,
            ],
        )?;
        info!(timestamp = %stamp, operatore = %operatore, "Reading recorded");

        Ok(Reading {
            timestamp: parse_timestamp(&stamp)?,
            o2: reading.o2,
            rh1: reading.rh1,
            temp1: reading.temp1,
            rh2: reading.rh2,
            temp2: reading.temp2,
            elio_ok: reading.elio_ok,
            aspirazione_ok: reading.aspirazione_ok,
            operatore,
        })
    }

    fn latest(&self) -> Result<Option<Reading>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM logs ORDER BY timestamp DESC LIMIT 1"
        );
        Ok(self.rows_to_readings(&sql, &[])?.into_iter().next())
    }

    fn query_range(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Reading>, StoreError> {
        let start = start.map(|t| t.format(TIMESTAMP_FORMAT).to_string());
        let end = end.map(|t| t.format(TIMESTAMP_FORMAT).to_string());

        // Bounds are inclusive; an omitted bound leaves that side unbounded.
        match (&start, &end) {
            (Some(s), Some(e)) => self.rows_to_readings(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM logs \
                     WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp ASC"
                ),
                params![s, e],
            ),
            (Some(s), None) => self.rows_to_readings(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM logs \
                     WHERE timestamp >= ?1 ORDER BY timestamp ASC"
                ),
                params![s],
            ),
            (None, Some(e)) => self.rows_to_readings(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM logs \
                     WHERE timestamp <= ?1 ORDER BY timestamp ASC"
                ),
                params![e],
            ),
            (None, None) => self.rows_to_readings(
                &format!("SELECT {SELECT_COLUMNS} FROM logs ORDER BY timestamp ASC"),
                &[],
            ),
        }
    }
}
