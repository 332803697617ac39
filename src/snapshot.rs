//! Aggregates the latest reading plus its trailing 30-day window into the
//! in-memory snapshot the dashboard is rendered from.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::contract::RecordStore;
use crate::store::{Reading, StoreError};

/// Fixed 30×24h window; calendar-independent by design of the offset.
pub const WINDOW_DAYS: i64 = 30;

/// Input to one render: built fresh per publish cycle, discarded afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub latest: Reading,
    pub window_start: NaiveDateTime,
    /// Readings in `[window_start, latest.timestamp]`, ascending.
    pub window: Vec<Reading>,
}

#[derive(Debug)]
pub enum SnapshotError {
    /// The store holds no readings yet; there is nothing to publish.
    NoData,
    Store(StoreError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::NoData => write!(f, "no readings recorded yet"),
            SnapshotError::Store(e) => write!(f, "failed to read the log store: {e}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<StoreError> for SnapshotError {
    fn from(e: StoreError) -> Self {
        SnapshotError::Store(e)
    }
}

/// Builds a [`Snapshot`] from the store. Read-only; fails with
/// [`SnapshotError::NoData`] when the store is empty.
pub fn aggregate(store: &dyn RecordStore) -> Result<Snapshot, SnapshotError> {
    let latest = store.latest()?.ok_or(SnapshotError::NoData)?;
    let window_start = latest.timestamp - Duration::days(WINDOW_DAYS);
    let window = store.query_range(Some(window_start), Some(latest.timestamp))?;

    info!(
        latest = %latest.timestamp,
        window_start = %window_start,
        readings = window.len(),
        "[PUBLISH] Snapshot aggregated"
    );

    Ok(Snapshot {
        latest,
        window_start,
        window,
    })
}
