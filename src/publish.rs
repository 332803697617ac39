//! High-level publish pipeline: aggregate → render → commit on the caller's
//! context, then a single-slot background deploy.
//!
//! The foreground half must finish before any deploy starts, so the files on
//! disk are always consistent with the just-saved reading. The background
//! half is serialised through [`Publisher`]: a second trigger arriving while
//! a deploy is in flight queues strictly after it — two deploy subprocess
//! trees over the same publish directory can never overlap.

use std::fmt;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{oneshot, Semaphore};
use tracing::{error, info, warn};

use crate::contract::RecordStore;
use crate::dashboard::{self, RenderedDocument};
use crate::deploy::{DispatchOutcome, DispatchResult};
use crate::snapshot::{self, SnapshotError};
use crate::store::StoreError;

/// Fixed name of the publish directory under the application root.
pub const PUBLISH_DIR_NAME: &str = "dashboardmri";

/// Stable document name downstream tooling always finds.
pub const LATEST_FILE: &str = "dashboard_latest.html";

/// Entry-point name the hosting tool serves.
pub const INDEX_FILE: &str = "index.html";

/// Directory layout for one installation.
#[derive(Debug, Clone)]
pub struct PublishDirs {
    /// Where the dashboard files are committed and deployed from.
    pub publish_dir: PathBuf,
    /// Where user-supplied assets (the offline chart library) live.
    pub asset_dir: PathBuf,
}

impl PublishDirs {
    pub fn from_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            publish_dir: root.join(PUBLISH_DIR_NAME),
            asset_dir: root.to_path_buf(),
        }
    }
}

/// The three files a successful commit leaves behind, contents matching.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPaths {
    pub latest: PathBuf,
    pub archive: PathBuf,
    pub entry_point: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    CreateDir,
    WriteLatest,
    WriteArchive,
    MirrorIndex,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitStep::CreateDir => "creating the publish directory",
            CommitStep::WriteLatest => "writing the stable document",
            CommitStep::WriteArchive => "writing the archival copy",
            CommitStep::MirrorIndex => "mirroring the entry point",
        };
        f.write_str(name)
    }
}

/// A commit failure always names the step and the path that failed.
#[derive(Debug)]
pub struct CommitError {
    pub step: CommitStep,
    pub path: PathBuf,
    pub source: io::Error,
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed at {}: {}",
            self.step,
            self.path.display(),
            self.source
        )
    }
}

impl std::error::Error for CommitError {}

/// Writes the rendered document under its stable name and a second-precision
/// timestamped archive name, then mirrors the stable file to the hosting
/// entry point. Idempotent for identical documents apart from the archive
/// file name, which takes the commit time.
pub fn commit(doc: &RenderedDocument, publish_dir: &Path) -> Result<CommitPaths, CommitError> {
    fs::create_dir_all(publish_dir).map_err(|e| CommitError {
        step: CommitStep::CreateDir,
        path: publish_dir.to_path_buf(),
        source: e,
    })?;

    let latest = publish_dir.join(LATEST_FILE);
    fs::write(&latest, &doc.html).map_err(|e| CommitError {
        step: CommitStep::WriteLatest,
        path: latest.clone(),
        source: e,
    })?;

    let archive = publish_dir.join(format!(
        "dashboard_{}.html",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    fs::write(&archive, &doc.html).map_err(|e| CommitError {
        step: CommitStep::WriteArchive,
        path: archive.clone(),
        source: e,
    })?;

    let entry_point = publish_dir.join(INDEX_FILE);
    if let Err(copy_err) = fs::copy(&latest, &entry_point) {
        // Copy can fail on exotic filesystems; fall back to read-then-write.
        warn!(error = %copy_err, "Entry-point copy failed, retrying as read-then-write");
        let mirrored = fs::read(&latest).and_then(|bytes| fs::write(&entry_point, bytes));
        if let Err(e) = mirrored {
            return Err(CommitError {
                step: CommitStep::MirrorIndex,
                path: entry_point,
                source: e,
            });
        }
    }

    info!(
        latest = %latest.display(),
        archive = %archive.display(),
        entry_point = %entry_point.display(),
        "[PUBLISH] Dashboard committed"
    );
    Ok(CommitPaths {
        latest,
        archive,
        entry_point,
    })
}

#[derive(Debug)]
pub enum PublishError {
    /// No reading exists yet; the publish cycle does not start.
    NoData,
    Store(StoreError),
    Commit(CommitError),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NoData => write!(f, "no readings recorded yet, nothing to publish"),
            PublishError::Store(e) => write!(f, "could not read the log store: {e}"),
            PublishError::Commit(e) => write!(f, "could not commit the dashboard: {e}"),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<SnapshotError> for PublishError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::NoData => PublishError::NoData,
            SnapshotError::Store(e) => PublishError::Store(e),
        }
    }
}

impl From<CommitError> for PublishError {
    fn from(e: CommitError) -> Self {
        PublishError::Commit(e)
    }
}

/// Foreground half of a publish cycle: aggregate the snapshot, render the
/// dashboard and commit all three files. Fast and local; runs to completion
/// before any deploy is handed to the background.
pub fn prepare_dashboard(
    store: &dyn RecordStore,
    dirs: &PublishDirs,
    chart_offline: bool,
) -> Result<CommitPaths, PublishError> {
    let snapshot = snapshot::aggregate(store)?;
    let chart_source =
        dashboard::resolve_chart_source(&dirs.publish_dir, &dirs.asset_dir, chart_offline);
    let doc = dashboard::render(&snapshot, chart_source, Local::now().naive_local());
    let paths = commit(&doc, &dirs.publish_dir)?;
    Ok(paths)
}

/// Single-slot coordinator for the background deploy.
///
/// Every trigger spawns its own task, but all tasks funnel through one
/// semaphore permit, so deploys run strictly one at a time in arrival order
/// and each caller receives its own [`DispatchResult`] exactly once.
#[derive(Clone)]
pub struct Publisher {
    slot: Arc<Semaphore>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Whether a deploy currently holds the slot; drives the caller's
    /// ongoing-operation indication.
    pub fn in_flight(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Queues `work` behind any in-flight deploy and returns a ticket the
    /// caller can await for the result.
    pub fn trigger<F>(&self, work: F) -> PublishTicket
    where
        F: Future<Output = DispatchResult> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let permit = match slot.acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; treat it as shutdown.
                Err(_) => return,
            };
            let result = work.await;
            drop(permit);
            if tx.send(result).is_err() {
                warn!("[PUBLISH] Deploy result dropped: caller went away");
            }
        });
        PublishTicket { result: rx }
    }
}

/// Receives the deploy verdict exactly once.
pub struct PublishTicket {
    result: oneshot::Receiver<DispatchResult>,
}

impl PublishTicket {
    /// Waits for the in-flight deploy to deliver its result. A task that
    /// died before reporting counts as a failed dispatch.
    pub async fn wait(self) -> DispatchResult {
        match self.result.await {
            Ok(result) => result,
            Err(_) => {
                error!("[PUBLISH][ERROR] Deploy task ended without reporting a result");
                DispatchResult {
                    success: false,
                    outcome: DispatchOutcome::Failed,
                    transcript: "deploy task ended without reporting a result\n".to_string(),
                }
            }
        }
    }
}
