//! # contract: seams between the publishing pipeline and its collaborators
//!
//! This module defines the traits the orchestration code depends on, plus the
//! plain data types they exchange. Each trait has a production implementor
//! elsewhere in the crate and a `mockall`-generated mock for tests:
//!
//! - [`RecordStore`] — the reading store ([`crate::store::LogStore`]).
//! - [`ToolLocator`] — executable discovery ([`crate::toolchain::PathLocator`]).
//! - [`CommandRunner`] — subprocess execution ([`crate::deploy::TokioCommandRunner`]).
//!
//! The mocks are exported behind the default-on `test-export-mocks` feature so
//! integration tests in `tests/` can drive the dispatcher without spawning a
//! single real process.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use mockall::automock;

use crate::store::{NewReading, Reading, StoreError};
use crate::toolchain::ToolLocation;

/// Reading persistence, as consumed by the publishing pipeline.
///
/// Range bounds are inclusive; an omitted bound leaves that side unbounded.
/// Results are always ordered by timestamp ascending.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait RecordStore: Send {
    /// Persist a reading, stamping the current time at second precision.
    fn insert(&self, reading: NewReading) -> Result<Reading, StoreError>;

    /// The most recent reading, if any exist.
    fn latest(&self) -> Result<Option<Reading>, StoreError>;

    /// All readings with timestamp in `[start, end]`, ascending.
    fn query_range(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<Reading>, StoreError>;
}

/// Executable discovery. Implementations must honour candidate order
/// (first-found wins) and must not cache results across calls.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ToolLocator: Send + Sync {
    fn resolve(&self, names: &[String]) -> Option<ToolLocation>;
}

/// One subprocess call: argv, optional text fed to stdin, and the bounded
/// timeout after which the child is forcibly terminated.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub input: Option<String>,
    pub timeout: Duration,
}

/// Outcome of a subprocess call. `output` is the combined stdout/stderr
/// capture; launch failures and timeouts are reported here rather than as
/// errors, so every attempt lands in the dispatch transcript the same way.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub timed_out: bool,
    pub output: String,
}

/// Subprocess execution seam. The production implementation never lets the
/// child touch an interactive console and never applies shell interpretation
/// to arguments.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: ToolInvocation) -> CommandOutput;
}
