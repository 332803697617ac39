//! Environmental parameter logging for an MRI suite.
//!
//! Readings go into a local SQLite store; every save rebuilds a
//! self-contained HTML dashboard (last reading, 30-day chart and history)
//! and pushes the publish directory to surge.sh through whichever transport
//! is available on the machine — the `surge` binary or `npx surge` — with
//! non-interactive login and a single background deploy at a time.

pub mod cli;
pub mod config;
pub mod contract;
pub mod dashboard;
pub mod deploy;
pub mod export;
pub mod load_config;
pub mod publish;
pub mod snapshot;
pub mod store;
pub mod toolchain;
