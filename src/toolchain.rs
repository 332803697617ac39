//! Locates deployment executables on the command-search path and in
//! platform-conventional install directories, for tools (npm globals, npx
//! caches) that are routinely installed without ever touching `PATH`.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::contract::ToolLocator;

/// How a tool was found. Recorded so the dispatch transcript can say which
/// search produced the binary that was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    SearchPath,
    KnownDir,
}

/// A resolved executable. Recomputed on every dispatch attempt; installation
/// state may change between runs, so locations are never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolLocation {
    pub path: PathBuf,
    pub strategy: DiscoveryStrategy,
}

#[cfg(windows)]
const EXECUTABLE_SUFFIXES: &[&str] = &["", ".cmd", ".exe", ".bat"];
#[cfg(not(windows))]
const EXECUTABLE_SUFFIXES: &[&str] = &[""];

/// Resolver over `PATH` plus the fixed known-directory list.
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn resolve(&self, names: &[String]) -> Option<ToolLocation> {
        resolve_executable(names)
    }
}

/// First-found-wins search: every candidate name against the inherited
/// `PATH`, then every candidate name against the known install directories.
/// Candidate order and directory order are significant.
pub fn resolve_executable(names: &[String]) -> Option<ToolLocation> {
    for name in names {
        if let Some(path) = search_path_hit(name) {
            debug!(tool = %name, path = %path.display(), "Found executable on PATH");
            return Some(ToolLocation {
                path,
                strategy: DiscoveryStrategy::SearchPath,
            });
        }
    }

    let dirs = known_install_dirs();
    for name in names {
        for dir in &dirs {
            for suffix in EXECUTABLE_SUFFIXES {
                let candidate = dir.join(format!("{name}{suffix}"));
                if candidate.is_file() {
                    debug!(tool = %name, path = %candidate.display(), "Found executable in known install dir");
                    return Some(ToolLocation {
                        path: candidate,
                        strategy: DiscoveryStrategy::KnownDir,
                    });
                }
            }
        }
    }
    None
}

fn search_path_hit(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        for suffix in EXECUTABLE_SUFFIXES {
            let candidate = dir.join(format!("{name}{suffix}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Fixed, ordered list of directories where node-ecosystem tools end up when
/// installed per-user or by an ephemeral runner. Only existing directories
/// are returned; order is preserved and duplicates removed.
#[cfg(windows)]
fn known_install_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(appdata) = env::var_os("APPDATA") {
        dirs.push(Path::new(&appdata).join("npm"));
    }
    if let Some(localapp) = env::var_os("LOCALAPPDATA") {
        dirs.push(Path::new(&localapp).join("Programs").join("npm"));
        dirs.push(Path::new(&localapp).join("Programs").join("nodejs"));
    }
    if let Some(pf) = env::var_os("ProgramFiles") {
        dirs.push(Path::new(&pf).join("nodejs"));
    }
    if let Some(pf86) = env::var_os("ProgramFiles(x86)") {
        dirs.push(Path::new(&pf86).join("nodejs"));
    }
    if let Some(profile) = env::var_os("USERPROFILE") {
        dirs.push(
            Path::new(&profile)
                .join("AppData")
                .join("Roaming")
                .join("npm"),
        );
        // npx download cache for packages never installed globally
        dirs.push(Path::new(&profile).join(".npm").join("_npx"));
    }
    dedup_existing(dirs)
}

#[cfg(not(windows))]
fn known_install_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(home) = env::var_os("HOME") {
        let home = Path::new(&home);
        dirs.push(home.join(".npm-global").join("bin"));
        dirs.push(home.join(".local").join("bin"));
        // npx download cache for packages never installed globally
        dirs.push(home.join(".npm").join("_npx"));
    }
    dirs.push(PathBuf::from("/usr/local/bin"));
    dirs.push(PathBuf::from("/opt/homebrew/bin"));
    dedup_existing(dirs)
}

fn dedup_existing(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if dir.is_dir() && !seen.contains(&dir) {
            seen.push(dir);
        }
    }
    seen
}
