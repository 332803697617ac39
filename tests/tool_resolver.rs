use std::env;
use std::fs;

use serial_test::serial;
use tempfile::tempdir;

use mri_envlog::contract::ToolLocator;
use mri_envlog::toolchain::{resolve_executable, DiscoveryStrategy, PathLocator};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

struct EnvGuard {
    key: &'static str,
    previous: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &std::ffi::OsStr) -> Self {
        let previous = env::var_os(key);
        env::set_var(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => env::set_var(self.key, value),
            None => env::remove_var(self.key),
        }
    }
}

#[test]
#[serial]
fn finds_executable_on_the_search_path() {
    let bin_dir = tempdir().expect("tempdir");
    fs::write(bin_dir.path().join("surge"), "#!/bin/sh\n").expect("fake tool");
    let _path = EnvGuard::set("PATH", bin_dir.path().as_os_str());

    let location = resolve_executable(&names(&["surge"])).expect("tool found");
    assert_eq!(location.strategy, DiscoveryStrategy::SearchPath);
    assert_eq!(location.path, bin_dir.path().join("surge"));
}

#[test]
#[serial]
#[cfg(not(windows))]
fn probes_known_install_dirs_when_not_on_path() {
    let empty = tempdir().expect("tempdir");
    let home = tempdir().expect("tempdir");
    let npm_bin = home.path().join(".npm-global").join("bin");
    fs::create_dir_all(&npm_bin).expect("create npm bin dir");
    fs::write(npm_bin.join("surge"), "#!/bin/sh\n").expect("fake tool");

    let _path = EnvGuard::set("PATH", empty.path().as_os_str());
    let _home = EnvGuard::set("HOME", home.path().as_os_str());

    let location = resolve_executable(&names(&["surge"])).expect("tool found");
    assert_eq!(location.strategy, DiscoveryStrategy::KnownDir);
    assert_eq!(location.path, npm_bin.join("surge"));
}

#[test]
#[serial]
fn candidate_order_decides_between_two_hits() {
    let bin_dir = tempdir().expect("tempdir");
    fs::write(bin_dir.path().join("surge"), "#!/bin/sh\n").expect("fake surge");
    fs::write(bin_dir.path().join("npx"), "#!/bin/sh\n").expect("fake npx");
    let _path = EnvGuard::set("PATH", bin_dir.path().as_os_str());

    let first = resolve_executable(&names(&["surge", "npx"])).expect("found");
    assert_eq!(first.path, bin_dir.path().join("surge"));

    let reversed = resolve_executable(&names(&["npx", "surge"])).expect("found");
    assert_eq!(reversed.path, bin_dir.path().join("npx"));
}

#[test]
#[serial]
#[cfg(not(windows))]
fn single_match_is_found_regardless_of_directory_order() {
    // Only one directory holds the tool: reordering PATH entries must not
    // change the outcome.
    let holds_tool = tempdir().expect("tempdir");
    let empty = tempdir().expect("tempdir");
    fs::write(holds_tool.path().join("surge"), "#!/bin/sh\n").expect("fake tool");

    let ordered = env::join_paths([holds_tool.path(), empty.path()]).expect("join");
    let _path = EnvGuard::set("PATH", &ordered);
    let found_first = resolve_executable(&names(&["surge"])).expect("found");

    let reversed = env::join_paths([empty.path(), holds_tool.path()]).expect("join");
    env::set_var("PATH", &reversed);
    let found_second = resolve_executable(&names(&["surge"])).expect("found");

    assert_eq!(found_first.path, found_second.path);
}

#[test]
#[serial]
#[cfg(not(windows))]
fn exhausted_search_returns_none() {
    let empty = tempdir().expect("tempdir");
    let home = tempdir().expect("tempdir");
    let _path = EnvGuard::set("PATH", empty.path().as_os_str());
    let _home = EnvGuard::set("HOME", home.path().as_os_str());

    assert!(resolve_executable(&names(&["surge", "npx"])).is_none());
}

#[test]
#[serial]
fn locator_trait_goes_through_the_same_search() {
    let bin_dir = tempdir().expect("tempdir");
    fs::write(bin_dir.path().join("npx"), "#!/bin/sh\n").expect("fake npx");
    let _path = EnvGuard::set("PATH", bin_dir.path().as_os_str());

    let locator = PathLocator;
    let location = locator.resolve(&names(&["npx"])).expect("found via trait");
    assert_eq!(location.path, bin_dir.path().join("npx"));
}
