//! Common test utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Get the path to the shared fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("lobster-core")
        .join("tests")
        .join("fixtures")
}

/// Create a temporary directory holding a copy of the fixture project.
pub fn create_temp_project() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let fixtures = fixtures_dir();

    for name in ["lobster.conf", "reqs.lobster", "code.lobster", "tests.lobster"] {
        std::fs::copy(fixtures.join(name), temp.path().join(name))
            .unwrap_or_else(|e| panic!("Failed to copy {name}: {e}"));
    }

    temp
}

/// The lobster binary, run inside `dir`.
pub fn lobster_bin(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lobster"));
    cmd.current_dir(dir).env_remove("LOBSTER_LOG");
    cmd
}
