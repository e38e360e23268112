use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runs the binary against a throwaway vault
pub struct CliTestHarness {
    temp_dir: TempDir,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self { temp_dir }
    }

    /// A harness whose vault already holds `files` (relative path, content)
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let harness = Self::new();
        for (name, content) in files {
            let path = harness.path(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create directory");
            }
            fs::write(path, content).expect("Failed to write fixture");
        }
        harness
    }

    pub fn vault(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.vault().join(name)
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).expect("Failed to read document")
    }

    /// Configured through the environment only; running inside the vault
    /// keeps any checkline.toml in the source tree out of the picture.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("checkline").expect("Failed to find checkline binary");
        cmd.current_dir(self.vault())
            .env("CHECKLINE_VAULT", self.vault())
            .env("CHECKLINE_TIMEZONE", "UTC")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }
}

pub mod assertions {
    use predicates::prelude::*;

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error")
    }

    pub fn has_task_table_headers() -> impl Predicate<str> {
        predicate::str::contains("Line")
            .and(predicate::str::contains("Status"))
            .and(predicate::str::contains("Task"))
    }
}
