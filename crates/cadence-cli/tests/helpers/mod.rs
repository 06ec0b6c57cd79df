#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness running the CLI inside an isolated working directory
pub struct CliTestHarness {
    temp_dir: TempDir,
}

impl CliTestHarness {
    /// Create a new test harness with an empty temporary working directory
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self { temp_dir }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        // No cadence.toml in the working directory, and a fixed zone
        cmd.current_dir(self.temp_dir.path());
        cmd.env("CADENCE_DEFAULT_TIMEZONE", "UTC");
        cmd.env_remove("CADENCE_DISPLAY_TIMEZONE");
        cmd.env_remove("RUST_LOG");

        cmd
    }

    /// Write a file into the working directory and return its path
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Write recurrence lines into the working directory
    pub fn write_set(&self, name: &str, lines: &[&str]) -> String {
        let path = self.write_file(name, &lines.join("\n"));
        path.to_string_lossy().into_owned()
    }

    /// Read a file from the working directory
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.temp_dir.path().join(name)).expect("Failed to read test file")
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }
}

/// Common recurrence fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Mondays and Wednesdays at 09:00 UTC, six occurrences
    pub fn weekly_set() -> Vec<&'static str> {
        vec!["DTSTART:20250106T090000Z", "RRULE:FREQ=WEEKLY;BYDAY=MO,WE;COUNT=6"]
    }

    /// A monthly rule whose DTSTART falls the day after its BYMONTHDAY
    pub fn misaligned_set() -> Vec<&'static str> {
        vec!["DTSTART:20240122T090000Z", "RRULE:FREQ=MONTHLY;BYMONTHDAY=21"]
    }

    /// Daily until the end of January 2024
    pub fn daily_until_set() -> Vec<&'static str> {
        vec![
            "DTSTART:20240101T000000Z",
            "RRULE:FREQ=DAILY;UNTIL=20240131T235959Z",
        ]
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check if output contains the occurrence table headers
    pub fn has_occurrence_table_headers() -> impl Predicate<str> {
        predicate::str::contains("Occurrence")
            .and(predicate::str::contains("Day"))
            .and(predicate::str::contains("Relative"))
    }

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
