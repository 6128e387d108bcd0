//! Fake `apm` / `npm` executables and a collecting reporter for tests.
//!
//! The fakes are put on a `PATH` carried by the release context, so tests
//! never touch the process environment and can run in parallel.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::lifecycle::Reporter;
use crate::manifest::MANIFEST_FILE;

pub(crate) const FAKE_APM: &str = "#!/bin/sh\n\
if [ -n \"$FAKE_TOOL_LOG\" ]; then\n  echo \"apm $*\" >>\"$FAKE_TOOL_LOG\"\nfi\n\
if [ \"$1\" = \"-v\" ]; then\n  echo 'apm  2.6.2'\n  exit \"${FAKE_APM_PROBE_EXIT:-0}\"\nfi\n\
echo \"Publishing $3\"\n\
echo 'apm progress' >&2\n\
if [ -n \"$FAKE_APM_STDERR\" ]; then\n  echo \"$FAKE_APM_STDERR\" >&2\nfi\n\
exit \"${FAKE_APM_EXIT:-0}\"\n";

pub(crate) const FAKE_NPM: &str = "#!/bin/sh\n\
if [ -n \"$FAKE_TOOL_LOG\" ]; then\n  echo \"npm $*\" >>\"$FAKE_TOOL_LOG\"\nfi\n\
echo \"v$2\"\n\
if [ -n \"$FAKE_NPM_STDERR\" ]; then\n  echo \"$FAKE_NPM_STDERR\" >&2\nfi\n\
exit \"${FAKE_NPM_EXIT:-0}\"\n";

pub(crate) struct FakeTools {
    dir: TempDir,
    log: PathBuf,
}

impl FakeTools {
    pub(crate) fn install() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        write_executable(&dir.path().join("apm"), FAKE_APM);
        write_executable(&dir.path().join("npm"), FAKE_NPM);
        let log = dir.path().join("calls.log");
        Self { dir, log }
    }

    pub(crate) fn bin_dir(&self) -> &Path {
        self.dir.path()
    }

    /// `PATH` restricted to the fakes, plus the call log location.
    pub(crate) fn env(&self) -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), self.bin_dir().display().to_string()),
            ("FAKE_TOOL_LOG".to_string(), self.log.display().to_string()),
        ]
    }

    /// Every recorded invocation, in order, as `"<tool> <args>"`.
    pub(crate) fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn write_executable(path: &Path, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, script).expect("write fake tool");
    let mut perms = fs::metadata(path).expect("meta").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}

#[cfg(not(unix))]
fn write_executable(path: &Path, script: &str) {
    fs::write(path, script).expect("write fake tool");
}

/// A `PATH` on which nothing can be found.
pub(crate) fn empty_path() -> (TempDir, (String, String)) {
    let dir = tempfile::tempdir().expect("tempdir");
    let var = ("PATH".to_string(), dir.path().display().to_string());
    (dir, var)
}

pub(crate) fn write_manifest(dir: &Path, content: &str) {
    fs::write(dir.join(MANIFEST_FILE), content).expect("write manifest");
}

pub(crate) fn read_manifest(dir: &Path) -> String {
    fs::read_to_string(dir.join(MANIFEST_FILE)).expect("read manifest")
}

pub(crate) fn manifest_version(dir: &Path) -> Option<String> {
    let value: serde_json::Value =
        serde_json::from_str(&read_manifest(dir)).expect("manifest json");
    value
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[derive(Default)]
pub(crate) struct CollectingReporter {
    pub(crate) infos: Vec<String>,
    pub(crate) warns: Vec<String>,
    pub(crate) errors: Vec<String>,
}

impl Reporter for CollectingReporter {
    fn info(&mut self, msg: &str) {
        self.infos.push(msg.to_string());
    }

    fn warn(&mut self, msg: &str) {
        self.warns.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }
}
