use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use apm_release_process::Sink;

/// Display name of the artifact kind this plugin publishes.
pub const ARTIFACT_KIND: &str = "Atom package";

/// The release being cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextRelease {
    pub version: String,
    /// Git tag of the release; `v<version>` when absent.
    #[serde(default)]
    pub git_tag: Option<String>,
}

impl NextRelease {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            git_tag: None,
        }
    }

    pub fn with_git_tag(mut self, tag: impl Into<String>) -> Self {
        self.git_tag = Some(tag.into());
        self
    }

    pub fn tag(&self) -> String {
        self.git_tag
            .clone()
            .unwrap_or_else(|| format!("v{}", self.version))
    }
}

/// Inputs for one lifecycle call, supplied fresh by the driver.
#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub cwd: PathBuf,
    /// Layered over the process environment for every subprocess.
    pub env: BTreeMap<String, String>,
    pub stdout: Sink,
    pub stderr: Sink,
    /// Required by `prepare` and `publish`.
    pub next_release: Option<NextRelease>,
}

impl ReleaseContext {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: BTreeMap::new(),
            stdout: Sink::stdout(),
            stderr: Sink::stderr(),
            next_release: None,
        }
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_sinks(mut self, stdout: Sink, stderr: Sink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn with_next_release(mut self, release: NextRelease) -> Self {
        self.next_release = Some(release);
        self
    }

    pub fn release(&self) -> Result<&NextRelease> {
        self.next_release
            .as_ref()
            .ok_or_else(|| anyhow!("no release version was provided for this phase"))
    }
}

/// Descriptor of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub name: String,
    pub url: String,
}
