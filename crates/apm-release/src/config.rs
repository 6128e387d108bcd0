//! Configuration file support for apm-release (`.apm-release.toml`).
//!
//! Every field has a default, so a missing file and an empty file behave the
//! same. The lifecycle receives a [`PluginConfig`] in every phase.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = ".apm-release.toml";

/// Environment variable holding the apm registry token.
pub const DEFAULT_TOKEN_ENV: &str = "ATOM_ACCESS_TOKEN";

/// Environment variable `apm` itself reads to locate the registry API.
pub const API_URL_ENV: &str = "ATOM_API_URL";

const DEFAULT_WEB_BASE: &str = "https://atom.io";
const DEFAULT_API_BASE: &str = "https://atom.io/api";

/// Registry endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base of public package pages; the publish result URL is
    /// `<web_base>/packages/<name>`.
    #[serde(default = "default_web_base")]
    pub web_base: String,

    /// Base of the package API. Falls back to `$ATOM_API_URL`, then
    /// `https://atom.io/api`.
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            web_base: default_web_base(),
            api_base: None,
        }
    }
}

impl RegistryConfig {
    /// Public page of a package.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/packages/{}", self.web_base.trim_end_matches('/'), name)
    }

    /// Resolve the API base against the release environment.
    pub fn resolve_api_base(&self, env: &BTreeMap<String, String>) -> String {
        self.api_base
            .clone()
            .or_else(|| {
                env.get(API_URL_ENV)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }
}

/// Post-publish visibility check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default)]
    pub enabled: bool,

    /// How long to wait for the version to show up on the registry
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    #[serde(default = "default_readiness_timeout")]
    pub timeout: Duration,

    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: default_readiness_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Nested output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of trailing stderr lines quoted when a tool fails
    #[serde(default = "default_output_lines")]
    pub lines: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            lines: default_output_lines(),
        }
    }
}

/// Per-invocation plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Environment variable the registry token is read from
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// `apm` executable (name looked up on `PATH`, or a path)
    #[serde(default = "default_apm_bin")]
    pub apm_bin: String,

    /// `npm` executable used for `npm version`
    #[serde(default = "default_npm_bin")]
    pub npm_bin: String,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            apm_bin: default_apm_bin(),
            npm_bin: default_npm_bin(),
            registry: RegistryConfig::default(),
            readiness: ReadinessConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_apm_bin() -> String {
    "apm".to_string()
}

fn default_npm_bin() -> String {
    "npm".to_string()
}

fn default_web_base() -> String {
    DEFAULT_WEB_BASE.to_string()
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_output_lines() -> usize {
    50
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl PluginConfig {
    /// Load configuration from `dir` by looking for `.apm-release.toml`.
    ///
    /// Returns `Ok(None)` if no config file exists.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&config_path).map(Some)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: PluginConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.token_env.trim().is_empty() {
            bail!("token_env cannot be empty");
        }

        if self.apm_bin.trim().is_empty() {
            bail!("apm_bin cannot be empty");
        }

        if self.npm_bin.trim().is_empty() {
            bail!("npm_bin cannot be empty");
        }

        if self.registry.web_base.trim().is_empty() {
            bail!("registry.web_base cannot be empty");
        }

        if let Some(api_base) = &self.registry.api_base
            && api_base.trim().is_empty()
        {
            bail!("registry.api_base cannot be empty when set");
        }

        if self.readiness.timeout.is_zero() {
            bail!("readiness.timeout must be greater than 0");
        }

        if self.readiness.poll_interval.is_zero() {
            bail!("readiness.poll_interval must be greater than 0");
        }

        if self.output.lines == 0 {
            bail!("output.lines must be greater than 0");
        }

        Ok(())
    }
}
