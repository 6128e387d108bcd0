use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Read-only client for the Atom package API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    api_base: String,
    http: Client,
}

impl RegistryClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("apm-release/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api_base: api_base.into(),
            http,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Package metadata, or `None` if the registry does not know the package.
    pub async fn package(&self, name: &str) -> Result<Option<PackageInfo>> {
        let url = format!("{}/packages/{}", self.api_base.trim_end_matches('/'), name);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("registry request failed")?;

        match resp.status() {
            StatusCode::OK => {
                let parsed: PackageInfo = resp
                    .json()
                    .await
                    .context("failed to parse package JSON")?;
                Ok(Some(parsed))
            }
            StatusCode::NOT_FOUND => Ok(None),
            s => bail!("unexpected status while fetching package {name}: {s}"),
        }
    }

    pub async fn version_exists(&self, name: &str, version: &str) -> Result<bool> {
        Ok(self
            .package(name)
            .await?
            .is_some_and(|pkg| pkg.versions.contains_key(version)))
    }
}

#[derive(Debug, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    /// Keyed by version; values are the per-version manifests.
    #[serde(default)]
    pub versions: BTreeMap<String, serde_json::Value>,
}
