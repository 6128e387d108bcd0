//! The release lifecycle: `verify_conditions` → `prepare` → `publish`.
//!
//! A [`ReleaseSession`] lives for one release run. It remembers whether the
//! environment was verified and the version written, so a driver may call
//! the phases in order, repeat them, or skip straight to `publish`.

use crate::config::PluginConfig;
use crate::error::{PluginError, StructuredError, merge_reported};
use crate::manifest::{self, PackageManifest};
use crate::prepare;
use crate::publish;
use crate::types::{PublishResult, ReleaseContext};
use crate::verify;

pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Skip-ahead state for one release run.
///
/// Flags are only ever set, never cleared. Construct a new session for each
/// release.
#[derive(Debug, Default)]
pub struct ReleaseSession {
    verified: bool,
    prepared: bool,
}

impl ReleaseSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Check token, CLI and manifest. Always runs every check.
    pub async fn verify_conditions(
        &mut self,
        config: &PluginConfig,
        ctx: &ReleaseContext,
        reporter: &mut dyn Reporter,
    ) -> Result<(), PluginError> {
        reporter.info("verifying release conditions...");
        let errors = verify::verify_conditions(config, ctx).await;
        merge_reported(errors, manifest::load_manifest(&ctx.cwd).await)?;

        self.verified = true;
        Ok(())
    }

    /// Write the release version into the manifest.
    pub async fn prepare(
        &mut self,
        config: &PluginConfig,
        ctx: &ReleaseContext,
        reporter: &mut dyn Reporter,
    ) -> Result<(), PluginError> {
        self.check(config, ctx, reporter).await?;

        prepare::prepare(config, ctx, reporter).await?;

        self.prepared = true;
        Ok(())
    }

    /// Publish the release, preparing it first if that has not happened yet
    /// in this session.
    pub async fn publish(
        &mut self,
        config: &PluginConfig,
        ctx: &ReleaseContext,
        reporter: &mut dyn Reporter,
    ) -> Result<PublishResult, PluginError> {
        let manifest = self.check(config, ctx, reporter).await?;

        if !self.prepared {
            prepare::prepare(config, ctx, reporter).await?;
            self.prepared = true;
        }

        Ok(publish::publish(config, &manifest, ctx, reporter).await?)
    }

    /// Verifier (unless already verified) plus manifest accessor, merged.
    ///
    /// A clean verifier run marks the session verified even when the
    /// manifest then fails to load.
    async fn check(
        &mut self,
        config: &PluginConfig,
        ctx: &ReleaseContext,
        reporter: &mut dyn Reporter,
    ) -> Result<PackageManifest, PluginError> {
        let mut errors: Vec<StructuredError> = Vec::new();
        if !self.verified {
            reporter.info("verifying release conditions...");
            errors = verify::verify_conditions(config, ctx).await;
            self.verified = errors.is_empty();
        }

        Ok(merge_reported(errors, manifest::load_manifest(&ctx.cwd).await)?)
    }
}
