use anyhow::{Context, Result};

use crate::apm;
use crate::config::PluginConfig;
use crate::lifecycle::Reporter;
use crate::manifest::{self, JsonStyle, MANIFEST_FILE};
use crate::types::ReleaseContext;

/// Write the release version into `package.json`.
///
/// `npm version` does the bump and keeps `package-lock.json` /
/// `npm-shrinkwrap.json` in sync; its output is streamed to the context
/// sinks. Afterwards the manifest is normalised to the indentation and line
/// endings it had before, so the only change is the `version` field.
pub async fn prepare(config: &PluginConfig, ctx: &ReleaseContext, reporter: &mut dyn Reporter) -> Result<()> {
    let version = &ctx.release()?.version;
    let path = manifest::manifest_path(&ctx.cwd);

    let original = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let style = JsonStyle::detect(&original);

    reporter.info(&format!("Write version {version} to {MANIFEST_FILE}"));

    apm::npm_version(config, ctx, version).await?;

    let current = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let rewritten = manifest::set_version(&current, version, &style)
        .with_context(|| format!("failed to update {}", path.display()))?;

    if rewritten != current {
        tokio::fs::write(&path, rewritten)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
