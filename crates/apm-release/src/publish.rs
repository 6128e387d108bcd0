use std::time::Instant;

use anyhow::Result;

use crate::apm;
use crate::config::PluginConfig;
use crate::lifecycle::Reporter;
use crate::manifest::PackageManifest;
use crate::registry::RegistryClient;
use crate::types::{ARTIFACT_KIND, PublishResult, ReleaseContext};

/// Publish the release with `apm publish --tag <tag>`.
///
/// Tool failures are fatal. The optional readiness check only ever warns.
pub async fn publish(
    config: &PluginConfig,
    manifest: &PackageManifest,
    ctx: &ReleaseContext,
    reporter: &mut dyn Reporter,
) -> Result<PublishResult> {
    let release = ctx.release()?;

    reporter.info(&format!(
        "Publishing version {} to the Atom registry",
        release.version
    ));
    apm::apm_publish(config, ctx, &release.tag()).await?;

    if config.readiness.enabled {
        wait_until_visible(config, manifest, &release.version, ctx, reporter).await;
    }

    reporter.info(&format!("Published {}@{}", manifest.name, release.version));

    Ok(PublishResult {
        name: ARTIFACT_KIND.to_string(),
        url: config.registry.package_url(&manifest.name),
    })
}

async fn wait_until_visible(
    config: &PluginConfig,
    manifest: &PackageManifest,
    version: &str,
    ctx: &ReleaseContext,
    reporter: &mut dyn Reporter,
) {
    let api_base = config.registry.resolve_api_base(&ctx.env);
    let client = match RegistryClient::new(api_base) {
        Ok(client) => client,
        Err(e) => {
            reporter.warn(&format!("readiness check skipped: {e:#}"));
            return;
        }
    };

    reporter.info(&format!(
        "waiting for {}@{} to appear on {}...",
        manifest.name,
        version,
        client.api_base()
    ));

    let deadline = Instant::now() + config.readiness.timeout;
    loop {
        match client.version_exists(&manifest.name, version).await {
            Ok(true) => {
                reporter.info(&format!("{}@{} is visible on the registry", manifest.name, version));
                return;
            }
            Ok(false) => {}
            Err(e) => reporter.warn(&format!("readiness check failed: {e:#}")),
        }

        if Instant::now() + config.readiness.poll_interval > deadline {
            reporter.warn(&format!(
                "{}@{} not visible on the registry after {}",
                manifest.name,
                version,
                humantime::format_duration(config.readiness.timeout)
            ));
            return;
        }
        tokio::time::sleep(config.readiness.poll_interval).await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use apm_release_process::Sink;

    use super::*;
    use crate::config::ReadinessConfig;
    use crate::manifest::load_manifest;
    use crate::registry::tests::spawn_registry_server;
    use crate::test_support::{CollectingReporter, FakeTools, write_manifest};
    use crate::types::NextRelease;

    async fn setup(name: &str) -> (FakeTools, tempfile::TempDir, PackageManifest) {
        let tools = FakeTools::install();
        let cwd = tempfile::tempdir().expect("tempdir");
        write_manifest(
            cwd.path(),
            &format!(r#"{{"name": "{name}", "version": "1.0.0"}}"#),
        );
        let manifest = load_manifest(cwd.path()).await.expect("manifest");
        (tools, cwd, manifest)
    }

    #[tokio::test]
    async fn publishes_with_git_tag_and_returns_package_url() {
        let (tools, cwd, manifest) = setup("publish").await;
        let ctx = ReleaseContext::new(cwd.path())
            .with_env(tools.env())
            .with_sinks(Sink::memory(), Sink::memory())
            .with_next_release(NextRelease::new("1.0.0").with_git_tag("v1.0.0"));
        let mut reporter = CollectingReporter::default();

        let result = publish(&PluginConfig::default(), &manifest, &ctx, &mut reporter)
            .await
            .expect("publish");

        assert_eq!(
            result,
            PublishResult {
                name: "Atom package".to_string(),
                url: "https://atom.io/packages/publish".to_string(),
            }
        );
        assert_eq!(tools.calls(), vec!["apm publish --tag v1.0.0"]);
        assert_eq!(ctx.stdout.contents_lossy(), "Publishing v1.0.0\n");
        assert_eq!(ctx.stderr.contents_lossy(), "apm progress\n");
        assert_eq!(
            reporter.infos,
            vec![
                "Publishing version 1.0.0 to the Atom registry",
                "Published publish@1.0.0"
            ]
        );
    }

    #[tokio::test]
    async fn failing_publish_is_fatal() {
        let (tools, cwd, manifest) = setup("demo").await;
        let ctx = ReleaseContext::new(cwd.path())
            .with_env(tools.env())
            .with_env([("FAKE_APM_EXIT", "2"), ("FAKE_APM_STDERR", "Version already exists")])
            .with_sinks(Sink::memory(), Sink::memory())
            .with_next_release(NextRelease::new("1.0.0"));

        let err = publish(
            &PluginConfig::default(),
            &manifest,
            &ctx,
            &mut CollectingReporter::default(),
        )
        .await
        .expect_err("apm failure");

        let msg = err.to_string();
        assert!(msg.contains("apm publish --tag v1.0.0"), "{msg}");
        assert!(msg.contains("exit code 2"), "{msg}");
        assert!(msg.contains("Version already exists"), "{msg}");
    }

    #[tokio::test]
    async fn readiness_check_confirms_visibility() {
        let (tools, cwd, manifest) = setup("demo").await;
        let server = spawn_registry_server(vec![
            (200, r#"{"name":"demo","versions":{}}"#.to_string()),
            (200, r#"{"name":"demo","versions":{"1.0.0":{}}}"#.to_string()),
        ]);
        let config = PluginConfig {
            readiness: ReadinessConfig {
                enabled: true,
                timeout: Duration::from_secs(10),
                poll_interval: Duration::from_millis(10),
            },
            ..Default::default()
        };
        let ctx = ReleaseContext::new(cwd.path())
            .with_env(tools.env())
            .with_env([("ATOM_API_URL", server.base_url.as_str())])
            .with_sinks(Sink::memory(), Sink::memory())
            .with_next_release(NextRelease::new("1.0.0"));
        let mut reporter = CollectingReporter::default();

        publish(&config, &manifest, &ctx, &mut reporter)
            .await
            .expect("publish");

        assert_eq!(server.join(), vec!["/packages/demo", "/packages/demo"]);
        assert!(reporter.warns.is_empty(), "{:?}", reporter.warns);
        assert!(
            reporter
                .infos
                .iter()
                .any(|m| m == "demo@1.0.0 is visible on the registry")
        );
    }

    #[tokio::test]
    async fn readiness_timeout_only_warns() {
        let (tools, cwd, manifest) = setup("demo").await;
        let server = spawn_registry_server(vec![(404, "{}".to_string())]);
        let config = PluginConfig {
            readiness: ReadinessConfig {
                enabled: true,
                timeout: Duration::from_millis(1),
                poll_interval: Duration::from_millis(50),
            },
            ..Default::default()
        };
        let ctx = ReleaseContext::new(cwd.path())
            .with_env(tools.env())
            .with_env([("ATOM_API_URL", server.base_url.as_str())])
            .with_sinks(Sink::memory(), Sink::memory())
            .with_next_release(NextRelease::new("1.0.0"));
        let mut reporter = CollectingReporter::default();

        let result = publish(&config, &manifest, &ctx, &mut reporter)
            .await
            .expect("publish still succeeds");

        assert_eq!(result.url, "https://atom.io/packages/demo");
        assert_eq!(server.join().len(), 1);
        assert_eq!(reporter.warns.len(), 1);
        assert!(reporter.warns[0].contains("not visible"));
    }
}
