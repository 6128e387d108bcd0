use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use apm_release::manifest::{self, MANIFEST_FILE};
use apm_release::registry::RegistryClient;
use apm_release::{
    AggregateFailure, NextRelease, PluginConfig, PluginError, ReleaseContext, ReleaseSession,
    Reporter, Sink, auth,
};
use apm_release_process as process;

#[derive(Parser, Debug)]
#[command(name = "apm-release", version)]
#[command(about = "Verify, version, and publish Atom packages with apm")]
struct Cli {
    /// Package directory containing package.json
    #[arg(long, default_value = ".")]
    cwd: PathBuf,

    /// Config file (default: <cwd>/.apm-release.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check token, apm CLI, and package.json without changing anything.
    Verify,
    /// Write the release version into package.json.
    Prepare {
        /// Version to write (e.g. 1.2.0)
        #[arg(long)]
        next_version: String,
    },
    /// Publish the release with `apm publish`, preparing first.
    ///
    /// Each invocation is its own session: after a separate `prepare`, this
    /// runs `npm version` again. Use `release` to run every phase once.
    Publish {
        #[command(flatten)]
        release: ReleaseArgs,
    },
    /// Run verify, prepare, and publish in one session.
    Release {
        #[command(flatten)]
        release: ReleaseArgs,
    },
    /// Compare the local package version to the registry.
    Status,
    /// Print environment and tool diagnostics.
    Doctor,
}

#[derive(clap::Args, Debug)]
struct ReleaseArgs {
    /// Version being released (e.g. 1.2.0)
    #[arg(long)]
    next_version: String,

    /// Git tag of the release (default: v<version>)
    #[arg(long)]
    tag: Option<String>,
}

impl ReleaseArgs {
    fn next_release(&self) -> NextRelease {
        let release = NextRelease::new(&self.next_version);
        match &self.tag {
            Some(tag) => release.with_git_tag(tag),
            None => release,
        }
    }
}

struct CliReporter;

impl Reporter for CliReporter {
    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut reporter = CliReporter;

    match run(cli, &mut reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PluginError>().and_then(PluginError::reported) {
                Some(failure) => print_failure(failure, &mut reporter),
                None => reporter.error(&format!("{err:#}")),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, reporter: &mut dyn Reporter) -> Result<()> {
    let config = load_config(&cli)?;
    // Tool output goes to stderr; stdout carries only this command's result.
    let ctx = ReleaseContext::new(&cli.cwd)
        .with_env(std::env::vars())
        .with_sinks(Sink::stderr(), Sink::stderr());
    let mut session = ReleaseSession::new();

    match cli.cmd {
        Commands::Verify => {
            session.verify_conditions(&config, &ctx, reporter).await?;
            println!("verified: {}", session.is_verified());
        }
        Commands::Prepare { next_version } => {
            let ctx = ctx.with_next_release(NextRelease::new(next_version));
            session.prepare(&config, &ctx, reporter).await?;
            println!("prepared: {}", session.is_prepared());
        }
        Commands::Publish { release } => {
            let ctx = ctx.with_next_release(release.next_release());
            let result = session.publish(&config, &ctx, reporter).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Release { release } => {
            let ctx = ctx.with_next_release(release.next_release());
            session.verify_conditions(&config, &ctx, reporter).await?;
            session.prepare(&config, &ctx, reporter).await?;
            let result = session.publish(&config, &ctx, reporter).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Status => {
            run_status(&config, &ctx, reporter).await?;
        }
        Commands::Doctor => {
            run_doctor(&config, &ctx, reporter).await;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PluginConfig> {
    let config = match &cli.config {
        Some(path) => PluginConfig::load_from_file(path)?,
        None => PluginConfig::load_from_dir(&cli.cwd)?.unwrap_or_default(),
    };
    config.validate()?;
    Ok(config)
}

fn print_failure(failure: &AggregateFailure, reporter: &mut dyn Reporter) {
    reporter.error(&format!(
        "{} release condition(s) failed",
        failure.errors().len()
    ));
    for err in failure.errors() {
        eprintln!();
        eprintln!("{}: {}", err.code, err.message);
        for line in err.details.lines() {
            eprintln!("    {line}");
        }
    }
}

async fn run_status(config: &PluginConfig, ctx: &ReleaseContext, reporter: &mut dyn Reporter) -> Result<()> {
    let pkg = manifest::load_manifest(&ctx.cwd).await.map_err(PluginError::from)?;
    let Some(version) = pkg.version.as_deref() else {
        bail!("{MANIFEST_FILE} has no version field");
    };

    reporter.info("initializing registry client...");
    let reg = RegistryClient::new(config.registry.resolve_api_base(&ctx.env))?;

    let exists = reg.version_exists(&pkg.name, version).await?;
    let status = if exists { "published" } else { "missing" };
    println!("{}@{version}: {status}", pkg.name);
    println!("url: {}", config.registry.package_url(&pkg.name));

    Ok(())
}

async fn run_doctor(config: &PluginConfig, ctx: &ReleaseContext, reporter: &mut dyn Reporter) {
    let manifest_path = manifest::manifest_path(&ctx.cwd);
    println!("cwd: {}", ctx.cwd.display());
    println!("manifest: {} (exists: {})", manifest_path.display(), manifest_path.exists());
    println!(
        "registry: {} (api: {})",
        config.registry.web_base,
        config.registry.resolve_api_base(&ctx.env)
    );
    println!("token_env: {}", config.token_env);
    println!(
        "token_detected: {}",
        auth::resolve_token(config, &ctx.env).is_some()
    );

    println!();

    print_cmd_version(&config.apm_bin, "-v", ctx, reporter).await;
    print_cmd_version(&config.npm_bin, "--version", ctx, reporter).await;
}

async fn print_cmd_version(
    cmd: &str,
    flag: &str,
    ctx: &ReleaseContext,
    reporter: &mut dyn Reporter,
) {
    if !process::command_exists_in(cmd, &ctx.env, &ctx.cwd) {
        reporter.warn(&format!("{cmd} not found on PATH"));
        return;
    }

    match process::run_command_in_dir(cmd, &[flag], &ctx.cwd, &ctx.env).await {
        Ok(out) if out.success => {
            let first = out.stdout.lines().next().unwrap_or_default().trim();
            println!("{cmd}: {first}");
        }
        Ok(out) => {
            reporter.warn(&format!("{cmd} {flag} failed: {}", out.stderr.trim()));
        }
        Err(e) => {
            reporter.warn(&format!("unable to run {cmd} {flag}: {e:#}"));
        }
    }
}
