//! Invocations of the external `apm` and `npm` command lines.

use anyhow::{Result, bail};

use apm_release_process::{self as process, CommandResult};

use crate::auth;
use crate::config::PluginConfig;
use crate::types::ReleaseContext;

/// `apm -v` exits zero. Spawn failures count as "not invocable".
pub async fn apm_available(config: &PluginConfig, ctx: &ReleaseContext) -> bool {
    match process::run_command_in_dir(&config.apm_bin, &["-v"], &ctx.cwd, &ctx.env).await {
        Ok(result) => result.success,
        Err(_) => false,
    }
}

/// `npm version <version> --no-git-tag-version`, streamed to the context sinks.
pub async fn npm_version(config: &PluginConfig, ctx: &ReleaseContext, version: &str) -> Result<()> {
    let args = ["version", version, "--no-git-tag-version"];
    let result = process::run_command_streaming(
        &config.npm_bin,
        &args,
        &ctx.cwd,
        &ctx.env,
        &ctx.stdout,
        &ctx.stderr,
    )
    .await?;

    ensure_success(&config.npm_bin, &args, &result, config, ctx)
}

/// `apm publish --tag <tag>`, streamed to the context sinks.
pub async fn apm_publish(config: &PluginConfig, ctx: &ReleaseContext, tag: &str) -> Result<()> {
    let args = ["publish", "--tag", tag];
    let result = process::run_command_streaming(
        &config.apm_bin,
        &args,
        &ctx.cwd,
        &ctx.env,
        &ctx.stdout,
        &ctx.stderr,
    )
    .await?;

    ensure_success(&config.apm_bin, &args, &result, config, ctx)
}

fn ensure_success(
    program: &str,
    args: &[&str],
    result: &CommandResult,
    config: &PluginConfig,
    ctx: &ReleaseContext,
) -> Result<()> {
    if result.success {
        return Ok(());
    }

    let token = auth::resolve_token(config, &ctx.env);
    let stderr = redact_secret(
        &tail_lines(&result.stderr, config.output.lines),
        token.as_deref(),
    );
    let code = result
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none (terminated by signal)".to_string());

    bail!(
        "`{} {}` failed with exit code {}:\n{}",
        program,
        args.join(" "),
        code,
        stderr.trim_end()
    )
}

pub(crate) fn tail_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let tail = if lines.len() <= n {
        s.to_string()
    } else {
        lines[lines.len() - n..].join("\n")
    };
    redact_sensitive(&tail)
}

/// Replace every occurrence of the resolved token.
fn redact_secret(s: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => s.replace(secret, "[REDACTED]"),
        _ => s.to_string(),
    }
}

/// Redact credential-looking patterns from tool output before it is quoted
/// in an error message.
pub(crate) fn redact_sensitive(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for line in s.lines() {
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&redact_line(line));
    }
    // Preserve trailing newline if present
    if s.ends_with('\n') {
        result.push('\n');
    }
    result
}

fn redact_line(line: &str) -> String {
    let mut out = line.to_string();

    // Authorization: Bearer <token>
    if let Some(pos) = out.to_ascii_lowercase().find("authorization:") {
        let after = &out[pos..];
        if let Some(bearer_pos) = after.to_ascii_lowercase().find("bearer ") {
            let redact_start = pos + bearer_pos + "bearer ".len();
            out = format!("{}[REDACTED]", &out[..redact_start]);
        }
    }

    // ATOM_ACCESS_TOKEN=<value>
    if let Some(pos) = out.find("ATOM_ACCESS_TOKEN")
        && let Some(eq_pos) = out[pos..].find('=')
    {
        let abs_eq = pos + eq_pos;
        out = format!("{}=[REDACTED]", &out[..abs_eq]);
    }

    // ?access_token=<value> in request URLs
    if let Some(pos) = out.find("access_token=") {
        let value_start = pos + "access_token=".len();
        let value_end = out[value_start..]
            .find(|c: char| c == '&' || c.is_whitespace())
            .map(|i| value_start + i)
            .unwrap_or(out.len());
        out = format!("{}[REDACTED]{}", &out[..value_start], &out[value_end..]);
    }

    out
}
