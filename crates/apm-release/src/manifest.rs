//! `package.json` access: loading with reported failures, and rewriting the
//! `version` field while keeping the file's indentation and line endings.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Serializer, Value};

use crate::error::{AggregateFailure, StructuredError};

pub const MANIFEST_FILE: &str = "package.json";

const DEFAULT_INDENT: &str = "  ";

/// A loaded `package.json` with a usable name.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    pub name: String,
    pub version: Option<String>,
}

pub fn manifest_path(cwd: &Path) -> PathBuf {
    cwd.join(MANIFEST_FILE)
}

/// Load `package.json` from `cwd`.
///
/// Every failure is reported as a single-element [`AggregateFailure`] so
/// callers can merge it with other reported problems.
pub async fn load_manifest(cwd: &Path) -> Result<PackageManifest, AggregateFailure> {
    let path = manifest_path(cwd);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(AggregateFailure::single(StructuredError::no_manifest()));
        }
        Err(err) => {
            let cause = anyhow::Error::new(err)
                .context(format!("failed to read {}", path.display()));
            return Err(AggregateFailure::single(
                StructuredError::manifest_unreadable(&cause),
            ));
        }
    };

    parse_manifest(&content, &path)
}

fn parse_manifest(content: &str, path: &Path) -> Result<PackageManifest, AggregateFailure> {
    let raw = parse_object(content)
        .with_context(|| format!("failed to parse {}", path.display()))
        .map_err(|cause| AggregateFailure::single(StructuredError::manifest_unreadable(&cause)))?;

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AggregateFailure::single(StructuredError::no_manifest_name()))?;

    let version = raw
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(PackageManifest { name, version })
}

fn parse_object(content: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!(
            "expected a JSON object at the top level, found {}",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Indentation and line-ending convention of a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStyle {
    pub indent: String,
    pub newline: &'static str,
}

impl Default for JsonStyle {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT.to_string(),
            newline: "\n",
        }
    }
}

impl JsonStyle {
    /// Detect the style of `content`, falling back to two spaces and `\n`
    /// for whatever cannot be detected (e.g. a minified single line).
    pub fn detect(content: &str) -> Self {
        let indent = content
            .lines()
            .skip(1)
            .find_map(|line| {
                let trimmed = line.trim_start_matches([' ', '\t']);
                let width = line.len() - trimmed.len();
                (width > 0 && !trimmed.trim().is_empty()).then(|| line[..width].to_string())
            })
            .unwrap_or_else(|| DEFAULT_INDENT.to_string());

        let crlf = content.matches("\r\n").count();
        let lf = content.matches('\n').count() - crlf;
        let newline = if crlf > lf { "\r\n" } else { "\n" };

        Self { indent, newline }
    }

    /// Render `value` pretty-printed in this style, with a trailing newline.
    pub fn render(&self, value: &Value) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut serializer)
            .context("failed to serialize manifest")?;

        let mut text = String::from_utf8(buf).context("manifest is not valid UTF-8")?;
        text.push('\n');

        // Raw newlines only occur as structure; inside strings they are escaped.
        if self.newline != "\n" {
            text = text.replace('\n', self.newline);
        }
        Ok(text)
    }
}

/// Return `content` with its top-level `version` set to `version`, rendered
/// in `style`. Key order and number literals are preserved; a missing
/// `version` key is appended.
pub fn set_version(content: &str, version: &str, style: &JsonStyle) -> Result<String> {
    let mut raw = parse_object(content).context("failed to parse manifest")?;
    raw.insert("version".to_string(), Value::String(version.to_string()));
    style.render(&Value::Object(raw))
}
