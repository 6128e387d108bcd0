//! Error taxonomy for the release lifecycle.
//!
//! Two families are kept apart:
//!
//! - *Reported* problems ([`StructuredError`]) come from condition checks
//!   (token, CLI, manifest). They are always collected into an
//!   [`AggregateFailure`] so a single run surfaces every problem at once.
//! - *Fatal* errors are tooling malfunctions (a failing `npm version` or
//!   `apm publish`) and travel as [`anyhow::Error`].
//!
//! [`PluginError`] is what the lifecycle entry points return.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::manifest::MANIFEST_FILE;

/// Stable, machine-readable identifier of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    /// No registry token in the release environment.
    #[serde(rename = "ENOAPMTOKEN")]
    NoToken,
    /// The `apm` CLI is missing or not invocable.
    #[serde(rename = "ENOAPMCLI")]
    NoCli,
    /// No `package.json` in the working directory.
    #[serde(rename = "ENOPKG")]
    NoManifest,
    /// `package.json` has no usable `name`.
    #[serde(rename = "ENOPKGNAME")]
    NoManifestName,
    /// `package.json` exists but could not be read or parsed.
    #[serde(rename = "EREADPKG")]
    ManifestUnreadable,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NoToken => "ENOAPMTOKEN",
            ErrorCode::NoCli => "ENOAPMCLI",
            ErrorCode::NoManifest => "ENOPKG",
            ErrorCode::NoManifestName => "ENOPKGNAME",
            ErrorCode::ManifestUnreadable => "EREADPKG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported problem: stable code, short message, long-form remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
    /// Markdown; may contain links.
    pub details: String,
}

impl StructuredError {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn no_token(env_name: &str) -> Self {
        Self::new(
            ErrorCode::NoToken,
            "No apm token specified.",
            format!(
                "An apm token must be created and set in the `{env_name}` environment variable on your CI environment.\n\n\
                 Please visit your account page on [atom.io](https://atom.io/account) to create it, then set it in the `{env_name}` environment variable on your CI environment."
            ),
        )
    }

    pub fn no_cli(program: &str) -> Self {
        Self::new(
            ErrorCode::NoCli,
            "The apm CLI must be installed.",
            format!(
                "The `{program}` command line has to be installed in your CI environment and available in the `PATH` environment variable.\n\n\
                 See [Atom installation](https://flight-manual.atom.io/getting-started/sections/installing-atom/) for more details."
            ),
        )
    }

    pub fn no_manifest() -> Self {
        Self::new(
            ErrorCode::NoManifest,
            format!("Missing `{MANIFEST_FILE}` file."),
            format!(
                "A [{MANIFEST_FILE} file](https://docs.npmjs.com/files/package.json) at the root of your project is required to publish an Atom package.\n\n\
                 Please follow the [npm guideline](https://docs.npmjs.com/getting-started/creating-node-modules) to create a valid `{MANIFEST_FILE}` file."
            ),
        )
    }

    pub fn no_manifest_name() -> Self {
        Self::new(
            ErrorCode::NoManifestName,
            format!("Missing `name` property in `{MANIFEST_FILE}`."),
            format!(
                "The `{MANIFEST_FILE}`'s [name](https://docs.npmjs.com/files/package.json#name) property is required in order to publish an Atom package.\n\n\
                 Please make sure to add a valid `name` for your package in your `{MANIFEST_FILE}`."
            ),
        )
    }

    pub fn manifest_unreadable(cause: &anyhow::Error) -> Self {
        Self::new(
            ErrorCode::ManifestUnreadable,
            format!("Unable to read `{MANIFEST_FILE}`."),
            format!("The `{MANIFEST_FILE}` file exists but could not be loaded:\n\n```\n{cause:#}\n```"),
        )
    }
}

/// One or more reported problems, in the order the checks ran.
///
/// Never empty: use [`AggregateFailure::from_errors`] to build one from a
/// list that may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}", render(.errors))]
pub struct AggregateFailure {
    errors: Vec<StructuredError>,
}

fn render(errors: &[StructuredError]) -> String {
    let mut out = format!("{} release condition(s) failed:", errors.len());
    for err in errors {
        out.push_str("\n- ");
        out.push_str(&err.to_string());
    }
    out
}

impl AggregateFailure {
    pub fn single(error: StructuredError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// `None` when there is nothing to report.
    pub fn from_errors(errors: Vec<StructuredError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub fn errors(&self) -> &[StructuredError] {
        &self.errors
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

impl IntoIterator for AggregateFailure {
    type Item = StructuredError;
    type IntoIter = std::vec::IntoIter<StructuredError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Merge reported problems with the outcome of a step that may itself fail
/// with reported problems. Errors from `step` are appended after `errors`.
pub fn merge_reported<T>(
    mut errors: Vec<StructuredError>,
    step: Result<T, AggregateFailure>,
) -> Result<T, AggregateFailure> {
    match step {
        Ok(value) => match AggregateFailure::from_errors(errors) {
            Some(failure) => Err(failure),
            None => Ok(value),
        },
        Err(failure) => {
            errors.extend(failure);
            Err(AggregateFailure { errors })
        }
    }
}

/// Outcome of a lifecycle phase that did not succeed.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Condition checks failed; every problem is listed.
    #[error(transparent)]
    Reported(#[from] AggregateFailure),
    /// A tool or I/O operation failed unexpectedly.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl PluginError {
    pub fn reported(&self) -> Option<&AggregateFailure> {
        match self {
            PluginError::Reported(failure) => Some(failure),
            PluginError::Fatal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(ErrorCode::NoToken.as_str(), "ENOAPMTOKEN");
        assert_eq!(ErrorCode::NoCli.as_str(), "ENOAPMCLI");
        assert_eq!(ErrorCode::NoManifest.as_str(), "ENOPKG");
        assert_eq!(ErrorCode::NoManifestName.as_str(), "ENOPKGNAME");
        assert_eq!(ErrorCode::ManifestUnreadable.to_string(), "EREADPKG");
    }

    #[test]
    fn every_template_has_message_and_details() {
        let cause = anyhow::anyhow!("expected value at line 1 column 1");
        for err in [
            StructuredError::no_token("ATOM_ACCESS_TOKEN"),
            StructuredError::no_cli("apm"),
            StructuredError::no_manifest(),
            StructuredError::no_manifest_name(),
            StructuredError::manifest_unreadable(&cause),
        ] {
            assert!(!err.message.is_empty(), "{:?}", err.code);
            assert!(!err.details.is_empty(), "{:?}", err.code);
        }
    }

    #[test]
    fn token_details_name_the_configured_variable() {
        let err = StructuredError::no_token("MY_APM_TOKEN");
        assert!(err.details.contains("`MY_APM_TOKEN`"));
    }

    #[test]
    fn unreadable_details_carry_the_cause() {
        let cause = anyhow::anyhow!("trailing comma at line 3");
        let err = StructuredError::manifest_unreadable(&cause);
        assert!(err.details.contains("trailing comma at line 3"));
    }

    #[test]
    fn from_errors_rejects_empty_list() {
        assert!(AggregateFailure::from_errors(Vec::new()).is_none());
        let failure = AggregateFailure::from_errors(vec![StructuredError::no_manifest()])
            .expect("non-empty");
        assert_eq!(failure.codes(), vec![ErrorCode::NoManifest]);
    }

    #[test]
    fn aggregate_display_lists_each_problem() {
        let failure = AggregateFailure::from_errors(vec![
            StructuredError::no_token("ATOM_ACCESS_TOKEN"),
            StructuredError::no_cli("apm"),
        ])
        .expect("non-empty");

        insta::assert_snapshot!(failure.to_string(), @r"
        2 release condition(s) failed:
        - ENOAPMTOKEN: No apm token specified.
        - ENOAPMCLI: The apm CLI must be installed.
        ");
    }

    #[test]
    fn merge_appends_step_errors_after_existing_ones() {
        let step: Result<(), _> =
            Err(AggregateFailure::single(StructuredError::no_manifest_name()));
        let merged = merge_reported(
            vec![
                StructuredError::no_token("ATOM_ACCESS_TOKEN"),
                StructuredError::no_cli("apm"),
            ],
            step,
        )
        .expect_err("must fail");

        assert_eq!(
            merged.codes(),
            vec![ErrorCode::NoToken, ErrorCode::NoCli, ErrorCode::NoManifestName]
        );
    }

    #[test]
    fn merge_keeps_value_when_nothing_failed() {
        let merged = merge_reported(Vec::new(), Ok::<_, AggregateFailure>(42));
        assert_eq!(merged.expect("ok"), 42);
    }

    #[test]
    fn merge_fails_on_prior_errors_even_if_step_succeeded() {
        let merged = merge_reported(vec![StructuredError::no_cli("apm")], Ok::<_, AggregateFailure>(1));
        assert_eq!(merged.expect_err("fail").codes(), vec![ErrorCode::NoCli]);
    }

    #[test]
    fn plugin_error_distinguishes_families() {
        let reported = PluginError::from(AggregateFailure::single(StructuredError::no_manifest()));
        assert!(reported.reported().is_some());

        let fatal = PluginError::from(anyhow::anyhow!("npm exploded"));
        assert!(fatal.reported().is_none());
        assert_eq!(fatal.to_string(), "npm exploded");
    }

    #[test]
    fn aggregate_serializes_stable_codes() {
        let failure = AggregateFailure::from_errors(vec![
            StructuredError::no_token("ATOM_ACCESS_TOKEN"),
            StructuredError::no_cli("apm"),
            StructuredError::no_manifest(),
            StructuredError::no_manifest_name(),
            StructuredError::manifest_unreadable(&anyhow::anyhow!("bad json")),
        ])
        .expect("non-empty");
        let json = serde_json::to_value(&failure).expect("serialize");

        let serialized: Vec<&str> = json["errors"]
            .as_array()
            .expect("array")
            .iter()
            .map(|e| e["code"].as_str().expect("code string"))
            .collect();
        let displayed: Vec<String> = failure.codes().iter().map(ToString::to_string).collect();
        assert_eq!(serialized, displayed);
        assert_eq!(serialized[2], "ENOPKG");
    }
}
