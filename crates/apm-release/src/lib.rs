//! # apm-release
//!
//! Release lifecycle for Atom packages published with `apm`.
//!
//! A release driver calls three phases in order, once per release:
//!
//! 1. [`ReleaseSession::verify_conditions`] checks that a registry token is
//!    set, that the `apm` CLI runs, and that `package.json` names a package.
//!    Every problem is collected into one [`AggregateFailure`].
//! 2. [`ReleaseSession::prepare`] writes the release version into
//!    `package.json` via `npm version`, keeping the file's indentation and
//!    line endings.
//! 3. [`ReleaseSession::publish`] runs `apm publish --tag <tag>` and returns
//!    a [`PublishResult`] pointing at the package page.
//!
//! The session remembers which phases succeeded, so verification is not
//! repeated and `publish` alone still prepares first.
//!
//! ## Example
//!
//! ```ignore
//! use apm_release::{NextRelease, PluginConfig, ReleaseContext, ReleaseSession};
//!
//! let config = PluginConfig::default();
//! let ctx = ReleaseContext::new(".")
//!     .with_env(std::env::vars())
//!     .with_next_release(NextRelease::new("1.2.0"));
//!
//! let mut session = ReleaseSession::new();
//! session.verify_conditions(&config, &ctx, &mut reporter).await?;
//! let result = session.publish(&config, &ctx, &mut reporter).await?;
//! println!("{}", result.url);
//! ```
//!
//! ## Modules
//!
//! - [`lifecycle`]: `ReleaseSession` and the `Reporter` logging trait
//! - [`verify`]: Token and CLI checks
//! - [`manifest`]: `package.json` loading and format-preserving rewrite
//! - [`prepare`]: Version writer
//! - [`publish`]: `apm publish` and the optional readiness check
//! - [`error`]: Structured error codes and aggregate failures
//! - [`config`]: Configuration file (`.apm-release.toml`) loading
//! - [`registry`]: Read-only Atom package API client

/// Token lookup in the release environment.
pub mod auth;

/// `apm` / `npm` invocation.
pub mod apm;

/// Configuration file (`.apm-release.toml`) loading and validation.
pub mod config;

/// Structured error codes and aggregate failures.
pub mod error;

/// `ReleaseSession` and the `Reporter` logging trait.
pub mod lifecycle;

/// `package.json` loading and format-preserving rewrite.
pub mod manifest;

/// Version writer.
pub mod prepare;

/// `apm publish` and the optional readiness check.
pub mod publish;

/// Read-only Atom package API client.
pub mod registry;

/// Release inputs and outputs.
pub mod types;

/// Token and CLI checks.
pub mod verify;

#[cfg(test)]
mod test_support;

pub use config::PluginConfig;
pub use error::{AggregateFailure, ErrorCode, PluginError, StructuredError};
pub use lifecycle::{ReleaseSession, Reporter};
pub use types::{NextRelease, PublishResult, ReleaseContext};

pub use apm_release_process::Sink;
