use std::collections::BTreeMap;

use crate::config::PluginConfig;

/// Resolve the registry token from the release environment.
///
/// Only the environment carried by the release context is consulted, never
/// the process environment of the driver. Whitespace-only values count as
/// unset.
pub fn resolve_token(config: &PluginConfig, env: &BTreeMap<String, String>) -> Option<String> {
    env.get(&config.token_env)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
