use crate::apm;
use crate::auth;
use crate::config::PluginConfig;
use crate::error::StructuredError;
use crate::types::ReleaseContext;

/// Check the release environment: a registry token is set and the `apm` CLI
/// can be invoked.
///
/// Both checks always run. Problems come back in a fixed order (token, then
/// CLI); an empty list means the environment is ready.
pub async fn verify_conditions(config: &PluginConfig, ctx: &ReleaseContext) -> Vec<StructuredError> {
    let mut errors = Vec::new();

    if auth::resolve_token(config, &ctx.env).is_none() {
        errors.push(StructuredError::no_token(&config.token_env));
    }

    if !apm::apm_available(config, ctx).await {
        errors.push(StructuredError::no_cli(&config.apm_bin));
    }

    errors
}
