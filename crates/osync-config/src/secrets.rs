//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES. Callers resolve once at startup and
//! pass the result into constructors. `Debug` redacts values; error messages
//! carry the env var NAME, never the value.

use anyhow::{bail, Result};

use crate::{ConfigMode, SyncSettings};

/// Tokens for both ledgers and the operator gate.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub source_token: Option<String>,
    pub target_token: Option<String>,
    pub operator_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("source_token", &self.source_token.as_ref().map(|_| "<REDACTED>"))
            .field("target_token", &self.target_token.as_ref().map(|_| "<REDACTED>"))
            .field(
                "operator_token",
                &self.operator_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Unset or blank counts as absent.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Resolve secrets for `mode`.
///
/// | Mode    | Required                               |
/// |---------|----------------------------------------|
/// | DAEMON  | source token, target token, operator   |
/// | CLI     | source token, target token             |
/// | OFFLINE | nothing                                |
pub fn resolve_secrets(settings: &SyncSettings, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let resolved = ResolvedSecrets {
        source_token: resolve_env(&settings.source.token_env),
        target_token: resolve_env(&settings.target.token_env),
        operator_token: resolve_env(&settings.operator_token_env),
    };

    let mut required: Vec<(&str, bool)> = Vec::new();
    match mode {
        ConfigMode::Daemon => {
            required.push((&settings.source.token_env, resolved.source_token.is_some()));
            required.push((&settings.target.token_env, resolved.target_token.is_some()));
            required.push((&settings.operator_token_env, resolved.operator_token.is_some()));
        }
        ConfigMode::Cli => {
            required.push((&settings.source.token_env, resolved.source_token.is_some()));
            required.push((&settings.target.token_env, resolved.target_token.is_some()));
        }
        ConfigMode::Offline => {}
    }

    if let Some((name, _)) = required.iter().find(|(_, present)| !present) {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' is not set or empty",
            mode.as_str(),
            name
        );
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_values() {
        let s = ResolvedSecrets {
            source_token: Some("tok-source-123".into()),
            target_token: None,
            operator_token: Some("tok-op".into()),
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("tok-source-123"));
        assert!(!dbg.contains("tok-op"));
        assert!(dbg.contains("<REDACTED>"));
    }
}
