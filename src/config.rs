//! Flat environment-variable configuration (spec.md §6, SPEC_FULL.md §4.0).
//!
//! Every key is read directly from the process environment under the exact
//! dotted name spec.md names (`Gateway.Cors.Enabled`, etc). There is no
//! config file format — this mirrors the "flat naming scheme" the spec
//! mandates rather than introducing a layered config crate the spec never
//! asked for.

use std::env;

use crate::error::{GatewayError, Result};

/// Handler flags passed straight through to the per-cluster GraphQL
/// handler (spec.md §4.5 "Construction", step 5).
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerCfg {
    pub pretty: bool,
    pub playground: bool,
    pub graphiql: bool,
}

/// CORS policy applied by the HTTP front door (spec.md §4.7 "CORS").
#[derive(Debug, Clone, Default)]
pub struct CorsCfg {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
}

/// Top-level gateway configuration, parsed once at startup and shared via
/// `Arc` with every long-lived component.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub openapi_definitions_path: String,
    pub port: u16,
    pub log_level: String,
    pub local_development: bool,
    pub handler: HandlerCfg,
    pub cors: CorsCfg,
    pub should_impersonate: bool,
    pub username_claim: String,
    pub introspection_authentication: bool,
    pub enable_kcp: bool,
}

fn env_str(key: &str, default: Option<&str>) -> Result<String> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(env::VarError::NotPresent) => default.map(str::to_owned).ok_or_else(|| {
            GatewayError::Config(format!("missing required environment variable {key}"))
        }),
        Err(env::VarError::NotUnicode(_)) => Err(GatewayError::Config(format!(
            "environment variable {key} is not valid UTF-8"
        ))),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(val) => match val.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(GatewayError::Config(format!(
                "{key} must be a boolean, got {other:?}"
            ))),
        },
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(GatewayError::Config(format!(
            "environment variable {key} is not valid UTF-8"
        ))),
    }
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .ok()
        .map(|val| {
            val.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

impl GatewayConfig {
    /// Load configuration from the process environment, failing fast on the
    /// first missing required key or malformed boolean (spec.md §6, §9
    /// exit-code notes).
    pub fn from_env() -> Result<Self> {
        let port: u16 = env_str("Port", Some("8080"))?
            .parse()
            .map_err(|_| GatewayError::Config("Port must be a valid u16".into()))?;

        Ok(GatewayConfig {
            openapi_definitions_path: env_str("OpenApiDefinitionsPath", None)?,
            port,
            log_level: env_str("LogLevel", Some("info"))?,
            local_development: env_bool("LocalDevelopment", false)?,
            handler: HandlerCfg {
                pretty: env_bool("Gateway.HandlerCfg.Pretty", false)?,
                playground: env_bool("Gateway.HandlerCfg.Playground", true)?,
                graphiql: env_bool("Gateway.HandlerCfg.GraphiQL", false)?,
            },
            cors: CorsCfg {
                enabled: env_bool("Gateway.Cors.Enabled", false)?,
                allowed_origins: env_list("Gateway.Cors.AllowedOrigins"),
                allowed_headers: env_list("Gateway.Cors.AllowedHeaders"),
            },
            should_impersonate: env_bool("Gateway.ShouldImpersonate", false)?,
            username_claim: env_str("Gateway.UsernameClaim", Some("preferred_username"))?,
            introspection_authentication: env_bool("IntrospectionAuthentication", false)?,
            enable_kcp: env_bool("EnableKcp", false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_required_key_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("OpenApiDefinitionsPath");
        let err = GatewayConfig::from_env().unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OpenApiDefinitionsPath", "/etc/gateway/clusters");
        env::remove_var("Port");
        env::remove_var("Gateway.Cors.Enabled");
        let cfg = GatewayConfig::from_env().unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.cors.enabled);
        env::remove_var("OpenApiDefinitionsPath");
    }

    #[test]
    fn malformed_boolean_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OpenApiDefinitionsPath", "/etc/gateway/clusters");
        env::set_var("LocalDevelopment", "maybe");
        let err = GatewayConfig::from_env().unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        env::remove_var("OpenApiDefinitionsPath");
        env::remove_var("LocalDevelopment");
    }
}
