//! Cluster Handler (spec.md §4.5): turns one schema document into a ready
//! GraphQL handler backed by a live Kubernetes admin transport.

use std::sync::Arc;

use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;
use kube::client::ConfigExt;
use serde::Deserialize;
use tower::ServiceBuilder;
use tracing::info;

use crate::config::{GatewayConfig, HandlerCfg};
use crate::error::{GatewayError, Result};
use crate::rest::RestClient;
use crate::schema::{build_schema, BuiltSchema};
use crate::transport::chain::{BearerToken, TokenExtensionLayer};
use crate::transport::service_account::{AdminTokenSource, KubeTokenIssuer, ServiceAccountTokenCache};

/// The `x-cluster-metadata` block of a schema document (spec.md §6 "Input
/// schema file").
#[derive(Debug, Deserialize)]
struct ClusterMetadataRaw {
    host: String,
    #[serde(default)]
    ca: Option<CaBundle>,
    auth: AuthRaw,
    #[serde(default)]
    insecure: bool,
}

#[derive(Debug, Deserialize)]
struct CaBundle {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AuthRaw {
    #[serde(rename = "token")]
    Token { token: String },
    #[serde(rename = "serviceAccount")]
    ServiceAccount {
        namespace: String,
        name: String,
    },
}

struct ClusterMetadata {
    host: http::Uri,
    ca: Option<Vec<u8>>,
    insecure: bool,
    auth: ClusterAuth,
}

enum ClusterAuth {
    Token(String),
    ServiceAccount { namespace: String, name: String },
}

fn parse_schema_document(contents: &[u8]) -> Result<(serde_json::Map<String, serde_json::Value>, ClusterMetadata)> {
    let doc: serde_json::Value = serde_json::from_slice(contents).map_err(GatewayError::Json)?;
    let definitions = doc
        .get("definitions")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| GatewayError::lifecycle("schema document missing `definitions`"))?
        .clone();
    let raw: ClusterMetadataRaw = serde_json::from_value(
        doc.get("x-cluster-metadata")
            .cloned()
            .ok_or_else(|| GatewayError::lifecycle("schema document missing `x-cluster-metadata`"))?,
    )
    .map_err(GatewayError::Json)?;

    let host: http::Uri = raw
        .host
        .parse()
        .map_err(|_| GatewayError::lifecycle(format!("invalid cluster host {:?}", raw.host)))?;
    let ca = raw
        .ca
        .map(|bundle| {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            STANDARD
                .decode(bundle.data)
                .map_err(|err| GatewayError::lifecycle(format!("invalid CA bundle: {err}")))
        })
        .transpose()?;
    let auth = match raw.auth {
        AuthRaw::Token { token } => ClusterAuth::Token(token),
        AuthRaw::ServiceAccount { namespace, name } => ClusterAuth::ServiceAccount { namespace, name },
    };

    Ok((
        definitions,
        ClusterMetadata {
            host,
            ca,
            insecure: raw.insecure,
            auth,
        },
    ))
}

/// One watched cluster's live GraphQL surface (spec.md §4.5). Built once per
/// schema change and swapped atomically into the registry.
pub struct ClusterHandler {
    pub schema: async_graphql::dynamic::Schema,
    pub handler_cfg: HandlerCfg,
    base_config: kube::Config,
    admin: AdminTokenSource,
}

impl ClusterHandler {
    /// Build a handler from a schema document's raw bytes (spec.md §4.5
    /// "Construction").
    pub async fn build(name: &str, contents: &[u8], config: &GatewayConfig) -> Result<Self> {
        let (definitions, metadata) = parse_schema_document(contents)?;
        let BuiltSchema { schema, .. } = build_schema(&definitions)?;

        let mut base_config = kube::Config::new(metadata.host.clone());
        base_config.accept_invalid_certs = metadata.insecure;
        base_config.root_cert = metadata.ca.map(|bytes| vec![bytes]);

        let admin = match metadata.auth {
            ClusterAuth::Token(token) => AdminTokenSource::Static(token),
            ClusterAuth::ServiceAccount { namespace, name } => {
                let bootstrap_client = build_unauthenticated_client(&base_config)?;
                let issuer = KubeTokenIssuer::new(bootstrap_client, namespace, name);
                AdminTokenSource::Cached(Arc::new(ServiceAccountTokenCache::new(Box::new(issuer))))
            }
        };

        info!(cluster = %name, "cluster handler built");

        Ok(Self {
            schema,
            handler_cfg: config.handler,
            base_config,
            admin,
        })
    }

    /// Build a `RestClient` wrapping the Transport Chain for one incoming
    /// request's caller token (spec.md §4.5 step 4, §4.8). Local-development
    /// mode skips `RequireTokenLayer`; impersonation is layered in when
    /// configured.
    pub fn rest_client_for(&self, config: &GatewayConfig, caller_token: Option<String>) -> Result<Arc<RestClient>> {
        let (discovery, require_token, bearer_injection, impersonation) =
            crate::transport::chain::build_layer_stack(config, self.admin.clone());
        let connector = self.base_config.rustls_https_connector().map_err(|err| GatewayError::lifecycle(err.to_string()))?;
        let base = LegacyClient::builder(TokioExecutor::new()).build(connector);

        let builder = ServiceBuilder::new()
            .layer(TokenExtensionLayer {
                token: caller_token.map(BearerToken),
            })
            .layer(discovery)
            .option_layer(require_token)
            .layer(bearer_injection)
            .option_layer(impersonation)
            .layer(self.base_config.base_uri_layer());

        let service = builder.service(base);
        let client = kube::Client::new(service, self.base_config.default_namespace.clone());
        Ok(Arc::new(RestClient::new(client)))
    }

    /// Probe `/version` with the caller's token, used to validate an
    /// introspection query's bearer before letting it through
    /// (SPEC_FULL.md via spec.md §4.7 "Authentication",
    /// `IntrospectionAuthentication`). `Ok(())` only on a `2xx` response.
    pub async fn probe_version(&self, token: &str) -> Result<()> {
        use http_body_util::Empty;

        let connector = self
            .base_config
            .rustls_https_connector()
            .map_err(|err| GatewayError::lifecycle(err.to_string()))?;
        let client = LegacyClient::builder(TokioExecutor::new()).build(connector);
        let uri = format!("{}/version", self.base_config.cluster_url);
        let request = http::Request::builder()
            .uri(uri)
            .header(http::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|err| GatewayError::auth(err.to_string()))?;
        let response = client
            .request(request)
            .await
            .map_err(|err| GatewayError::upstream(err.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::auth(format!("/version probe rejected with {}", response.status())))
        }
    }
}

fn build_unauthenticated_client(config: &kube::Config) -> Result<kube::Client> {
    let connector = config
        .rustls_https_connector()
        .map_err(|err| GatewayError::lifecycle(err.to_string()))?;
    let base = LegacyClient::builder(TokioExecutor::new()).build(connector);
    let service = ServiceBuilder::new().layer(config.base_uri_layer()).service(base);
    Ok(kube::Client::new(service, config.default_namespace.clone()))
}

/// `503` sentinel used by the front door while a cluster's handler is still
/// being built (spec.md §4.5 "Readiness").
pub fn not_ready_response() -> http::Response<String> {
    let mut response = http::Response::new("cluster handler not ready".to_owned());
    *response.status_mut() = http::StatusCode::SERVICE_UNAVAILABLE;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_token_auth_metadata() {
        let doc = json!({
            "definitions": {},
            "x-cluster-metadata": {
                "host": "https://example.com:6443",
                "auth": {"type": "token", "token": "abc"},
            }
        });
        let bytes = serde_json::to_vec(&doc).unwrap();
        let (_defs, metadata) = parse_schema_document(&bytes).unwrap();
        assert!(matches!(metadata.auth, ClusterAuth::Token(t) if t == "abc"));
    }

    #[test]
    fn rejects_missing_cluster_metadata() {
        let doc = json!({"definitions": {}});
        let bytes = serde_json::to_vec(&doc).unwrap();
        assert!(parse_schema_document(&bytes).is_err());
    }
}
