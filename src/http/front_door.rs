//! HTTP Front Door (spec.md §4.7): routes `/{cluster}/graphql`, applies
//! CORS and bearer-token auth, and dispatches to the standard GraphQL
//! handler or the SSE subscription adapter.

use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::{Request as GqlRequest, Variables};
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use warp::http::{HeaderValue, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::cluster::ClusterRegistry;
use crate::config::{CorsCfg, GatewayConfig};

use super::{playground, sse};

type HttpReply = warp::reply::Response;

/// `Authorization: Bearer <token>` / `bearer <token>` — both prefixes
/// stripped (spec.md §6 "Authorization extraction").
fn extract_bearer(header: Option<&str>) -> Option<String> {
    let raw = header?;
    let lower = raw.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("bearer ") {
        let start = raw.len() - rest.len();
        Some(raw[start..].to_owned())
    } else {
        None
    }
}

/// `true` when a POST body looks like an introspection query (spec.md §4.7
/// "Authentication"): it mentions `__schema` or `__type`.
fn looks_like_introspection(body: &[u8]) -> bool {
    let text = String::from_utf8_lossy(body);
    text.contains("__schema") || text.contains("__type")
}

#[derive(Deserialize)]
struct GraphQlBody {
    query: String,
    #[serde(default)]
    variables: Option<serde_json::Value>,
    #[serde(default, rename = "operationName")]
    operation_name: Option<String>,
}

fn apply_cors(mut response: HttpReply, cors: &CorsCfg) -> HttpReply {
    if !cors.enabled {
        return response;
    }
    let headers = response.headers_mut();
    let origin = if cors.allowed_origins.is_empty() {
        "*".to_owned()
    } else {
        cors.allowed_origins.join(", ")
    };
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert("Access-Control-Allow-Origin", value);
    }
    if !cors.allowed_headers.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&cors.allowed_headers.join(", ")) {
            headers.insert("Access-Control-Allow-Headers", value);
        }
    }
    response
}

fn plain_response(status: StatusCode, body: impl Into<String>) -> HttpReply {
    warp::reply::with_status(body.into(), status).into_response()
}

async fn handle_options(config: Arc<GatewayConfig>) -> Result<HttpReply, Infallible> {
    Ok(apply_cors(plain_response(StatusCode::OK, ""), &config.cors))
}

async fn handle_get(cluster: String, registry: Arc<ClusterRegistry>) -> Result<HttpReply, Infallible> {
    let Some(handler) = registry.get(&cluster).await else {
        return Ok(plain_response(StatusCode::NOT_FOUND, "cluster not found"));
    };
    let endpoint = format!("/{cluster}/graphql");
    let page = playground::render(&endpoint, handler.handler_cfg.graphiql);
    Ok(warp::reply::html(page).into_response())
}

#[allow(clippy::too_many_arguments)]
async fn handle_post(
    cluster: String,
    registry: Arc<ClusterRegistry>,
    config: Arc<GatewayConfig>,
    authorization: Option<String>,
    accept: Option<String>,
    body: Bytes,
) -> Result<HttpReply, Infallible> {
    let Some(handler) = registry.get(&cluster).await else {
        return Ok(plain_response(StatusCode::NOT_FOUND, "cluster not found"));
    };

    let token = extract_bearer(authorization.as_deref());
    if !config.local_development && token.is_none() {
        return Ok(apply_cors(
            plain_response(StatusCode::UNAUTHORIZED, "Authorization header is required"),
            &config.cors,
        ));
    }

    if config.introspection_authentication && looks_like_introspection(&body) {
        if let Some(token) = &token {
            if let Err(err) = handler.probe_version(token).await {
                return Ok(apply_cors(plain_response(StatusCode::UNAUTHORIZED, err.to_string()), &config.cors));
            }
        }
    }

    let parsed: GraphQlBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return Ok(apply_cors(
                plain_response(StatusCode::BAD_REQUEST, format!("malformed request body: {err}")),
                &config.cors,
            ));
        }
    };

    let rest = match handler.rest_client_for(&config, token.clone()) {
        Ok(rest) => rest,
        Err(err) => {
            error!(%err, "failed to build rest client");
            return Ok(apply_cors(plain_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()), &config.cors));
        }
    };
    let request_context = crate::context::RequestContext::new(
        crate::context::BearerToken(token),
        crate::context::WorkspacePrefix(None),
        crate::context::ClusterName(cluster),
        rest,
    );

    let mut request = GqlRequest::new(parsed.query).data(request_context);
    if let Some(name) = parsed.operation_name {
        request = request.operation_name(name);
    }
    if let Some(variables) = parsed.variables {
        request = request.variables(Variables::from_json(variables));
    }

    let wants_sse = accept.as_deref().is_some_and(|a| a.contains("text/event-stream"));
    let reply = if wants_sse {
        let stream = handler.schema.execute_stream(request);
        sse::reply(stream).into_response()
    } else {
        let response = handler.schema.execute(request).await;
        warp::reply::json(&response).into_response()
    };
    Ok(apply_cors(reply, &config.cors))
}

fn with_registry(registry: Arc<ClusterRegistry>) -> impl Filter<Extract = (Arc<ClusterRegistry>,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

fn with_config(config: Arc<GatewayConfig>) -> impl Filter<Extract = (Arc<GatewayConfig>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

/// Build the full routing table (spec.md §4.7, §6): exactly two non-empty
/// path segments are required for the GraphQL endpoint; everything else is
/// `404`.
pub fn routes(
    registry: Arc<ClusterRegistry>,
    config: Arc<GatewayConfig>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("healthz")
        .and(warp::path::end())
        .and(with_registry(registry.clone()))
        .map(|registry: Arc<ClusterRegistry>| {
            if registry.is_ready() {
                StatusCode::OK.into_response()
            } else {
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
        });

    let options = warp::options()
        .and(warp::path::param::<String>())
        .and(warp::path("graphql"))
        .and(warp::path::end())
        .and(with_config(config.clone()))
        .and_then(|_cluster: String, config: Arc<GatewayConfig>| handle_options(config));

    let get = warp::get()
        .and(warp::path::param::<String>())
        .and(warp::path("graphql"))
        .and(warp::path::end())
        .and(with_registry(registry.clone()))
        .and_then(handle_get);

    let post = warp::post()
        .and(warp::path::param::<String>())
        .and(warp::path("graphql"))
        .and(warp::path::end())
        .and(with_registry(registry))
        .and(with_config(config))
        .and(warp::header::optional::<String>("authorization"))
        .and(warp::header::optional::<String>("accept"))
        .and(warp::body::bytes())
        .and_then(handle_post);

    health.or(options).unify().or(get).unify().or(post).unify()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token_case_insensitively() {
        assert_eq!(extract_bearer(Some("Bearer abc")).as_deref(), Some("abc"));
        assert_eq!(extract_bearer(Some("bearer xyz")).as_deref(), Some("xyz"));
        assert_eq!(extract_bearer(Some("Basic abc")), None);
        assert_eq!(extract_bearer(None), None);
    }

    #[test]
    fn detects_introspection_queries() {
        assert!(looks_like_introspection(br#"{"query":"{ __schema { types { name } } }"}"#));
        assert!(!looks_like_introspection(br#"{"query":"{ core { Pod(name:\"x\") { metadata { name } } } }"}"#));
    }
}
