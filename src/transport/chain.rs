//! Transport Chain (spec.md §4.8): the per-cluster admin HTTP transport,
//! built as a `tower` `Layer`/`Service` stack — the same role Go's
//! `http.RoundTripper` chain plays in the original gateway, expressed with
//! `tower`'s middleware traits instead.
//!
//! Order (outermost first, matching request flow): discovery pass-through,
//! missing-token rejection, bearer injection, impersonation. Each layer
//! either short-circuits with a response of its own or rewrites the request
//! before calling the inner service.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use http::{Request, Response, StatusCode};
use serde_json::Value as Json;
use tower::{Layer, Service};

use crate::config::GatewayConfig;
use crate::transport::service_account::AdminTokenSource;

/// Strip a leading `/services/<name>/clusters/<workspace>` or
/// `/clusters/<workspace>` prefix before checking whether the remaining path
/// is a discovery path the chain should let straight through (spec.md §4.8
/// "Workspace prefixes").
fn strip_workspace_prefix(path: &str) -> &str {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let prefix = match segments.as_slice() {
        ["services", name, "clusters", workspace, ..] => vec!["services", name, "clusters", workspace],
        ["clusters", workspace, ..] => vec!["clusters", workspace],
        _ => return path,
    };
    let prefix_len: usize = prefix.iter().map(|s| s.len() + 1).sum();
    path.get(prefix_len..).filter(|s| s.starts_with('/')).unwrap_or(path)
}

/// `true` for the exact discovery paths the chain must pass through
/// unmodified: `/api`, `/apis`, `/api/v1`, `/apis/<group>`,
/// `/apis/<group>/<version>` (spec.md §4.8).
fn is_discovery_path(path: &str) -> bool {
    let trimmed = strip_workspace_prefix(path);
    let segments: Vec<&str> = trimmed.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    matches!(segments.as_slice(), ["api"] | ["apis"] | ["api", "v1"] | ["apis", _] | ["apis", _, _])
}

/// Pass discovery requests through with the workspace prefix stripped,
/// forwarded with admin credentials regardless of whether the caller
/// presented a token (spec.md §4.8 "Discovery pass-through"); everything
/// else is forwarded untouched by this layer (later layers still apply).
#[derive(Clone)]
pub struct DiscoveryLayer {
    pub admin: AdminTokenSource,
}

impl<S> Layer<S> for DiscoveryLayer {
    type Service = DiscoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DiscoveryService {
            inner,
            admin: self.admin.clone(),
        }
    }
}

#[derive(Clone)]
pub struct DiscoveryService<S> {
    inner: S,
    admin: AdminTokenSource,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DiscoveryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<tower::BoxError>,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = tower::BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let discovery = is_discovery_path(req.uri().path());
        if discovery {
            let stripped = strip_workspace_prefix(req.uri().path()).to_owned();
            if stripped != req.uri().path() {
                let mut parts = req.uri().clone().into_parts();
                let path_and_query = match req.uri().query() {
                    Some(q) => format!("{stripped}?{q}"),
                    None => stripped,
                };
                parts.path_and_query = path_and_query.parse().ok();
                if let Ok(uri) = http::Uri::from_parts(parts) {
                    *req.uri_mut() = uri;
                }
            }
        }
        let admin = self.admin.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if discovery {
                let token = admin.token().await?;
                req.extensions_mut().insert(BearerToken(token));
            }
            inner.call(req).await.map_err(Into::into)
        })
    }
}

/// Reject any request that has no bearer token attached, before it reaches
/// the Kubernetes API server (spec.md §4.8 "Missing-token sentinel"). Local
/// development bypasses this entirely (the layer is never installed).
#[derive(Clone)]
pub struct RequireTokenLayer;

impl<S> Layer<S> for RequireTokenLayer {
    type Service = RequireTokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireTokenService { inner }
    }
}

#[derive(Clone)]
pub struct RequireTokenService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequireTokenService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ResBody: Default + Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if req.extensions().get::<BearerToken>().is_none() {
            let mut response = Response::new(ResBody::default());
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            return Box::pin(async move { Ok(response) });
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// The bearer token carried in request extensions by the HTTP front door
/// (spec.md §4.8, §9 "Request-scoped context").
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

/// Stamp every outgoing request with the token of the caller this
/// particular `kube::Client` instance was built for. `RestClient` builds
/// one short-lived layered client per incoming GraphQL request (spec.md §5:
/// "each request is handled on its own thread of execution"), so this layer
/// closes over a fixed token rather than reading one from caller-supplied
/// extensions.
#[derive(Clone)]
pub struct TokenExtensionLayer {
    pub token: Option<BearerToken>,
}

impl<S> Layer<S> for TokenExtensionLayer {
    type Service = TokenExtensionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenExtensionService {
            inner,
            token: self.token.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenExtensionService<S> {
    inner: S,
    token: Option<BearerToken>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TokenExtensionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if let Some(token) = self.token.clone() {
            req.extensions_mut().insert(token);
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Strip any caller-supplied `Authorization` header and replace it with the
/// caller's bearer token (spec.md §4.8 "Bearer injection").
#[derive(Clone)]
pub struct BearerInjectionLayer;

impl<S> Layer<S> for BearerInjectionLayer {
    type Service = BearerInjectionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerInjectionService { inner }
    }
}

#[derive(Clone)]
pub struct BearerInjectionService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for BearerInjectionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.headers_mut().remove(http::header::AUTHORIZATION);
        if let Some(token) = req.extensions().get::<BearerToken>().cloned() {
            if let Ok(value) = http::HeaderValue::from_str(&format!("Bearer {}", token.0)) {
                req.headers_mut().insert(http::header::AUTHORIZATION, value);
            }
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Decode the caller's bearer token as an unverified JWT (no signature
/// check — the API server itself authenticates the token; this layer only
/// reads the `username_claim` to set `Impersonate-User`), rejecting with 401
/// on any parse failure (spec.md §4.8 "Impersonation").
#[derive(Clone)]
pub struct ImpersonationLayer {
    pub username_claim: String,
}

impl<S> Layer<S> for ImpersonationLayer {
    type Service = ImpersonationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ImpersonationService {
            inner,
            username_claim: self.username_claim.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ImpersonationService<S> {
    inner: S,
    username_claim: String,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ImpersonationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ResBody: Default + Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let token = req.extensions().get::<BearerToken>().cloned();
        let username = token.and_then(|t| decode_username_claim(&t.0, &self.username_claim));
        let Some(username) = username else {
            let mut response = Response::new(ResBody::default());
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            return Box::pin(async move { Ok(response) });
        };
        if let Ok(value) = http::HeaderValue::from_str(&username) {
            req.headers_mut().insert("Impersonate-User", value);
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Decode the JWT's payload segment (the middle of its three dot-separated
/// parts) as base64url JSON and pull out a string-valued claim. Returns
/// `None` on any malformed input or non-string claim (spec.md §4.8).
fn decode_username_claim(token: &str, claim: &str) -> Option<String> {
    let payload_segment = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    let claims: Json = serde_json::from_slice(&decoded).ok()?;
    claims.get(claim)?.as_str().map(str::to_owned)
}

/// Build the full chain for a non-local-development cluster (spec.md §4.8):
/// discovery pass-through is always installed; the remaining layers are
/// conditional on `config.should_impersonate`/`config.local_development`.
pub fn build_layer_stack(
    config: &GatewayConfig,
    admin: AdminTokenSource,
) -> (DiscoveryLayer, Option<RequireTokenLayer>, BearerInjectionLayer, Option<ImpersonationLayer>) {
    let require_token = if config.local_development { None } else { Some(RequireTokenLayer) };
    let impersonation = if config.should_impersonate {
        Some(ImpersonationLayer {
            username_claim: config.username_claim.clone(),
        })
    } else {
        None
    };
    (DiscoveryLayer { admin }, require_token, BearerInjectionLayer, impersonation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_path_matches_group_and_version() {
        assert!(is_discovery_path("/apis/apps/v1"));
        assert!(is_discovery_path("/apis/apps"));
        assert!(is_discovery_path("/api/v1"));
        assert!(is_discovery_path("/api"));
        assert!(!is_discovery_path("/apis/apps/v1/namespaces/default/deployments"));
    }

    #[test]
    fn workspace_prefix_is_stripped_before_matching() {
        let path = "/clusters/root:org/apis/apps/v1";
        assert_eq!(strip_workspace_prefix(path), "/apis/apps/v1");
    }

    #[test]
    fn username_claim_decodes_from_unverified_jwt() {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = URL_SAFE_NO_PAD.encode(b"{\"preferred_username\":\"alice\"}");
        let token = format!("{header}.{payload}.sig");
        assert_eq!(decode_username_claim(&token, "preferred_username").as_deref(), Some("alice"));
    }

    #[test]
    fn malformed_token_yields_none() {
        assert_eq!(decode_username_claim("not-a-jwt", "sub"), None);
    }
}
