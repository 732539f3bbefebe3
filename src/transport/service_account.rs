//! Service-account token cache (spec.md §4.8 "Service-account token
//! caching"): the gateway's own identity, used for discovery calls and for
//! administrative operations the transport chain performs on its own
//! behalf, refreshed shortly before expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::{GatewayError, Result};

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Issues and caches a service-account token, refreshing it at
/// `expires_at - min(lifetime / 10, 30s)` rather than on every call.
pub struct ServiceAccountTokenCache {
    inner: RwLock<Option<CachedToken>>,
    issuer: Box<dyn TokenIssuer>,
}

/// Abstraction over the in-cluster `TokenRequest` API so the cache can be
/// unit-tested without a live cluster.
#[async_trait::async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<(String, Duration)>;
}

impl ServiceAccountTokenCache {
    pub fn new(issuer: Box<dyn TokenIssuer>) -> Self {
        Self {
            inner: RwLock::new(None),
            issuer,
        }
    }

    /// Returns a still-valid cached token, or issues (and caches) a fresh
    /// one. Uses the double-checked-locking pattern so concurrent callers
    /// racing a refresh don't each issue their own token.
    pub async fn get(&self) -> Result<String> {
        {
            let guard = self.inner.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.inner.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let (token, lifetime) = self.issuer.issue().await?;
        let refresh_margin = lifetime / 10;
        let refresh_margin = refresh_margin.min(Duration::from_secs(30));
        let expires_at = Instant::now() + lifetime.saturating_sub(refresh_margin);
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }
}

/// `TokenIssuer` backed by the Kubernetes `TokenRequest` subresource for the
/// gateway's own service account.
pub struct KubeTokenIssuer {
    client: kube::Client,
    namespace: String,
    service_account: String,
}

impl KubeTokenIssuer {
    pub fn new(client: kube::Client, namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            service_account: service_account.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenIssuer for KubeTokenIssuer {
    async fn issue(&self) -> Result<(String, Duration)> {
        use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
        use kube::api::{Api, PostParams};

        let api: Api<TokenRequest> = Api::namespaced(self.client.clone(), &self.namespace);
        let request = TokenRequest {
            spec: TokenRequestSpec {
                expiration_seconds: Some(3600),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = api
            .create_subresource("token", &self.service_account, &PostParams::default(), serde_json::to_vec(&request).map_err(GatewayError::Json)?)
            .await
            .map_err(GatewayError::Kube)?;
        let token = result
            .status
            .and_then(|s| Some(s.token))
            .ok_or_else(|| GatewayError::upstream("TokenRequest response missing status.token"))?;
        Ok((token, Duration::from_secs(3600)))
    }
}

pub type SharedTokenCache = Arc<ServiceAccountTokenCache>;

/// The admin identity a cluster's Transport Chain uses for discovery
/// pass-through and, in service-account mode, as the token wrapped onto
/// every outgoing request (spec.md §4.5 step 3, §4.8 "Service-account
/// mode").
#[derive(Clone)]
pub enum AdminTokenSource {
    Static(String),
    Cached(SharedTokenCache),
}

impl AdminTokenSource {
    pub async fn token(&self) -> Result<String> {
        match self {
            AdminTokenSource::Static(token) => Ok(token.clone()),
            AdminTokenSource::Cached(cache) => cache.get().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIssuer {
        token: &'static str,
        lifetime: Duration,
    }

    #[async_trait::async_trait]
    impl TokenIssuer for FixedIssuer {
        async fn issue(&self) -> Result<(String, Duration)> {
            Ok((self.token.to_owned(), self.lifetime))
        }
    }

    #[tokio::test]
    async fn caches_token_until_near_expiry() {
        let cache = ServiceAccountTokenCache::new(Box::new(FixedIssuer {
            token: "tok-1",
            lifetime: Duration::from_secs(3600),
        }));
        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();
        assert_eq!(first, "tok-1");
        assert_eq!(second, "tok-1");
    }
}
