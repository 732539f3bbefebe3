//! Request-scoped values threaded through resolvers (spec.md §9
//! "Request-scoped context").
//!
//! Three values flow per request: the bearer token, an optional
//! workspace/cluster identifier (used only by the discovery-URL rewriting in
//! the transport chain), and the logical cluster name. Each is its own type
//! rather than a stringly-typed map key, so a resolver asking for the wrong
//! thing is a compile error, not a silent `None`.

use std::sync::Arc;

use crate::rest::RestClient;

/// The bearer token presented by the caller, if any.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(pub Option<String>);

/// An optional `{services/<s>/clusters/<w>}` or `{clusters/<w>}` workspace
/// prefix extracted from the original request path (spec.md §4.8, "Workspace
/// prefixes ... are stripped before the pattern match").
#[derive(Debug, Clone, Default)]
pub struct WorkspacePrefix(pub Option<String>);

/// The logical cluster name selected by the HTTP front door's routing
/// (spec.md §4.7 "Routing").
#[derive(Debug, Clone)]
pub struct ClusterName(pub String);

/// Everything a resolver needs beyond its own closure-captured `(GVK, Scope)`.
///
/// Held inside `async_graphql::Context::data()` for the duration of a single
/// GraphQL operation.
pub struct RequestContext {
    pub token: BearerToken,
    pub workspace: WorkspacePrefix,
    pub cluster: ClusterName,
    pub rest: Arc<RestClient>,
}

impl RequestContext {
    pub fn new(
        token: BearerToken,
        workspace: WorkspacePrefix,
        cluster: ClusterName,
        rest: Arc<RestClient>,
    ) -> Self {
        Self {
            token,
            workspace,
            cluster,
            rest,
        }
    }
}
