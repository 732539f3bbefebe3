//! Crate-wide error taxonomy (spec.md §7).
//!
//! Every fallible path in the gateway produces a [`GatewayError`]. Resolvers
//! convert it into a GraphQL field error message; the HTTP front door
//! converts it into a status code; the schema builder and watcher log it and
//! continue rather than propagating it upward.

use derive_more::{Display, Error};

/// Taxonomy of errors raised anywhere in the gateway.
///
/// The variants mirror spec.md §7's taxonomy exactly: input errors surface as
/// GraphQL field errors, upstream errors carry the API server's message,
/// auth errors become HTTP-level rejections, schema-build and lifecycle
/// errors are logged by their callers rather than bubbled to a client.
#[derive(Debug, Display, Error)]
pub enum GatewayError {
    /// Missing/invalid argument, malformed selector, malformed `sortBy`.
    #[display("invalid argument: {_0}")]
    Input(#[error(not(source))] String),

    /// A REST call to the API server failed, or the watch stream produced a
    /// non-`Unstructured` event.
    #[display("upstream error: {_0}")]
    Upstream(#[error(not(source))] String),

    /// Missing or rejected bearer token, or a JWT claim could not be parsed.
    #[display("authentication failed: {_0}")]
    Auth(#[error(not(source))] String),

    /// The assembled root schema was rejected by the GraphQL engine.
    #[display("schema build failed: {_0}")]
    SchemaBuild(#[error(not(source))] String),

    /// Directory walk, file read, or watch-event-channel failure.
    #[display("lifecycle error: {_0}")]
    Lifecycle(#[error(not(source))] String),

    /// A live subscription could not continue (invalid arguments, or the
    /// upstream watch reported `resource version too old`).
    #[display("subscription error: {_0}")]
    Subscription(#[error(not(source))] String),

    /// Configuration key missing or malformed at startup.
    #[display("configuration error: {_0}")]
    Config(#[error(not(source))] String),

    #[display("{_0}")]
    Kube(kube::Error),

    #[display("{_0}")]
    Json(serde_json::Error),

    #[display("{_0}")]
    Yaml(serde_yaml::Error),
}

impl GatewayError {
    pub fn input(msg: impl Into<String>) -> Self {
        GatewayError::Input(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        GatewayError::Upstream(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        GatewayError::Auth(msg.into())
    }

    pub fn schema_build(msg: impl Into<String>) -> Self {
        GatewayError::SchemaBuild(msg.into())
    }

    pub fn lifecycle(msg: impl Into<String>) -> Self {
        GatewayError::Lifecycle(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        GatewayError::Subscription(msg.into())
    }

    /// `true` when a relation lookup (spec.md §4.1 "Relation expansion")
    /// should degrade to `null` instead of surfacing an error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Kube(kube::Error::Api(resp)) if resp.code == 404)
    }
}

/// Convert into a GraphQL-facing error, losing internal detail that must not
/// reach a client (e.g. we never echo back a bearer token).
impl From<GatewayError> for async_graphql::Error {
    fn from(err: GatewayError) -> Self {
        async_graphql::Error::new(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
