//! Per-cluster GraphQL gateway over Kubernetes-style APIs.
//!
//! A watched directory of OpenAPI-with-`x-cluster-metadata` schema
//! documents is turned into one live `async-graphql` dynamic schema per
//! cluster, served over HTTP at `/{cluster}/graphql` and proxied through a
//! per-request, token-scoped Kubernetes REST transport.

pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod resolver;
pub mod rest;
pub mod schema;
pub mod transport;
pub mod types;
pub mod watcher;
