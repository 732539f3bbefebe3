//! HTTP front door routing tests (spec.md §4.7, SPEC_FULL.md §6 "Health
//! endpoint"): exercised without a live cluster by registering no handlers
//! and asserting the routing/readiness contract around that.

use std::sync::Arc;

use gateway::cluster::ClusterRegistry;
use gateway::config::{CorsCfg, GatewayConfig, HandlerCfg};

fn test_config() -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig {
        openapi_definitions_path: "/unused".to_owned(),
        port: 0,
        log_level: "info".to_owned(),
        local_development: true,
        handler: HandlerCfg::default(),
        cors: CorsCfg::default(),
        should_impersonate: false,
        username_claim: "preferred_username".to_owned(),
        introspection_authentication: false,
        enable_kcp: false,
    })
}

#[tokio::test]
async fn healthz_reports_503_before_the_initial_walk_completes() {
    let registry = Arc::new(ClusterRegistry::new());
    let routes = gateway::http::routes(registry, test_config());

    let response = warp::test::request().path("/healthz").reply(&routes).await;
    assert_eq!(response.status(), warp::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn healthz_reports_200_once_marked_ready() {
    let registry = Arc::new(ClusterRegistry::new());
    registry.mark_ready();
    let routes = gateway::http::routes(registry, test_config());

    let response = warp::test::request().path("/healthz").reply(&routes).await;
    assert_eq!(response.status(), warp::http::StatusCode::OK);
}

#[tokio::test]
async fn unknown_cluster_yields_404_on_get() {
    let registry = Arc::new(ClusterRegistry::new());
    let routes = gateway::http::routes(registry, test_config());

    let response = warp::test::request().path("/does-not-exist/graphql").reply(&routes).await;
    assert_eq!(response.status(), warp::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_cluster_yields_404_on_post() {
    let registry = Arc::new(ClusterRegistry::new());
    let routes = gateway::http::routes(registry, test_config());

    let response = warp::test::request()
        .method("POST")
        .path("/does-not-exist/graphql")
        .body(r#"{"query":"{ __typename }"}"#)
        .reply(&routes)
        .await;
    assert_eq!(response.status(), warp::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unrelated_paths_are_rejected() {
    let registry = Arc::new(ClusterRegistry::new());
    let routes = gateway::http::routes(registry, test_config());

    let response = warp::test::request().path("/").reply(&routes).await;
    assert_eq!(response.status(), warp::http::StatusCode::NOT_FOUND);
}
