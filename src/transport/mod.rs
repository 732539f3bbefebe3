//! Per-cluster admin HTTP transport: the layer stack from [`chain`] plus the
//! service-account token cache from [`service_account`], composed into the
//! `kube::Client` each cluster handler talks through (spec.md §4.8).

pub mod chain;
pub mod service_account;

pub use chain::{
    build_layer_stack, BearerInjectionLayer, BearerToken, DiscoveryLayer, ImpersonationLayer,
    RequireTokenLayer, TokenExtensionLayer,
};
pub use service_account::{KubeTokenIssuer, ServiceAccountTokenCache, SharedTokenCache, TokenIssuer};
