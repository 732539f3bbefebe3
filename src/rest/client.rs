//! Thin wrapper over a Kubernetes REST client (spec.md §1: "the concrete
//! Kubernetes REST wire format ... assumed implemented by a client
//! library"). This wraps `kube::Api<DynamicObject>`, keyed per-call by GVK
//! since the set of resource kinds is discovered at runtime from OpenAPI
//! rather than known at compile time — the same shape `other_examples/`'s
//! `kube-rs` `api/dynamic.rs` and `api/typed.rs` use for ad hoc resources.

use futures::{Stream, StreamExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams, WatchEvent as KubeWatchEvent, WatchParams},
    Client,
};
use serde_json::Value as Json;

use crate::error::{GatewayError, Result};
use crate::types::{GroupVersionKind, Scope};

/// One page of a `list` call, mirroring the metadata spec.md §4.3
/// ("ListItems") says must be copied through verbatim.
pub struct ListPage {
    pub resource_version: Option<String>,
    pub items: Vec<Json>,
    pub continue_token: Option<String>,
    pub remaining_item_count: Option<i64>,
}

/// A single watch-stream event (ADDED/MODIFIED/DELETED/ERROR), with the
/// object already converted to a generic JSON map (spec.md §4.4 step 5:
/// non-`Unstructured` events are a resolver-level error, handled by the
/// caller since only it knows the subscription context).
pub enum RawWatchEvent {
    Added(Json),
    Modified(Json),
    Deleted(Json),
    Error(String),
}

/// Per-cluster REST client. One instance is shared (behind `Arc`) by every
/// resolver for that cluster, wrapping the transport-chain-wrapped
/// `kube::Client` built in `cluster::handler` (spec.md §4.5, §4.8).
pub struct RestClient {
    client: Client,
}

fn api_resource(gvk: &GroupVersionKind, plural: &str) -> ApiResource {
    ApiResource {
        group: gvk.group.clone(),
        version: gvk.version.clone(),
        api_version: if gvk.group.is_empty() {
            gvk.version.clone()
        } else {
            format!("{}/{}", gvk.group, gvk.version)
        },
        kind: gvk.kind.clone(),
        plural: plural.to_owned(),
    }
}

fn api_for(client: &Client, gvk: &GroupVersionKind, plural: &str, scope: Scope, namespace: Option<&str>) -> Api<DynamicObject> {
    let resource = api_resource(gvk, plural);
    match (scope, namespace) {
        (Scope::Namespaced, Some(ns)) => Api::namespaced_with(client.clone(), ns, &resource),
        _ => Api::all_with(client.clone(), &resource),
    }
}

impl RestClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        limit: Option<i64>,
        continue_token: Option<&str>,
    ) -> Result<ListPage> {
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        if let Some(limit) = limit {
            params = params.limit(limit as u32);
        }
        if let Some(token) = continue_token {
            params = params.continue_token(token);
        }
        let list = api.list(&params).await.map_err(GatewayError::Kube)?;
        let resource_version = list.metadata.resource_version.clone();
        let continue_token = list.metadata.continue_.clone();
        let remaining_item_count = list.metadata.remaining_item_count;
        let items = list
            .items
            .into_iter()
            .map(|obj| serde_json::to_value(obj).unwrap_or(Json::Null))
            .collect();
        Ok(ListPage {
            resource_version,
            items,
            continue_token,
            remaining_item_count,
        })
    }

    pub async fn get(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Json> {
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let obj = api.get(name).await.map_err(GatewayError::Kube)?;
        serde_json::to_value(obj).map_err(GatewayError::Json)
    }

    pub async fn create(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        mut body: serde_json::Map<String, Json>,
        dry_run: &[String],
    ) -> Result<Json> {
        body.insert("apiVersion".into(), Json::String(api_resource(gvk, plural).api_version));
        body.insert("kind".into(), Json::String(gvk.kind.clone()));
        let object: DynamicObject = serde_json::from_value(Json::Object(body)).map_err(GatewayError::Json)?;
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let mut params = PostParams::default();
        if !dry_run.is_empty() {
            params.dry_run = true;
        }
        let created = api.create(&params, &object).await.map_err(GatewayError::Kube)?;
        serde_json::to_value(created).map_err(GatewayError::Json)
    }

    /// Merge-patch update: the caller has already verified the object
    /// exists (spec.md §4.3 "UpdateItem" requires a GET first).
    pub async fn merge_patch(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        name: &str,
        patch: &Json,
        dry_run: &[String],
    ) -> Result<Json> {
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let mut params = PatchParams::default();
        if !dry_run.is_empty() {
            params = params.dry_run();
        }
        let patched = api
            .patch(name, &params, &Patch::Merge(patch))
            .await
            .map_err(GatewayError::Kube)?;
        serde_json::to_value(patched).map_err(GatewayError::Json)
    }

    pub async fn delete(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        name: &str,
        dry_run: &[String],
    ) -> Result<()> {
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let mut params = DeleteParams::default();
        if !dry_run.is_empty() {
            params.dry_run = true;
        }
        api.delete(name, &params).await.map_err(GatewayError::Kube)?;
        Ok(())
    }

    /// Open a watch, optionally scoped to a single `name`, starting at
    /// `resource_version` (spec.md §4.4 "Lifecycle", step 2).
    pub async fn watch(
        &self,
        gvk: &GroupVersionKind,
        plural: &str,
        scope: Scope,
        namespace: Option<&str>,
        label_selector: Option<&str>,
        resource_version: &str,
    ) -> Result<impl Stream<Item = Result<RawWatchEvent>>> {
        let api = api_for(&self.client, gvk, plural, scope, namespace);
        let mut params = WatchParams::default().timeout(290);
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let stream = api
            .watch(&params, resource_version)
            .await
            .map_err(GatewayError::Kube)?;
        Ok(stream.map(|item| match item {
            Ok(KubeWatchEvent::Added(obj)) => Ok(RawWatchEvent::Added(to_json(obj))),
            Ok(KubeWatchEvent::Modified(obj)) => Ok(RawWatchEvent::Modified(to_json(obj))),
            Ok(KubeWatchEvent::Deleted(obj)) => Ok(RawWatchEvent::Deleted(to_json(obj))),
            Ok(KubeWatchEvent::Bookmark(_)) => Ok(RawWatchEvent::Error(String::new())),
            Ok(KubeWatchEvent::Error(resp)) => Err(GatewayError::upstream(resp.message)),
            Err(err) => Err(GatewayError::upstream(err.to_string())),
        }))
    }
}

fn to_json(obj: DynamicObject) -> Json {
    serde_json::to_value(obj).unwrap_or(Json::Null)
}

/// Placeholder metadata used to build a delete-only `DynamicObject` when the
/// REST call needs just `{gvk, name, namespace}` (spec.md §4.3 "DeleteItem").
pub fn placeholder(gvk: &GroupVersionKind, plural: &str, name: &str, namespace: Option<&str>) -> DynamicObject {
    DynamicObject {
        types: Some(kube::api::TypeMeta {
            api_version: api_resource(gvk, plural).api_version,
            kind: gvk.kind.clone(),
        }),
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: namespace.map(str::to_owned),
            ..Default::default()
        },
        data: Json::Null,
    }
}
