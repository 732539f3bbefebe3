//! Live subscriptions over Kubernetes watch streams (spec.md §4.4
//! "Subscriptions").
//!
//! Every resource registers two subscription fields: a singular one scoped
//! to a single named object, and a plural one scoped to a whole
//! collection. Both open (or resume) the same watch and diff each
//! `MODIFIED` event against the previous snapshot at field granularity,
//! emitting an `Event{type, object}` envelope only when a field the caller
//! actually selected changed — unless the caller passed `subscribeToAll`,
//! which bypasses the diff entirely.

use std::collections::HashMap;

use async_graphql::dynamic::{FieldValue, ResolverContext, SubscriptionField, SubscriptionFieldFuture, TypeRef};
use serde_json::Value as Json;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::resolver::crud::{sort_items, ResourceOps};
use crate::rest::RawWatchEvent;
use crate::schema::convert::json_to_field_value;

/// Snapshot of the most recently observed state of every object in this
/// subscription's scope, keyed by `namespace/name` (cluster-scoped objects
/// use a bare name) — spec.md §4.4 "PreviousObjects".
type PreviousObjects = HashMap<String, Json>;

fn snapshot_key(object: &Json) -> String {
    let metadata = object.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(Json::as_str)
        .unwrap_or_default();
    match metadata.and_then(|m| m.get("namespace")).and_then(Json::as_str) {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_owned(),
    }
}

fn envelope(event_type: &str, object: Json) -> Json {
    let mut map = serde_json::Map::new();
    map.insert("type".into(), Json::String(event_type.to_owned()));
    map.insert("object".into(), object);
    Json::Object(map)
}

fn object_name(object: &Json) -> Option<&str> {
    object.get("metadata").and_then(|m| m.get("name")).and_then(Json::as_str)
}

/// `Subscription<subscriptionFieldName>` — spec.md §4.2 step 4, §4.4.
/// `singular` selects the argument set: a single named object (required
/// `name`, optional `namespace`) or a whole collection (optional
/// `namespace`, `labelSelector`, `sortBy`, `limit`, `continue`). Both carry
/// `resourceVersion` (resume point) and `subscribeToAll` (bypass the
/// field-diff check).
pub fn build_subscription_field(ops: ResourceOps, field_name: String, event_type_name: &str, singular: bool) -> SubscriptionField {
    let field = SubscriptionField::new(field_name, TypeRef::named_nn(event_type_name), move |ctx| {
        let ops = ops.clone();
        SubscriptionFieldFuture::new(async move { open_subscription(ops, ctx, singular).await })
    });
    let field = if singular {
        field.argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
    } else {
        field
            .argument(async_graphql::dynamic::InputValue::new("labelSelector", TypeRef::named(TypeRef::STRING)))
            .argument(async_graphql::dynamic::InputValue::new("sortBy", TypeRef::named(TypeRef::STRING)))
            .argument(async_graphql::dynamic::InputValue::new("limit", TypeRef::named(TypeRef::INT)))
            .argument(async_graphql::dynamic::InputValue::new("continue", TypeRef::named(TypeRef::STRING)))
    };
    field
        .argument(async_graphql::dynamic::InputValue::new("namespace", TypeRef::named(TypeRef::STRING)))
        .argument(async_graphql::dynamic::InputValue::new(
            "resourceVersion",
            TypeRef::named(TypeRef::STRING),
        ))
        .argument(async_graphql::dynamic::InputValue::new(
            "subscribeToAll",
            TypeRef::named(TypeRef::BOOLEAN),
        ))
}

async fn open_subscription(
    ops: ResourceOps,
    ctx: ResolverContext<'_>,
    singular: bool,
) -> async_graphql::Result<impl futures::Stream<Item = async_graphql::Result<FieldValue<'static>>> + Send + 'static> {
    let rc = ctx
        .ctx
        .data::<RequestContext>()
        .map_err(|_| GatewayError::upstream("missing request context"))?
        .rest
        .clone();
    let namespace = super::args::get_string(&ctx, "namespace", false)?;
    let name_filter = if singular {
        Some(super::args::get_string(&ctx, "name", true)?.expect("required"))
    } else {
        None
    };
    let label_selector = if singular { None } else { super::args::get_string(&ctx, "labelSelector", false)? };
    let sort_by = if singular { None } else { super::args::get_string(&ctx, "sortBy", false)? };
    let limit = if singular { None } else { super::args::get_i64(&ctx, "limit")? };
    let continue_token = if singular { None } else { super::args::get_string(&ctx, "continue", false)? };
    let requested_fields = selected_object_fields(&ctx);
    let start_resource_version = super::args::get_string(&ctx, "resourceVersion", false)?;
    let subscribe_to_all = super::args::get_bool(&ctx, "subscribeToAll", false)?;

    Ok(async_stream::try_stream! {
        let mut previous: PreviousObjects = HashMap::new();
        let gvk = ops.real_gvk();

        let watch_from = match start_resource_version {
            Some(rv) => rv,
            None => {
                let page = rc
                    .list(&gvk, &ops.plural, ops.scope, namespace.as_deref(), label_selector.as_deref(), limit, continue_token.as_deref())
                    .await?;
                let mut items = page.items;
                if let Some(sort_by) = &sort_by {
                    sort_items(&mut items, sort_by)?;
                }
                for item in items {
                    if name_filter.as_deref().is_some_and(|n| object_name(&item) != Some(n)) {
                        continue;
                    }
                    previous.insert(snapshot_key(&item), item.clone());
                    yield json_to_field_value(&envelope("ADDED", item));
                }
                page.resource_version.unwrap_or_default()
            }
        };

        let mut stream = std::pin::pin!(
            rc.watch(&gvk, &ops.plural, ops.scope, namespace.as_deref(), label_selector.as_deref(), &watch_from)
                .await?
        );
        use futures::StreamExt;
        while let Some(event) = stream.next().await {
            match event? {
                RawWatchEvent::Added(object) => {
                    if name_filter.as_deref().is_some_and(|n| object_name(&object) != Some(n)) {
                        continue;
                    }
                    previous.insert(snapshot_key(&object), object.clone());
                    yield json_to_field_value(&envelope("ADDED", object));
                }
                RawWatchEvent::Modified(object) => {
                    if name_filter.as_deref().is_some_and(|n| object_name(&object) != Some(n)) {
                        continue;
                    }
                    let key = snapshot_key(&object);
                    let changed = subscribe_to_all || match previous.get(&key) {
                        Some(prev) => fields_changed(prev, &object, &requested_fields),
                        None => true,
                    };
                    previous.insert(key, object.clone());
                    if changed {
                        yield json_to_field_value(&envelope("MODIFIED", object));
                    }
                }
                RawWatchEvent::Deleted(object) => {
                    if name_filter.as_deref().is_some_and(|n| object_name(&object) != Some(n)) {
                        continue;
                    }
                    previous.remove(&snapshot_key(&object));
                    yield json_to_field_value(&envelope("DELETED", object));
                }
                RawWatchEvent::Error(message) => {
                    Err(GatewayError::subscription(message))?;
                }
            }
        }
    })
}

/// Gather the dotted field paths the caller selected under `object` in the
/// subscription's selection set (spec.md §4.4 "field granularity"). An empty
/// result means every field was requested (e.g. a bare `object` without
/// sub-selection, or introspection), so every change is significant.
fn selected_object_fields(ctx: &ResolverContext<'_>) -> Vec<Vec<String>> {
    for top in ctx.ctx.field().selection_set() {
        if top.name() == "object" {
            return collect_selected_paths(&top, Vec::new());
        }
    }
    Vec::new()
}

fn collect_selected_paths(node: &async_graphql::SelectionField<'_>, prefix: Vec<String>) -> Vec<Vec<String>> {
    let children: Vec<async_graphql::SelectionField<'_>> = node.selection_set().collect();
    if children.is_empty() {
        return vec![prefix];
    }
    children
        .into_iter()
        .flat_map(|child| {
            let mut path = prefix.clone();
            path.push(child.name().to_owned());
            collect_selected_paths(&child, path)
        })
        .collect()
}

/// `true` if any requested dotted path differs between `prev` and `next`.
/// Arrays compare as whole values; a path present on only one side counts as
/// changed (spec.md §4.4 "field granularity change detection").
fn fields_changed(prev: &Json, next: &Json, paths: &[Vec<String>]) -> bool {
    if paths.is_empty() || paths.iter().any(Vec::is_empty) {
        return prev != next;
    }
    paths.iter().any(|path| lookup(prev, path) != lookup(next, path))
}

fn lookup<'a>(value: &'a Json, path: &[String]) -> Option<&'a Json> {
    let mut current = value;
    for segment in path {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_key_is_namespace_scoped_when_present() {
        let object = json!({"metadata": {"name": "a", "namespace": "ns"}});
        assert_eq!(snapshot_key(&object), "ns/a");
    }

    #[test]
    fn snapshot_key_is_bare_name_for_cluster_scoped() {
        let object = json!({"metadata": {"name": "a"}});
        assert_eq!(snapshot_key(&object), "a");
    }

    #[test]
    fn unchanged_requested_fields_suppress_the_event() {
        let prev = json!({"spec": {"replicas": 3}, "status": {"ready": 1}});
        let next = json!({"spec": {"replicas": 3}, "status": {"ready": 2}});
        let paths = vec![vec!["spec".to_owned(), "replicas".to_owned()]];
        assert!(!fields_changed(&prev, &next, &paths));
    }

    #[test]
    fn changed_requested_field_reports_change() {
        let prev = json!({"spec": {"replicas": 3}});
        let next = json!({"spec": {"replicas": 4}});
        let paths = vec![vec!["spec".to_owned(), "replicas".to_owned()]];
        assert!(fields_changed(&prev, &next, &paths));
    }

    #[test]
    fn missing_path_on_one_side_counts_as_changed() {
        let prev = json!({"spec": {}});
        let next = json!({"spec": {"replicas": 4}});
        let paths = vec![vec!["spec".to_owned(), "replicas".to_owned()]];
        assert!(fields_changed(&prev, &next, &paths));
    }

    #[test]
    fn empty_path_list_falls_back_to_whole_object_compare() {
        let prev = json!({"a": 1});
        let next = json!({"a": 2});
        assert!(fields_changed(&prev, &next, &[]));
    }

    #[test]
    fn object_name_reads_metadata_name() {
        let object = json!({"metadata": {"name": "a"}});
        assert_eq!(object_name(&object), Some("a"));
    }
}
