//! Resolver Engine — CRUD (spec.md §4.3): list/get/create/update/delete
//! field resolvers bound to `(GVK, Scope)` and a shared REST client.

use std::cmp::Ordering;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, ResolverContext, TypeRef};
use async_graphql::Value as GqlValue;
use serde_json::Value as Json;

use crate::context::RequestContext;
use crate::error::{GatewayError, Result};
use crate::types::{GroupVersionKind, GvkIndex, Scope};

/// Everything a CRUD field closure needs, captured once at schema-build
/// time. `gvk.group` is the *sanitized* group name — resolvers rehydrate
/// the original via `gvk_index` immediately before calling the REST client
/// (spec.md §4.3 "Group name re-hydration", §8 invariant 4).
#[derive(Clone)]
pub struct ResourceOps {
    pub gvk: GroupVersionKind,
    pub plural: String,
    pub scope: Scope,
    pub gvk_index: Arc<GvkIndex>,
    pub properties: Arc<indexmap::IndexMap<String, crate::types::descriptor::PropertySchema>>,
}

impl ResourceOps {
    /// Recover the real GVK to hand to the REST client.
    pub(crate) fn real_gvk(&self) -> GroupVersionKind {
        let original_group = self
            .gvk_index
            .original(&self.gvk.group)
            .unwrap_or(&self.gvk.group)
            .to_owned();
        GroupVersionKind::new(original_group, self.gvk.version.clone(), self.gvk.kind.clone())
    }

    fn namespace_arg(&self, ctx: &ResolverContext<'_>) -> Result<Option<String>> {
        let namespace = super::args::get_string(ctx, "namespace", self.scope.is_namespaced())?;
        if !self.scope.is_namespaced() && namespace.is_some() {
            // Cluster-scoped resources never take a namespace argument in
            // the synthesized schema, so this can't actually happen; kept
            // for defense if a caller wires the field incorrectly.
            return Ok(None);
        }
        Ok(namespace)
    }

    fn request_context<'a>(&self, ctx: &'a ResolverContext<'_>) -> Result<&'a RequestContext> {
        ctx.ctx
            .data::<RequestContext>()
            .map_err(|_| GatewayError::upstream("missing request context"))
    }
}

/// Attach the `namespace` argument when (and only when) the resource is
/// namespace-scoped (spec.md §4.2 "Arguments").
fn with_namespace_argument(field: Field, ops: &ResourceOps) -> Field {
    if ops.scope.is_namespaced() {
        field.argument(async_graphql::dynamic::InputValue::new(
            "namespace",
            TypeRef::named_nn(TypeRef::STRING),
        ))
    } else {
        field
    }
}

/// `Query<Plural>` — spec.md §4.3 "ListItems".
pub fn build_list_field(ops: ResourceOps, list_type_name: &str) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(crate::schema::names::plural(&ops.gvk.kind), TypeRef::named_nn(list_type_name), move |ctx| {
        let ops = field_ops.clone();
        FieldFuture::new(async move { list_items(&ops, &ctx).await })
    });
    let field = with_namespace_argument(field, &ops);
    field
        .argument(async_graphql::dynamic::InputValue::new("labelSelector", TypeRef::named(TypeRef::STRING)))
        .argument(async_graphql::dynamic::InputValue::new(
            "sortBy",
            TypeRef::named(TypeRef::STRING),
        ))
        .argument(async_graphql::dynamic::InputValue::new("limit", TypeRef::named(TypeRef::INT)))
        .argument(async_graphql::dynamic::InputValue::new("continue", TypeRef::named(TypeRef::STRING)))
}

async fn list_items(ops: &ResourceOps, ctx: &ResolverContext<'_>) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let rc = ops.request_context(ctx)?;
    let label_selector = super::args::get_string(ctx, "labelSelector", false)?;
    let sort_by = super::args::get_string(ctx, "sortBy", false)?.unwrap_or_else(|| "metadata.name".to_owned());
    let limit = super::args::get_i64(ctx, "limit")?;
    let continue_token = super::args::get_string(ctx, "continue", false)?;
    let namespace = ops.namespace_arg(ctx)?;

    let gvk = ops.real_gvk();
    let page = rc
        .rest
        .list(
            &gvk,
            &ops.plural,
            ops.scope,
            namespace.as_deref(),
            label_selector.as_deref(),
            limit,
            continue_token.as_deref(),
        )
        .await?;

    let mut items = page.items;
    sort_items(&mut items, &sort_by)?;

    let mut result = serde_json::Map::new();
    result.insert("resourceVersion".into(), page.resource_version.map(Json::String).unwrap_or(Json::Null));
    result.insert("items".into(), Json::Array(items));
    result.insert("continue".into(), page.continue_token.map(Json::String).unwrap_or(Json::Null));
    result.insert(
        "remainingItemCount".into(),
        page.remaining_item_count.map(|v| Json::Number(v.into())).unwrap_or(Json::Null),
    );
    Ok(Some(FieldValue::owned_any(Json::Object(result))))
}

/// Validate `sortBy` against the first item's object path and sort stably.
/// Supported scalar kinds: `string`, `int32/64`, `float32/64`, `bool`; a
/// missing path on the *first* item is an error, missing on later items
/// falls back to a zero value for that type (spec.md §4.3, §8 invariant 7).
pub(crate) fn sort_items(items: &mut [Json], dotted_path: &str) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let path: Vec<&str> = dotted_path.split('.').collect();
    if lookup_path(&items[0], &path).is_none() {
        return Err(GatewayError::input(format!("sortBy path {dotted_path} does not exist")));
    }
    items.sort_by(|a, b| compare_at_path(a, b, &path));
    Ok(())
}

fn lookup_path<'a>(value: &'a Json, path: &[&str]) -> Option<&'a Json> {
    let mut current = value;
    for segment in path {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

fn compare_at_path(a: &Json, b: &Json, path: &[&str]) -> Ordering {
    let a = lookup_path(a, path);
    let b = lookup_path(b, path);
    compare_values(a, b)
}

fn compare_values(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(Json::String(a)), Some(Json::String(b))) => a.cmp(b),
        (Some(Json::Bool(a)), Some(Json::Bool(b))) => a.cmp(b),
        (Some(Json::Number(a)), Some(Json::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        // Missing-on-one-side and type mismatches fall back to the
        // zero-value-equal comparator, keeping the sort total (spec.md §8
        // invariant 7: "ties preserve input order", which `sort_by`'s
        // stability guarantees).
        _ => Ordering::Equal,
    }
}

/// `Query<Singular>` — spec.md §4.3 "GetItem".
pub fn build_get_field(ops: ResourceOps, output_type_name: &str) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(crate::schema::names::singular(&ops.gvk.kind), TypeRef::named(output_type_name), move |ctx| {
        let ops = field_ops.clone();
        FieldFuture::new(async move { get_item(&ops, &ctx).await.map(|v| v.map(FieldValue::owned_any)) })
    });
    let field = with_namespace_argument(field, &ops);
    field.argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
}

async fn get_item(ops: &ResourceOps, ctx: &ResolverContext<'_>) -> async_graphql::Result<Option<Json>> {
    let rc = ops.request_context(ctx)?;
    let name = super::args::get_string(ctx, "name", true)?.expect("required");
    let namespace = ops.namespace_arg(ctx)?;
    let gvk = ops.real_gvk();
    let obj = rc.rest.get(&gvk, &ops.plural, ops.scope, namespace.as_deref(), &name).await?;
    Ok(Some(obj))
}

/// `Query<Singular>Yaml` — spec.md §4.3 "GetItemAsYAML". Delegates to
/// `GetItem` then renders YAML; key ordering is alphabetical (spec.md §9
/// "YAML encoder choice").
pub fn build_yaml_field(ops: ResourceOps) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(
        crate::schema::names::yaml_field_name(&ops.gvk.kind),
        TypeRef::named(TypeRef::STRING),
        move |ctx| {
            let ops = field_ops.clone();
            FieldFuture::new(async move {
                let obj = get_item(&ops, &ctx).await?;
                match obj {
                    None => Ok(Some(FieldValue::NULL)),
                    Some(obj) => {
                        let yaml = serde_yaml::to_string(&sort_keys(obj)).map_err(GatewayError::Yaml)?;
                        Ok(Some(FieldValue::value(GqlValue::String(yaml))))
                    }
                }
            })
        },
    );
    let field = with_namespace_argument(field, &ops);
    field.argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
}

/// Recursively sort object keys so the YAML view is a structural, key-order
/// independent reflection of the JSON view (spec.md §8 "Round-trip laws").
fn sort_keys(value: Json) -> Json {
    match value {
        Json::Object(map) => {
            let mut sorted: std::collections::BTreeMap<String, Json> = std::collections::BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k, sort_keys(v));
            }
            Json::Object(sorted.into_iter().collect())
        }
        Json::Array(items) => Json::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// `Mutation create<Singular>` — spec.md §4.3 "CreateItem".
pub fn build_create_field(ops: ResourceOps, output_type_name: &str, input_type_name: &str) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(
        crate::schema::names::mutation_field_name("create", &ops.gvk.kind),
        TypeRef::named_nn(output_type_name),
        move |ctx| {
            let ops = field_ops.clone();
            FieldFuture::new(async move { create_item(&ops, &ctx).await.map(|v| Some(FieldValue::owned_any(v))) })
        },
    );
    let field = with_namespace_argument(field, &ops);
    field
        .argument(async_graphql::dynamic::InputValue::new("object", TypeRef::named_nn(input_type_name)))
        .argument(async_graphql::dynamic::InputValue::new("dryRun", TypeRef::named_list(TypeRef::STRING)))
}

async fn create_item(ops: &ResourceOps, ctx: &ResolverContext<'_>) -> async_graphql::Result<Json> {
    let rc = ops.request_context(ctx)?;
    let mut object = super::args::get_object(ctx, "object", &ops.properties)?;
    let has_name = object
        .get("metadata")
        .and_then(Json::as_object)
        .and_then(|m| m.get("name"))
        .and_then(Json::as_str)
        .is_some();
    if !has_name {
        return Err(GatewayError::input("object.metadata.name is required").into());
    }
    let namespace = if ops.scope.is_namespaced() {
        let namespace = ops
            .namespace_arg(ctx)?
            .ok_or_else(|| GatewayError::input("namespace is required"))?;
        let metadata = object.entry("metadata").or_insert_with(|| Json::Object(Default::default()));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert("namespace".into(), Json::String(namespace.clone()));
        }
        Some(namespace)
    } else {
        None
    };
    let dry_run = super::args::get_dry_run(ctx, "dryRun")?;
    let gvk = ops.real_gvk();
    let created = rc
        .rest
        .create(&gvk, &ops.plural, ops.scope, namespace.as_deref(), object, &dry_run)
        .await?;
    Ok(created)
}

/// `Mutation update<Singular>` — spec.md §4.3 "UpdateItem".
pub fn build_update_field(ops: ResourceOps, output_type_name: &str, input_type_name: &str) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(
        crate::schema::names::mutation_field_name("update", &ops.gvk.kind),
        TypeRef::named_nn(output_type_name),
        move |ctx| {
            let ops = field_ops.clone();
            FieldFuture::new(async move { update_item(&ops, &ctx).await.map(|v| Some(FieldValue::owned_any(v))) })
        },
    );
    let field = with_namespace_argument(field, &ops);
    field
        .argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
        .argument(async_graphql::dynamic::InputValue::new("object", TypeRef::named_nn(input_type_name)))
        .argument(async_graphql::dynamic::InputValue::new("dryRun", TypeRef::named_list(TypeRef::STRING)))
}

async fn update_item(ops: &ResourceOps, ctx: &ResolverContext<'_>) -> async_graphql::Result<Json> {
    let rc = ops.request_context(ctx)?;
    let name = super::args::get_string(ctx, "name", true)?.expect("required");
    let namespace = ops.namespace_arg(ctx)?;
    let gvk = ops.real_gvk();
    // Verify existence first; errors (including not-found) propagate
    // verbatim (spec.md §4.3 "UpdateItem").
    rc.rest.get(&gvk, &ops.plural, ops.scope, namespace.as_deref(), &name).await?;
    let patch = Json::Object(super::args::get_object(ctx, "object", &ops.properties)?);
    let dry_run = super::args::get_dry_run(ctx, "dryRun")?;
    let patched = rc
        .rest
        .merge_patch(&gvk, &ops.plural, ops.scope, namespace.as_deref(), &name, &patch, &dry_run)
        .await?;
    Ok(patched)
}

/// `Mutation delete<Singular>` — spec.md §4.3 "DeleteItem".
pub fn build_delete_field(ops: ResourceOps) -> Field {
    let field_ops = ops.clone();
    let field = Field::new(
        crate::schema::names::mutation_field_name("delete", &ops.gvk.kind),
        TypeRef::named_nn(TypeRef::BOOLEAN),
        move |ctx| {
            let ops = field_ops.clone();
            FieldFuture::new(async move {
                delete_item(&ops, &ctx).await?;
                Ok(Some(FieldValue::value(GqlValue::Boolean(true))))
            })
        },
    );
    let field = with_namespace_argument(field, &ops);
    field
        .argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
        .argument(async_graphql::dynamic::InputValue::new("dryRun", TypeRef::named_list(TypeRef::STRING)))
}

async fn delete_item(ops: &ResourceOps, ctx: &ResolverContext<'_>) -> async_graphql::Result<()> {
    let rc = ops.request_context(ctx)?;
    let name = super::args::get_string(ctx, "name", true)?.expect("required");
    let namespace = ops.namespace_arg(ctx)?;
    let gvk = ops.real_gvk();
    let dry_run = super::args::get_dry_run(ctx, "dryRun")?;
    rc.rest
        .delete(&gvk, &ops.plural, ops.scope, namespace.as_deref(), &name, &dry_run)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_rejects_unknown_path() {
        let mut items = vec![json!({"metadata": {"name": "a"}})];
        let err = sort_items(&mut items, "spec.missing").unwrap_err();
        assert!(matches!(err, GatewayError::Input(_)));
    }

    #[test]
    fn sort_orders_strings_and_preserves_ties() {
        let mut items = vec![
            json!({"spec": {"displayName": "D"}, "metadata": {"name": "1"}}),
            json!({"spec": {"displayName": "A"}, "metadata": {"name": "2"}}),
            json!({"spec": {"displayName": "C"}, "metadata": {"name": "3"}}),
            json!({"spec": {"displayName": "A"}, "metadata": {"name": "4"}}),
        ];
        sort_items(&mut items, "spec.displayName").unwrap();
        let names: Vec<&str> = items
            .iter()
            .map(|v| v["metadata"]["name"].as_str().unwrap())
            .collect();
        // "A" (name 2) sorts before the tied "A" (name 4): stability.
        assert_eq!(names, vec!["2", "4", "3", "1"]);
    }

    #[test]
    fn yaml_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}});
        let sorted = sort_keys(value);
        let yaml = serde_yaml::to_string(&sorted).unwrap();
        let a_pos = yaml.find("a:").unwrap();
        let b_pos = yaml.find("b:").unwrap();
        assert!(a_pos < b_pos);
    }
}
