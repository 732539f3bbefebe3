//! Schema Builder (spec.md §4.2): assembles one cluster's dynamic GraphQL
//! schema from its parsed OpenAPI resource definitions.
//!
//! Query fields nest under a per-group wrapper object and then a per-version
//! wrapper object (so two groups or versions may reuse the same `Kind`
//! without name collisions); the core (empty) group's version wrapper
//! attaches directly under the root instead of through a group wrapper.
//! Mutations and subscriptions stay flat at the root — their field names are
//! already disambiguated by `Kind` (mutations) or by the
//! `[group_]version_name` scheme (subscriptions).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, Object, Schema, Subscription, TypeRef};
use async_graphql::Value as GqlValue;
use serde_json::Value as Json;
use tracing::warn;

use crate::error::Result;
use crate::resolver::{
    build_create_field, build_delete_field, build_get_field, build_list_field, build_update_field,
    build_yaml_field, ResourceOps,
};
use crate::resolver::subscriptions::build_subscription_field;
use crate::types::{parse_descriptor, GvkIndex, ResourceDescriptor, Scope, CORE_GROUP_MARKER};

use super::convert::SchemaTypes;
use super::names::{group_version_prefix, group_wrapper_name, subscription_field_name, version_wrapper_name};

/// A built schema plus the `GvkIndex` its resolvers close over (kept
/// alongside the schema for diagnostics; resolvers hold their own `Arc`
/// clones already).
pub struct BuiltSchema {
    pub schema: Schema,
    pub gvk_index: Arc<GvkIndex>,
}

fn collect_descriptors(definitions: &serde_json::Map<String, Json>) -> Vec<ResourceDescriptor> {
    definitions
        .iter()
        .filter_map(|(key, node)| parse_descriptor(key, node))
        // Kubernetes' own `<Kind>List` wrapper definitions describe the List
        // envelope itself, not a resource type the gateway should expose
        // (spec.md §4.2 "Skip rules").
        .filter(|d| !d.gvk.kind.ends_with("List"))
        .collect()
}

/// Build the full per-cluster schema (spec.md §4.2 steps 1-5). Never fails
/// for a single malformed resource — those are logged and skipped; only
/// total schema assembly failure (e.g. a name collision the dynamic schema
/// engine itself rejects) surfaces as an error.
pub fn build_schema(definitions: &serde_json::Map<String, Json>) -> Result<BuiltSchema> {
    let mut gvk_index = GvkIndex::new();
    let descriptors = collect_descriptors(definitions);

    let mut by_group_version: BTreeMap<String, BTreeMap<String, Vec<ResourceDescriptor>>> = BTreeMap::new();
    for descriptor in descriptors {
        by_group_version
            .entry(descriptor.gvk.group.clone())
            .or_default()
            .entry(descriptor.gvk.version.clone())
            .or_default()
            .push(descriptor);
    }

    let gvk_index = {
        for group in by_group_version.keys() {
            gvk_index.register(group);
        }
        Arc::new(gvk_index)
    };

    let mut types = SchemaTypes::new(gvk_index.clone(), definitions);
    let mut query_root = Object::new("Query");
    let mut mutation_root = Object::new("Mutation");
    let mut subscription_root = Subscription::new("Subscription");
    let mut category_index: HashMap<String, Vec<CategoryMember>> = HashMap::new();
    let mut schema_builder = Schema::build("Query", Some("Mutation"), Some("Subscription"));
    schema_builder = crate::types::scalars::register_scalars(schema_builder);

    for (original_group, by_version) in &by_group_version {
        // Every group was already registered in the pre-pass above, before
        // `gvk_index` moved behind the `Arc` every resolver closure shares;
        // `sanitize` is pure, so recomputing it here needs no mutable access.
        let sanitized_group = crate::types::sanitize(original_group);
        let is_core = sanitized_group == CORE_GROUP_MARKER;
        let group_type_name = group_wrapper_name(&sanitized_group);
        let mut group_fields: Vec<Field> = Vec::new();

        for (version, descriptors) in by_version {
            let prefix = group_version_prefix(&sanitized_group, version);
            let version_type_name = version_wrapper_name(&sanitized_group, version);
            let mut version_fields: Vec<Field> = Vec::new();

            for descriptor in descriptors {
                let (output_name, input_name) = types.convert_descriptor(descriptor, &prefix);
                let list_type_name = format!("{output_name}List");
                let event_type_name = format!("{output_name}Event");
                schema_builder = schema_builder.register(build_list_result_object(&list_type_name, &output_name));
                schema_builder = schema_builder.register(build_event_object(&event_type_name, &output_name));

                for category in &descriptor.categories {
                    category_index.entry(category.clone()).or_default().push(CategoryMember {
                        group: sanitized_group.clone(),
                        version: version.clone(),
                        kind: descriptor.gvk.kind.clone(),
                        scope: descriptor.scope,
                    });
                }

                let ops = ResourceOps {
                    gvk: crate::types::GroupVersionKind::new(sanitized_group.clone(), version.clone(), descriptor.gvk.kind.clone()),
                    plural: super::names::plural(&descriptor.gvk.kind).to_lowercase(),
                    scope: descriptor.scope,
                    gvk_index: gvk_index.clone(),
                    properties: Arc::new(descriptor.properties.clone()),
                };

                version_fields.push(build_list_field(ops.clone(), &list_type_name));
                version_fields.push(build_get_field(ops.clone(), &output_name));
                version_fields.push(build_yaml_field(ops.clone()));

                mutation_root = mutation_root.field(build_create_field(ops.clone(), &output_name, &input_name));
                mutation_root = mutation_root.field(build_update_field(ops.clone(), &output_name, &input_name));
                mutation_root = mutation_root.field(build_delete_field(ops.clone()));

                let sub_singular_name = subscription_field_name(&sanitized_group, version, &super::names::singular(&descriptor.gvk.kind).to_lowercase());
                let sub_plural_name = subscription_field_name(&sanitized_group, version, &ops.plural);
                subscription_root = subscription_root
                    .field(build_subscription_field(ops.clone(), sub_singular_name, &event_type_name, true))
                    .field(build_subscription_field(ops, sub_plural_name, &event_type_name, false));
            }

            if is_core {
                for field in version_fields {
                    query_root = query_root.field(field);
                }
            } else {
                let mut version_query = Object::new(version_type_name.clone());
                for field in version_fields {
                    version_query = version_query.field(field);
                }
                schema_builder = schema_builder.register(version_query);
                group_fields.push(wrapper_field(version, version_type_name));
            }
        }

        if !is_core {
            let mut group_query = Object::new(group_type_name.clone());
            for field in group_fields {
                group_query = group_query.field(field);
            }
            schema_builder = schema_builder.register(group_query);
            query_root = query_root.field(wrapper_field(&sanitized_group, group_type_name));
        }
    }

    query_root = query_root.field(build_category_field(category_index));
    schema_builder = schema_builder.register(build_category_member_object());

    for object in types.objects {
        schema_builder = schema_builder.register(object);
    }
    for input in types.inputs {
        schema_builder = schema_builder.register(input);
    }

    schema_builder = schema_builder
        .register(query_root)
        .register(mutation_root)
        .register(subscription_root);

    let schema = schema_builder
        .finish()
        .map_err(|err| crate::error::GatewayError::schema_build(err.to_string()))?;

    Ok(BuiltSchema { schema, gvk_index })
}

/// A Query-side wrapper field returning a fixed (non-null) child object; the
/// child's own fields resolve independently of this marker value.
fn wrapper_field(name: &str, type_name: String) -> Field {
    Field::new(name.to_owned(), TypeRef::named_nn(type_name), move |_ctx| {
        FieldFuture::new(async move { Ok(Some(FieldValue::owned_any(Json::Null))) })
    })
}

fn build_list_result_object(type_name: &str, item_type_name: &str) -> Object {
    Object::new(type_name)
        .field(Field::new("resourceVersion", TypeRef::named(TypeRef::STRING), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "resourceVersion") })
        }))
        .field(Field::new("items", TypeRef::named_nn_list_nn(item_type_name), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "items") })
        }))
        .field(Field::new("continue", TypeRef::named(TypeRef::STRING), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "continue") })
        }))
        .field(Field::new("remainingItemCount", TypeRef::named(TypeRef::INT), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "remainingItemCount") })
        }))
}

fn build_event_object(type_name: &str, item_type_name: &str) -> Object {
    Object::new(type_name)
        .field(Field::new("type", TypeRef::named_nn(TypeRef::STRING), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "type") })
        }))
        .field(Field::new("object", TypeRef::named(item_type_name), move |ctx| {
            FieldFuture::new(async move { project_envelope_field(&ctx, "object") })
        }))
}

fn project_envelope_field(ctx: &async_graphql::dynamic::ResolverContext<'_>, name: &str) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let parent = ctx
        .parent_value
        .try_downcast_ref::<Json>()
        .map_err(|_| async_graphql::Error::new("internal: non-JSON parent value"))?;
    Ok(super::convert::project_field(parent, name))
}

/// One resource's `{group, version, kind, scope}` record in the category
/// registry (spec.md §4.2 step 5).
#[derive(Clone)]
struct CategoryMember {
    group: String,
    version: String,
    kind: String,
    scope: Scope,
}

fn category_member_field(ctx: &async_graphql::dynamic::ResolverContext<'_>, name: &str) -> async_graphql::Result<Option<FieldValue<'static>>> {
    let member = ctx
        .parent_value
        .try_downcast_ref::<CategoryMember>()
        .map_err(|_| async_graphql::Error::new("internal: non-CategoryMember parent value"))?;
    let value = match name {
        "group" => member.group.clone(),
        "version" => member.version.clone(),
        "kind" => member.kind.clone(),
        "scope" => member.scope.as_str().to_owned(),
        _ => return Ok(None),
    };
    Ok(Some(FieldValue::value(GqlValue::String(value))))
}

fn build_category_member_object() -> Object {
    Object::new("CategoryMember")
        .field(Field::new("group", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move { category_member_field(&ctx, "group") })
        }))
        .field(Field::new("version", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move { category_member_field(&ctx, "version") })
        }))
        .field(Field::new("kind", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move { category_member_field(&ctx, "kind") })
        }))
        .field(Field::new("scope", TypeRef::named_nn(TypeRef::STRING), |ctx| {
            FieldFuture::new(async move { category_member_field(&ctx, "scope") })
        }))
}

/// `typeByCategory(name: String!): [CategoryMember!]!` — the category
/// registry (spec.md §4.2 "Category registry"): every resource that declared
/// the given `x-kubernetes-categories` entry, as a `{group,version,kind,scope}`
/// record rather than a bare type name, so a caller can address the resource
/// through the group/version-nested query wrappers without guessing.
fn build_category_field(category_index: HashMap<String, Vec<CategoryMember>>) -> Field {
    Field::new("typeByCategory", TypeRef::named_nn_list_nn("CategoryMember"), move |ctx| {
        let category_index = category_index.clone();
        FieldFuture::new(async move {
            let name = crate::resolver::args::get_string(&ctx, "name", true)?.expect("required");
            let members = category_index.get(&name).cloned().unwrap_or_else(|| {
                warn!(category = %name, "no resources registered for category");
                Vec::new()
            });
            let values: Vec<FieldValue<'static>> = members.into_iter().map(FieldValue::owned_any).collect();
            Ok(Some(FieldValue::list(values)))
        })
    })
    .argument(async_graphql::dynamic::InputValue::new("name", TypeRef::named_nn(TypeRef::STRING)))
}
