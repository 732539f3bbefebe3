//! Relation field resolver (spec.md §4.1 "Relation expansion"): resolves the
//! sibling field synthesized for a `*Ref` property with a single GET against
//! the referenced resource.

use async_graphql::dynamic::{FieldValue, ResolverContext};
use serde_json::Value as Json;

use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::schema::convert::json_to_field_value;
use crate::types::{GroupVersionKind, GvkIndex, Scope};

/// Resolve `<field>Ref` -> the related object, or `null` when the lookup is
/// outside a single-item query context, the `Ref` subobject is incomplete,
/// or the target does not exist (spec.md §4.1, §7 "IsNotFound degrades to
/// null").
///
/// `target_gvk.group` is the sanitized group captured at schema-build time;
/// `gvk_index` rehydrates it before the REST call the same way CRUD
/// resolvers do (spec.md §4.3 "Group name re-hydration").
pub async fn resolve(
    ctx: ResolverContext<'_>,
    ref_field_name: &str,
    target_gvk: &GroupVersionKind,
    target_scope: Scope,
    gvk_index: &GvkIndex,
) -> async_graphql::Result<Option<FieldValue<'static>>> {
    if !is_single_item_context(&ctx) {
        return Ok(None);
    }

    let parent = ctx
        .parent_value
        .try_downcast_ref::<Json>()
        .map_err(|_| async_graphql::Error::new("internal: non-JSON parent value"))?;
    let Some(ref_value) = parent.get(ref_field_name).and_then(Json::as_object) else {
        return Ok(None);
    };
    let Some(name) = ref_value.get("name").and_then(Json::as_str) else {
        return Ok(None);
    };
    let namespace = ref_value.get("namespace").and_then(Json::as_str);

    let rc = ctx
        .ctx
        .data::<RequestContext>()
        .map_err(|_| GatewayError::upstream("missing request context"))?;

    let original_group = gvk_index.original(&target_gvk.group).unwrap_or(&target_gvk.group);
    let real_gvk = GroupVersionKind::new(original_group, target_gvk.version.clone(), target_gvk.kind.clone());
    let plural = crate::schema::names::plural(&real_gvk.kind).to_lowercase();

    let result = rc
        .rest
        .get(&real_gvk, &plural, target_scope, namespace, name)
        .await;

    match result {
        Ok(object) => Ok(Some(json_to_field_value(&object))),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// A relation field only resolves in a single-item query: the immediate
/// parent selection must not be inside a list, and must not be a
/// subscription's event payload (spec.md §4.1, "lists and subscriptions
/// short-circuit to null"). `async-graphql`'s lookahead doesn't expose
/// list-ness or operation kind directly, so both are detected from the
/// field path: a list result is always reached by indexing into a `Plural`
/// field's `items` array, which the path records as a numeric segment; a
/// subscription's payload is always reached through a field named `object`
/// sitting directly below the subscription root (the `Event{type,object}`
/// envelope every subscription field returns), a shape no query or mutation
/// path produces.
fn is_single_item_context(ctx: &ResolverContext<'_>) -> bool {
    let path = ctx.ctx.path_node.as_ref();
    !path_contains_list_index(path) && !path_contains_subscription_event(path)
}

fn path_contains_list_index(mut current: Option<&async_graphql::context::QueryPathNode<'_>>) -> bool {
    use async_graphql::QueryPathSegment;
    while let Some(n) = current {
        if matches!(n.segment, QueryPathSegment::Index(_)) {
            return true;
        }
        current = n.parent;
    }
    false
}

/// `true` if the path passes through a field named `object` whose own
/// parent is the subscription root (i.e. `object` has no grandparent) —
/// the shape unique to a subscription's `Event{type,object}` envelope.
fn path_contains_subscription_event(mut current: Option<&async_graphql::context::QueryPathNode<'_>>) -> bool {
    use async_graphql::QueryPathSegment;
    while let Some(n) = current {
        if let QueryPathSegment::Name(name) = n.segment {
            if name == "object" && n.parent.is_some_and(|parent| parent.parent.is_none()) {
                return true;
            }
        }
        current = n.parent;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rehydrates_original_group_before_lookup() {
        let mut index = GvkIndex::new();
        let sanitized = index.register("cert-manager.io");
        let target = GroupVersionKind::new(sanitized, "v1", "Issuer");
        let original = index.original(&target.group).unwrap();
        assert_eq!(original, "cert-manager.io");
    }
}
