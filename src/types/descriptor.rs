//! `ResourceDescriptor`: the typed projection of one OpenAPI definition
//! (spec.md §3 "ResourceDescriptor", §6 "Input schema file").

use indexmap::IndexMap;
use serde_json::Value;

use super::gvk::{GroupVersionKind, Scope};

/// A single property's schema node, recursively describing nested objects,
/// arrays, and references (spec.md §3 "Properties").
#[derive(Debug, Clone)]
pub enum PropertySchema {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<PropertySchema>),
    /// A nested object with its own named properties.
    Object(IndexMap<String, PropertySchema>),
    /// An `additionalProperties: {type: string}` map — converts to the
    /// `StringMap` scalar (spec.md §4.1 "Conversion rules").
    StringMap,
    /// An object with neither declared properties nor a typed
    /// `additionalProperties` — converts to the `JSONString` scalar.
    Opaque,
    /// `$ref`/`allOf`-ref node, keyed by the raw definition key it points at.
    Reference(String),
}

/// One parsed OpenAPI `definitions` entry, with its Kubernetes vendor
/// extensions resolved (spec.md §3 "ResourceDescriptor").
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub definition_key: String,
    pub gvk: GroupVersionKind,
    pub scope: Scope,
    pub categories: Vec<String>,
    pub properties: IndexMap<String, PropertySchema>,
}

/// Parse one `(definition_key, definition_node)` pair into a descriptor.
///
/// Returns `None` when the definition lacks a non-empty `Kind`, lacks a
/// `x-kubernetes-scope` extension, or the scope value is unrecognized — per
/// spec.md §3's invariant, such definitions are excluded rather than
/// failing the whole build.
pub fn parse_descriptor(definition_key: &str, node: &Value) -> Option<ResourceDescriptor> {
    let gvk_entry = node
        .get("x-kubernetes-group-version-kind")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())?;

    let kind = gvk_entry.get("kind").and_then(Value::as_str)?.to_owned();
    if kind.is_empty() {
        return None;
    }
    let group = gvk_entry
        .get("group")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let version = gvk_entry
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let scope = node
        .get("x-kubernetes-scope")
        .and_then(Value::as_str)
        .and_then(Scope::from_extension)?;

    let categories = node
        .get("x-kubernetes-categories")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let properties = parse_node_properties(node);

    Some(ResourceDescriptor {
        definition_key: definition_key.to_owned(),
        gvk: GroupVersionKind::new(group, version, kind),
        scope,
        categories,
        properties,
    })
}

fn parse_properties(obj: &serde_json::Map<String, Value>) -> IndexMap<String, PropertySchema> {
    obj.iter()
        .map(|(name, schema)| (name.clone(), parse_property(schema)))
        .collect()
}

/// Read a definition node's `properties` map, the same way [`parse_descriptor`]
/// does — used to build a shared (non-resource) `$ref` target on demand, since
/// such a node has no `x-kubernetes-group-version-kind` and so never goes
/// through [`parse_descriptor`] itself.
pub fn parse_node_properties(node: &Value) -> IndexMap<String, PropertySchema> {
    node.get("properties")
        .and_then(Value::as_object)
        .map(parse_properties)
        .unwrap_or_default()
}

/// Convert one OpenAPI schema node into a [`PropertySchema`] (spec.md §4.1
/// "Conversion rules"). Unknown/untyped nodes fall back to `String`.
pub fn parse_property(schema: &Value) -> PropertySchema {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return PropertySchema::Reference(reference.trim_start_matches("#/definitions/").to_owned());
    }
    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        if let Some(first) = all_of.iter().find_map(|v| v.get("$ref")).and_then(Value::as_str) {
            return PropertySchema::Reference(first.trim_start_matches("#/definitions/").to_owned());
        }
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("string") => PropertySchema::String,
        Some("integer") => PropertySchema::Integer,
        Some("number") => PropertySchema::Number,
        Some("boolean") => PropertySchema::Boolean,
        Some("array") => {
            let item = schema
                .get("items")
                .map(parse_property)
                .unwrap_or(PropertySchema::String);
            PropertySchema::Array(Box::new(item))
        }
        Some("object") | None => {
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                PropertySchema::Object(parse_properties(props))
            } else if let Some(additional) = schema.get("additionalProperties") {
                if additional.get("type").and_then(Value::as_str) == Some("string") {
                    PropertySchema::StringMap
                } else {
                    PropertySchema::Opaque
                }
            } else {
                PropertySchema::Opaque
            }
        }
        Some(_) => PropertySchema::String,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_kind() {
        let node = json!({
            "x-kubernetes-group-version-kind": [{"group": "apps", "version": "v1", "kind": ""}],
            "x-kubernetes-scope": "Namespaced",
        });
        assert!(parse_descriptor("k", &node).is_none());
    }

    #[test]
    fn rejects_missing_scope() {
        let node = json!({
            "x-kubernetes-group-version-kind": [{"group": "apps", "version": "v1", "kind": "Deployment"}],
        });
        assert!(parse_descriptor("k", &node).is_none());
    }

    #[test]
    fn parses_namespaced_resource_with_properties() {
        let node = json!({
            "x-kubernetes-group-version-kind": [{"group": "apps", "version": "v1", "kind": "Deployment"}],
            "x-kubernetes-scope": "Namespaced",
            "x-kubernetes-categories": ["all"],
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {
                        "replicas": {"type": "integer"},
                        "labels": {"type": "object", "additionalProperties": {"type": "string"}},
                    }
                },
                "roleRef": {"$ref": "#/definitions/io.k8s.api.rbac.v1.RoleRef"}
            }
        });
        let descriptor = parse_descriptor("io.k8s.api.apps.v1.Deployment", &node).unwrap();
        assert_eq!(descriptor.gvk.kind, "Deployment");
        assert!(descriptor.scope.is_namespaced());
        assert_eq!(descriptor.categories, vec!["all".to_string()]);
        assert!(matches!(
            descriptor.properties.get("roleRef"),
            Some(PropertySchema::Reference(key)) if key == "io.k8s.api.rbac.v1.RoleRef"
        ));
    }
}
