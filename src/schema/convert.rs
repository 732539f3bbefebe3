//! Type Registry & Converter (spec.md §4.1): turns an OpenAPI schema node
//! into a dynamic GraphQL `(output type, input type)` pair, caching by
//! canonical key and guarding recursion.
//!
//! Resource objects are schemaless maps at the resolver boundary (spec.md
//! §9 "Dynamic payloads"); every data field here resolves by projecting a
//! `serde_json::Value` carried as the parent's `FieldValue::owned_any`
//! payload, the same way a hand-rolled `juniper::GraphQLValue` would project
//! into a `TypeInfo`-described map rather than a native Rust struct field.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputObject, InputValue, Object, TypeRef};
use async_graphql::{Name, Value as GqlValue};
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::types::{
    descriptor::{parse_node_properties, PropertySchema}, pascalize, registry::CYCLE_PLACEHOLDER, sanitize,
    GroupVersionKind, GvkIndex, ResourceDescriptor, Scope, TypeRegistry,
};

use super::names::relation_field_name;

/// Everything the schema builder accumulates while converting one cluster's
/// resource definitions: the registered object/input types, and an index
/// from `Kind` (Title-Case) to the resource's output type name + GVK, used
/// to resolve `*Ref` relation targets (spec.md §4.1 "Relation expansion").
pub struct SchemaTypes<'a> {
    pub registry: TypeRegistry,
    pub objects: Vec<Object>,
    pub inputs: Vec<InputObject>,
    /// `Kind` -> `(output type name, GVK, scope)`, used to locate a relation
    /// target by scanning definitions for a matching `Kind`. The GVK's
    /// `group` is already sanitized; `gvk_index` recovers the original at
    /// resolve time.
    pub kind_index: HashMap<String, (String, GroupVersionKind, Scope)>,
    pub gvk_index: Arc<GvkIndex>,
    /// The full OpenAPI `definitions` map, kept around so a `$ref`/`allOf`
    /// node pointing at a shared, non-resource definition (e.g. `ObjectMeta`,
    /// `LabelSelector`) can be converted lazily on first use (spec.md §4.1
    /// "$ref via allOf -> resolve to referenced definition").
    definitions: &'a serde_json::Map<String, Json>,
    /// Canonical keys whose input object has already been built, since
    /// `build_input` (unlike `build_object`) has no registry-backed
    /// completion state of its own to dedupe repeat `$ref`/nested-object
    /// visits against.
    built_inputs: HashSet<String>,
}

impl<'a> SchemaTypes<'a> {
    pub fn new(gvk_index: Arc<GvkIndex>, definitions: &'a serde_json::Map<String, Json>) -> Self {
        Self {
            registry: TypeRegistry::new(),
            objects: Vec::new(),
            inputs: Vec::new(),
            kind_index: HashMap::new(),
            gvk_index,
            definitions,
            built_inputs: HashSet::new(),
        }
    }

    /// Convert one resource descriptor's `properties` map into its output
    /// and input object types, registering them (and every nested object
    /// type they reference) into `self.objects`/`self.inputs`.
    ///
    /// Returns the output and input type names.
    pub fn convert_descriptor(
        &mut self,
        descriptor: &ResourceDescriptor,
        group_version_prefix: &str,
    ) -> (String, String) {
        let output_name = self.registry.resource_type_name(
            &descriptor.definition_key,
            &descriptor.gvk.kind,
            group_version_prefix,
        );
        let input_name = format!("{output_name}Input");

        self.kind_index.entry(descriptor.gvk.kind.clone()).or_insert_with(|| {
            let sanitized_gvk = GroupVersionKind::new(
                sanitize(&descriptor.gvk.group),
                descriptor.gvk.version.clone(),
                descriptor.gvk.kind.clone(),
            );
            (output_name.clone(), sanitized_gvk, descriptor.scope)
        });

        self.build_object(
            &descriptor.definition_key,
            &output_name,
            &descriptor.properties,
            &output_name,
            &[],
        );
        self.build_input(
            &descriptor.definition_key,
            &input_name,
            &descriptor.properties,
            &input_name,
            &[],
        );

        (output_name, input_name)
    }

    /// Build (or reuse, via the registry's cycle guard) the output object
    /// type for one properties map, pushing it into `self.objects`.
    fn build_object(
        &mut self,
        canonical_key: &str,
        type_name: &str,
        properties: &IndexMap<String, PropertySchema>,
        type_prefix: &str,
        field_path: &[String],
    ) -> String {
        use crate::types::registry::ConversionState;
        if self.registry.state(canonical_key) == ConversionState::Complete {
            return type_name.to_owned();
        }
        if self.registry.begin(canonical_key) == ConversionState::Processing {
            // Back-edge of a cycle: collapse to the scalar placeholder
            // rather than recursing forever (spec.md §4.1 "Recursion guard").
            return CYCLE_PLACEHOLDER.to_owned();
        }

        let mut object = Object::new(type_name);
        for (field_name, schema) in properties {
            let mut path = field_path.to_vec();
            path.push(pascalize(field_name));
            let field_type = self.convert_output_ref(schema, type_prefix, &path);
            let resolved_field_name = field_name.clone();
            let field_schema = schema.clone();
            object = object.field(Field::new(field_name.clone(), field_type, move |ctx| {
                let field_name = resolved_field_name.clone();
                let field_schema = field_schema.clone();
                FieldFuture::new(async move {
                    let parent = ctx
                        .parent_value
                        .try_downcast_ref::<Json>()
                        .map_err(|_| async_graphql::Error::new("internal: non-JSON parent value"))?;
                    Ok(parent.get(&field_name).map(|value| field_value_for(value, &field_schema)))
                })
            }));

            if let Some(relation_name) = relation_field_name(field_name) {
                object = self.add_relation_field(object, field_name, &relation_name, schema);
            }
        }

        self.objects.push(object);
        self.registry.complete(canonical_key);
        type_name.to_owned()
    }

    fn build_input(
        &mut self,
        canonical_key: &str,
        type_name: &str,
        properties: &IndexMap<String, PropertySchema>,
        type_prefix: &str,
        field_path: &[String],
    ) {
        if !self.built_inputs.insert(canonical_key.to_owned()) {
            return;
        }
        let mut input = InputObject::new(type_name);
        for (field_name, schema) in properties {
            let mut path = field_path.to_vec();
            path.push(pascalize(field_name));
            let field_type = self.convert_input_ref(schema, type_prefix, &path);
            input = input.field(InputValue::new(field_name.clone(), field_type));
        }
        self.inputs.push(input);
    }

    fn convert_output_ref(&mut self, schema: &PropertySchema, type_prefix: &str, field_path: &[String]) -> TypeRef {
        match schema {
            PropertySchema::String => TypeRef::named(TypeRef::STRING),
            PropertySchema::Integer => TypeRef::named(TypeRef::INT),
            PropertySchema::Number => TypeRef::named(TypeRef::FLOAT),
            PropertySchema::Boolean => TypeRef::named(TypeRef::BOOLEAN),
            PropertySchema::StringMap => TypeRef::named(crate::types::scalars::STRING_MAP),
            PropertySchema::Opaque => TypeRef::named(crate::types::scalars::JSON_STRING),
            PropertySchema::Array(item) => {
                let item_ref = self.convert_output_ref(item, type_prefix, field_path);
                TypeRef::List(Box::new(item_ref))
            }
            PropertySchema::Object(props) => {
                let key = format!("{type_prefix}{}", field_path.join(""));
                let name = self.registry.nested_type_name(&key, type_prefix, field_path);
                let built = self.build_object(&key, &name, props, type_prefix, field_path);
                TypeRef::named(built)
            }
            PropertySchema::Reference(ref_key) => self.resolve_output_reference(ref_key),
        }
    }

    /// Build (or reuse) the output type a `$ref`/`allOf` node points at,
    /// honoring the registry's conversion state the same way an inline
    /// `Object` does (spec.md §4.1 "$ref via allOf -> resolve to referenced
    /// definition; honor registry state"). Falls back to the scalar
    /// placeholder only when the target key isn't in `definitions` at all
    /// (an external or malformed reference) or is a genuine cyclic back-edge.
    fn resolve_output_reference(&mut self, ref_key: &str) -> TypeRef {
        let Some(node) = self.definitions.get(ref_key).cloned() else {
            let name = self
                .registry
                .output_name(ref_key)
                .map(str::to_owned)
                .unwrap_or_else(|| CYCLE_PLACEHOLDER.to_owned());
            return TypeRef::named(name);
        };
        let properties = parse_node_properties(&node);
        let base_name = pascalize(ref_key.rsplit('.').next().unwrap_or(ref_key));
        let name = self.registry.nested_type_name(ref_key, &base_name, &[]);
        let built = self.build_object(ref_key, &name, &properties, &name, &[]);
        TypeRef::named(built)
    }

    fn convert_input_ref(&mut self, schema: &PropertySchema, type_prefix: &str, field_path: &[String]) -> TypeRef {
        match schema {
            PropertySchema::String => TypeRef::named(TypeRef::STRING),
            PropertySchema::Integer => TypeRef::named(TypeRef::INT),
            PropertySchema::Number => TypeRef::named(TypeRef::FLOAT),
            PropertySchema::Boolean => TypeRef::named(TypeRef::BOOLEAN),
            PropertySchema::StringMap => TypeRef::named(crate::types::scalars::STRING_MAP),
            PropertySchema::Opaque => TypeRef::named(crate::types::scalars::JSON_STRING),
            PropertySchema::Array(item) => {
                let item_ref = self.convert_input_ref(item, type_prefix, field_path);
                TypeRef::List(Box::new(item_ref))
            }
            PropertySchema::Object(props) => {
                let canonical_key = format!("{type_prefix}{}", field_path.join(""));
                let name = format!("{type_prefix}{}Input", field_path.join(""));
                self.build_input(&canonical_key, &name, props, type_prefix, field_path);
                TypeRef::named(name)
            }
            PropertySchema::Reference(ref_key) => self.resolve_input_reference(ref_key),
        }
    }

    /// Input-side counterpart of [`Self::resolve_output_reference`]: builds
    /// the referenced definition's input object on first use, deduping via
    /// `built_inputs` since `build_input` has no completion state of its own.
    fn resolve_input_reference(&mut self, ref_key: &str) -> TypeRef {
        let Some(node) = self.definitions.get(ref_key).cloned() else {
            let name = self
                .registry
                .input_name(ref_key)
                .map(str::to_owned)
                .unwrap_or_else(|| CYCLE_PLACEHOLDER.to_owned());
            return TypeRef::named(name);
        };
        let properties = parse_node_properties(&node);
        let base_name = pascalize(ref_key.rsplit('.').next().unwrap_or(ref_key));
        let output_name = self.registry.nested_type_name(ref_key, &base_name, &[]);
        let input_name = format!("{output_name}Input");
        self.build_input(ref_key, &input_name, &properties, &input_name, &[]);
        TypeRef::named(input_name)
    }

    /// Add the sibling relation field for a `*Ref` property (spec.md §4.1
    /// "Relation expansion"): located by scanning `kind_index` for a GVK
    /// whose `Kind` equals the Title-Case of the prefix, resolved with a
    /// single GET using `name`/`namespace?`/`apiGroup?`/`kind?` pulled from
    /// the `*Ref` subobject. Only wired for single-item contexts; lists and
    /// subscriptions short-circuit to null (handled in the resolver, which
    /// inspects the ancestor field path at resolve time).
    fn add_relation_field(
        &mut self,
        object: Object,
        ref_field_name: &str,
        relation_name: &str,
        ref_schema: &PropertySchema,
    ) -> Object {
        let target = match ref_schema {
            PropertySchema::Object(_) | PropertySchema::Reference(_) => {
                let target_kind = pascalize(relation_name);
                self.kind_index.get(&target_kind).cloned()
            }
            _ => None,
        };
        let Some((target_type_name, target_gvk, target_scope)) = target else {
            return object;
        };
        let ref_field_name = ref_field_name.to_owned();
        let gvk_index = self.gvk_index.clone();
        object.field(Field::new(
            relation_name.to_owned(),
            TypeRef::named(target_type_name),
            move |ctx| {
                let ref_field_name = ref_field_name.clone();
                let target_gvk = target_gvk.clone();
                let gvk_index = gvk_index.clone();
                FieldFuture::new(async move {
                    crate::resolver::relation::resolve(ctx, &ref_field_name, &target_gvk, target_scope, &gvk_index).await
                })
            },
        ))
    }
}

/// Project a single named field out of a schemaless resource map, returning
/// the right `FieldValue` flavor for scalars, nested objects, and lists.
///
/// Used for fields with no declared `PropertySchema` of their own (envelope
/// fields like `continue`/`remainingItemCount`, and relation/subscription
/// payloads) — resource properties go through [`field_value_for`] instead, so
/// `StringMap`/`JSONString` fields encode as the scalar their schema names
/// rather than falling through to the generic object/array projection.
pub fn project_field(parent: &Json, field_name: &str) -> Option<FieldValue<'static>> {
    let value = parent.get(field_name)?;
    Some(json_to_field_value(value))
}

pub fn json_to_field_value(value: &Json) -> FieldValue<'static> {
    match value {
        Json::Null => FieldValue::NULL,
        Json::Object(_) => FieldValue::owned_any(value.clone()),
        Json::Array(items) => FieldValue::list(items.iter().map(json_to_field_value)),
        scalar => FieldValue::value(GqlValue::from_json(scalar.clone()).unwrap_or(GqlValue::Null)),
    }
}

/// Like [`json_to_field_value`], but encodes `StringMap`/`Opaque` fields
/// through their scalars (spec.md §4.1 "StringMap scalar", "JSONString
/// scalar") instead of projecting them as nested objects.
fn field_value_for(value: &Json, schema: &PropertySchema) -> FieldValue<'static> {
    match (value, schema) {
        (Json::Null, _) => FieldValue::NULL,
        (value, PropertySchema::StringMap) => {
            FieldValue::value(crate::types::scalars::encode_string_map(value.clone()))
        }
        (value, PropertySchema::Opaque) => FieldValue::value(crate::types::scalars::encode_json_string(value)),
        (Json::Array(items), PropertySchema::Array(item_schema)) => {
            FieldValue::list(items.iter().map(|item| field_value_for(item, item_schema)))
        }
        (value, _) => json_to_field_value(value),
    }
}

/// Render one object's named field as a `(Name, Value)` pair for building
/// GraphQL object literals from JSON maps (used by argument decoding).
pub fn json_object_to_gql(map: &serde_json::Map<String, Json>) -> IndexMap<Name, GqlValue> {
    map.iter()
        .map(|(k, v)| (Name::new(k), GqlValue::from_json(v.clone()).unwrap_or(GqlValue::Null)))
        .collect()
}

/// Decode a GraphQL input object literal into a resource body, routing
/// `StringMap`/`Opaque` fields through their scalar parsers
/// ([`crate::types::scalars::parse_string_map`],
/// [`crate::types::scalars::parse_json_string`]) instead of the generic
/// `GqlValue -> Json` conversion, which would leave a `StringMap`'s
/// `{key,value}` entry-list literal or an `Opaque` field's JSON-encoded
/// string literal undecoded (spec.md §4.1 "StringMap scalar", "JSONString
/// scalar").
pub fn decode_input_object(
    obj: &IndexMap<Name, GqlValue>,
    properties: &IndexMap<String, PropertySchema>,
) -> std::result::Result<serde_json::Map<String, Json>, String> {
    let mut map = serde_json::Map::new();
    for (key, value) in obj {
        let key = key.to_string();
        let decoded = match properties.get(&key) {
            Some(schema) => decode_input_value(value, schema)?,
            None => value.clone().into_json().map_err(|err| err.to_string())?,
        };
        map.insert(key, decoded);
    }
    Ok(map)
}

fn decode_input_value(value: &GqlValue, schema: &PropertySchema) -> std::result::Result<Json, String> {
    match schema {
        PropertySchema::StringMap => crate::types::scalars::parse_string_map(value),
        PropertySchema::Opaque => Ok(crate::types::scalars::parse_json_string(value)),
        PropertySchema::Array(item_schema) => match value {
            GqlValue::List(items) => items
                .iter()
                .map(|item| decode_input_value(item, item_schema))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Json::Array),
            _ => value.clone().into_json().map_err(|err| err.to_string()),
        },
        PropertySchema::Object(props) => match value {
            GqlValue::Object(obj) => decode_input_object(obj, props).map(Json::Object),
            _ => value.clone().into_json().map_err(|err| err.to_string()),
        },
        PropertySchema::String | PropertySchema::Integer | PropertySchema::Number | PropertySchema::Boolean | PropertySchema::Reference(_) => {
            value.clone().into_json().map_err(|err| err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_reads_opaque_field_from_a_json_string_literal() {
        let mut obj = IndexMap::new();
        obj.insert(Name::new("spec"), GqlValue::String("{\"a\":1}".to_owned()));
        let mut properties = IndexMap::new();
        properties.insert("spec".to_owned(), PropertySchema::Opaque);
        let decoded = decode_input_object(&obj, &properties).unwrap();
        assert_eq!(decoded.get("spec"), Some(&json!({"a": 1})));
    }

    #[test]
    fn decode_converts_stringmap_entry_list_literal_to_an_object() {
        let mut entry = IndexMap::new();
        entry.insert(Name::new("key"), GqlValue::String("env".to_owned()));
        entry.insert(Name::new("value"), GqlValue::String("prod".to_owned()));
        let mut obj = IndexMap::new();
        obj.insert(Name::new("labels"), GqlValue::List(vec![GqlValue::Object(entry)]));
        let mut properties = IndexMap::new();
        properties.insert("labels".to_owned(), PropertySchema::StringMap);
        let decoded = decode_input_object(&obj, &properties).unwrap();
        assert_eq!(decoded.get("labels"), Some(&json!({"env": "prod"})));
    }

    #[test]
    fn field_value_for_encodes_opaque_as_json_string() {
        let value = field_value_for(&json!({"a": 1}), &PropertySchema::Opaque);
        match value.as_value() {
            Some(GqlValue::String(s)) => assert_eq!(s, "{\"a\":1}"),
            other => panic!("expected string value, got {other:?}"),
        }
    }
}
