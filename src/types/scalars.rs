//! `StringMap` and `JSONString` custom scalars (spec.md §4.1).
//!
//! The dynamic schema API has no per-scalar parse/serialize hook (that only
//! exists for the `#[Scalar]` derive on statically-known types), so these
//! are plain functions the resolver layer calls at the argument-decoding and
//! value-encoding boundary; the schema only needs the two scalar *names*
//! registered so `TypeRef::named("StringMap")` etc. resolve.

use async_graphql::{dynamic::Scalar, Value as GqlValue};
use serde_json::{Map, Value};

pub const STRING_MAP: &str = "StringMap";
pub const JSON_STRING: &str = "JSONString";

pub fn register_scalars(builder: async_graphql::dynamic::SchemaBuilder) -> async_graphql::dynamic::SchemaBuilder {
    builder
        .register(Scalar::new(STRING_MAP))
        .register(Scalar::new(JSON_STRING))
}

/// Decode a `StringMap` input literal: either an object literal whose
/// fields each parse to a string value, or a list of `{key,value}` entries
/// with string fields (spec.md §4.1 "StringMap scalar").
pub fn parse_string_map(value: &GqlValue) -> Result<Value, String> {
    match value {
        GqlValue::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                let GqlValue::String(s) = v else {
                    return Err(format!("StringMap field {k} must be a string"));
                };
                map.insert(k.to_string(), Value::String(s.clone()));
            }
            Ok(Value::Object(map))
        }
        GqlValue::List(entries) => {
            let mut map = Map::new();
            for entry in entries {
                let GqlValue::Object(obj) = entry else {
                    return Err("StringMap list entries must be objects".into());
                };
                let key = match obj.get("key") {
                    Some(GqlValue::String(s)) => s.clone(),
                    _ => return Err("StringMap entry missing string `key`".into()),
                };
                let val = match obj.get("value") {
                    Some(GqlValue::String(s)) => s.clone(),
                    _ => return Err("StringMap entry missing string `value`".into()),
                };
                map.insert(key, Value::String(val));
            }
            Ok(Value::Object(map))
        }
        _ => Err("StringMap must be an object literal or a list of {key,value} entries".into()),
    }
}

/// `StringMap` output serializes passthrough: the map is returned as-is.
pub fn encode_string_map(value: Value) -> GqlValue {
    GqlValue::from_json(value).unwrap_or(GqlValue::Null)
}

/// `JSONString` serializes by JSON-encoding any value, falling back to
/// `"{}"` on encoder failure (spec.md §4.1 "JSONString scalar").
pub fn encode_json_string(value: &Value) -> GqlValue {
    let encoded = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_owned());
    GqlValue::String(encoded)
}

/// `JSONString` parses by JSON-decoding string literals; non-string
/// literals yield `null`.
pub fn parse_json_string(value: &GqlValue) -> Value {
    match value {
        GqlValue::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::indexmap::IndexMap;
    use async_graphql::Name;

    #[test]
    fn string_map_round_trips_list_form() {
        let mut obj = IndexMap::new();
        let mut entry = IndexMap::new();
        entry.insert(Name::new("key"), GqlValue::String("a.b".into()));
        entry.insert(Name::new("value"), GqlValue::String("1".into()));
        obj.insert(Name::new("ignored"), GqlValue::Null);
        let input = GqlValue::List(vec![GqlValue::Object(entry)]);
        let parsed = parse_string_map(&input).unwrap();
        assert_eq!(parsed, serde_json::json!({"a.b": "1"}));
        let _ = obj;
    }

    #[test]
    fn json_string_falls_back_on_non_string_literal() {
        let parsed = parse_json_string(&GqlValue::Number(1.into()));
        assert_eq!(parsed, Value::Null);
    }
}
