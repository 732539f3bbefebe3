//! Argument parsing helpers shared by every CRUD/subscription resolver
//! (spec.md §4.3 "Argument parsing").

use async_graphql::dynamic::ResolverContext;
use indexmap::IndexMap;

use crate::error::{GatewayError, Result};
use crate::types::descriptor::PropertySchema;

/// `getString(required)`: rejects missing-when-required, wrong type, and
/// empty string.
pub fn get_string(ctx: &ResolverContext<'_>, name: &str, required: bool) -> Result<Option<String>> {
    let Some(accessor) = ctx.args.get(name) else {
        return if required {
            Err(GatewayError::input(format!("argument {name} is required")))
        } else {
            Ok(None)
        };
    };
    let raw = accessor
        .string()
        .map_err(|_| GatewayError::input(format!("argument {name} must be a string")))?;
    if raw.is_empty() {
        return if required {
            Err(GatewayError::input(format!("argument {name} must not be empty")))
        } else {
            // An empty optional string (e.g. `labelSelector: ""`) is treated
            // as absent, not an error (spec.md §8 "Boundary cases").
            Ok(None)
        };
    }
    Ok(Some(raw.to_owned()))
}

/// `getBool`: rejects a present-but-wrong-typed value; absent defaults to
/// `default`.
pub fn get_bool(ctx: &ResolverContext<'_>, name: &str, default: bool) -> Result<bool> {
    let Some(accessor) = ctx.args.get(name) else {
        return Ok(default);
    };
    accessor
        .boolean()
        .map_err(|_| GatewayError::input(format!("argument {name} must be a boolean")))
}

pub fn get_i64(ctx: &ResolverContext<'_>, name: &str) -> Result<Option<i64>> {
    let Some(accessor) = ctx.args.get(name) else {
        return Ok(None);
    };
    accessor
        .i64()
        .map(Some)
        .map_err(|_| GatewayError::input(format!("argument {name} must be an integer")))
}

/// `dryRun` is a list of strings (spec.md §4.3).
pub fn get_dry_run(ctx: &ResolverContext<'_>, name: &str) -> Result<Vec<String>> {
    let Some(accessor) = ctx.args.get(name) else {
        return Ok(Vec::new());
    };
    let list = accessor
        .list()
        .map_err(|_| GatewayError::input(format!("argument {name} must be a list of strings")))?;
    list.iter()
        .map(|item| {
            item.string()
                .map(str::to_owned)
                .map_err(|_| GatewayError::input(format!("argument {name} entries must be strings")))
        })
        .collect()
}

/// `object` input mapping argument, decoded into a JSON map for use as a
/// resource body. `properties` routes `StringMap`/`Opaque` fields through
/// their scalar parsers rather than the generic `GqlValue -> Json`
/// conversion (spec.md §4.1 "StringMap scalar", "JSONString scalar").
pub fn get_object(
    ctx: &ResolverContext<'_>,
    name: &str,
    properties: &IndexMap<String, PropertySchema>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let accessor = ctx
        .args
        .get(name)
        .ok_or_else(|| GatewayError::input(format!("argument {name} is required")))?;
    match accessor.as_value() {
        async_graphql::Value::Object(obj) => crate::schema::convert::decode_input_object(obj, properties)
            .map_err(|err| GatewayError::input(format!("argument {name} could not be decoded: {err}"))),
        _ => Err(GatewayError::input(format!("argument {name} must be an object"))),
    }
}

#[cfg(test)]
mod tests {
    // `ResolverContext` cannot be constructed outside of a live schema
    // execution, so argument parsing is exercised end-to-end via the CRUD
    // resolver tests instead of in isolation here.
}
