//! Type Registry: canonical-key → GraphQL type name cache with recursion
//! guarding (spec.md §3 "TypeRegistry", §4.1 "Canonical keys", "Recursion
//! guard").
//!
//! Conceptually this plays the same role as `juniper::schema::schema::SchemaType`
//! mapping a `Name` to a `MetaType` — except the "meta type" here is built
//! once, at schema-synthesis time, into an `async_graphql::dynamic::Object`
//! registered straight into the `SchemaBuilder`, so what this registry
//! caches is the *name* a canonical key resolved to, not the type body
//! itself.

use std::collections::HashMap;

/// A type's conversion progress. Mirrors spec.md §3's invariant: a key in
/// `Processing` never yields a complete type, and lookups during processing
/// return a safe placeholder to break cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    NotStarted,
    Processing,
    Complete,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    /// The GraphQL output object type name, once resolved.
    output_name: String,
    /// The GraphQL input object type name (`<output_name>Input`), for
    /// mutation arguments.
    input_name: String,
    state: ConversionState,
}

/// The scalar placeholder returned for a back-edge in a cyclic type graph
/// (spec.md §4.1 "Recursion guard", §9 "Cyclic type graphs"). A deliberate,
/// documented concession: the alternative (lazy/thunked field maps) is
/// deferred.
pub const CYCLE_PLACEHOLDER: &str = "String";

/// Caches GraphQL type names by canonical key, and separately by
/// `Kind` to implement first-come-first-serve claiming across
/// `(group, version)` pairs (spec.md §4.1 "Canonical keys", §8 invariant 2).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_key: HashMap<String, RegistryEntry>,
    /// `Kind` -> the canonical key that first claimed the bare name.
    claimed_kinds: HashMap<String, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the canonical key for a top-level resource type (spec.md
    /// §4.1 "Canonical keys"): the bare `Kind` if unclaimed, otherwise
    /// `Pascalize(sanitizedGroup + "_" + version) + Kind`.
    pub fn resource_type_name(&mut self, key: &str, kind: &str, group_version_prefix: &str) -> String {
        if let Some(entry) = self.by_key.get(key) {
            return entry.output_name.clone();
        }
        let name = match self.claimed_kinds.get(kind) {
            None => kind.to_owned(),
            Some(_) => format!("{group_version_prefix}{kind}"),
        };
        self.claimed_kinds.entry(kind.to_owned()).or_insert_with(|| key.to_owned());
        self.insert_not_started(key, &name);
        name
    }

    /// Nested anonymous object name: `typePrefix + join(fieldPath, "")`
    /// (spec.md §4.1 "Canonical keys").
    pub fn nested_type_name(&mut self, key: &str, type_prefix: &str, field_path: &[String]) -> String {
        if let Some(entry) = self.by_key.get(key) {
            return entry.output_name.clone();
        }
        let name = format!("{type_prefix}{}", field_path.join(""));
        self.insert_not_started(key, &name);
        name
    }

    fn insert_not_started(&mut self, key: &str, name: &str) {
        self.by_key.insert(
            key.to_owned(),
            RegistryEntry {
                output_name: name.to_owned(),
                input_name: format!("{name}Input"),
                state: ConversionState::NotStarted,
            },
        );
    }

    /// Mark a key `Processing` before recursing into its fields. Returns the
    /// previous state so the caller can detect a cycle (state was already
    /// `Processing`).
    pub fn begin(&mut self, key: &str) -> ConversionState {
        let entry = self
            .by_key
            .get_mut(key)
            .expect("insert_not_started must run before begin");
        let previous = entry.state;
        entry.state = ConversionState::Processing;
        previous
    }

    pub fn complete(&mut self, key: &str) {
        if let Some(entry) = self.by_key.get_mut(key) {
            entry.state = ConversionState::Complete;
        }
    }

    /// Unmark a key back to `NotStarted` on conversion error (spec.md §4.1
    /// "Recursion guard").
    pub fn fail(&mut self, key: &str) {
        if let Some(entry) = self.by_key.get_mut(key) {
            entry.state = ConversionState::NotStarted;
        }
    }

    pub fn state(&self, key: &str) -> ConversionState {
        self.by_key
            .get(key)
            .map(|e| e.state)
            .unwrap_or(ConversionState::NotStarted)
    }

    pub fn output_name(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(|e| e.output_name.as_str())
    }

    pub fn input_name(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(|e| e.input_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_keeps_bare_kind() {
        let mut registry = TypeRegistry::new();
        let name = registry.resource_type_name("example.io/v1/MyResource", "MyResource", "ExampleIoV1");
        assert_eq!(name, "MyResource");
    }

    #[test]
    fn second_claim_gets_prefixed_name() {
        let mut registry = TypeRegistry::new();
        registry.resource_type_name("example.io/v1/MyResource", "MyResource", "ExampleIoV1");
        let second = registry.resource_type_name("example.io/v2/MyResource", "MyResource", "ExampleIoV2");
        assert_eq!(second, "ExampleIoV2MyResource");
    }

    #[test]
    fn recursion_guard_detects_cycle() {
        let mut registry = TypeRegistry::new();
        registry.insert_not_started("Pod", "Pod");
        assert_eq!(registry.begin("Pod"), ConversionState::NotStarted);
        assert_eq!(registry.begin("Pod"), ConversionState::Processing);
        registry.complete("Pod");
        assert_eq!(registry.state("Pod"), ConversionState::Complete);
    }
}
