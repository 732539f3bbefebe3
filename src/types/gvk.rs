//! Group/Version/Kind identity and name sanitization (spec.md §3 "GVKIndex",
//! §4.1 "Name sanitization").

use std::collections::HashMap;

/// The reserved marker the empty (core) API group sanitizes to.
pub const CORE_GROUP_MARKER: &str = "core";

/// Three-part identity of a Kubernetes resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// The definition-map key this GVK was parsed from, e.g.
    /// `io.k8s.api.apps.v1.Deployment` — used only for diagnostics, never
    /// for identity (two definitions can share a GVK by accident; the
    /// schema builder treats that as a build-time conflict, not here).
    pub fn qualified(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Whether a resource is cluster-wide or namespaced (spec.md §3 "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    Namespaced,
}

impl Scope {
    pub fn from_extension(raw: &str) -> Option<Self> {
        match raw {
            "Cluster" => Some(Scope::Cluster),
            "Namespaced" => Some(Scope::Namespaced),
            _ => None,
        }
    }

    pub fn is_namespaced(self) -> bool {
        matches!(self, Scope::Namespaced)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Cluster => "Cluster",
            Scope::Namespaced => "Namespaced",
        }
    }
}

/// Replace any character outside `[A-Za-z0-9_]` with `_`; prepend `_` if the
/// first character isn't a letter or underscore. Idempotent by construction
/// (spec.md §8 invariant 3): re-sanitizing an already-sanitized string never
/// changes it, since every character it could produce is already valid.
pub fn sanitize(raw: &str) -> String {
    if raw.is_empty() {
        return CORE_GROUP_MARKER.to_owned();
    }
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let starts_ok = out
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok {
        out.insert(0, '_');
    }
    out
}

/// Title-case a single path/group segment for use in a Pascalized prefix,
/// e.g. `apps` -> `Apps`, `cert_manager` -> `CertManager`.
pub fn pascalize(raw: &str) -> String {
    sanitize(raw)
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Bijective mapping from sanitized group name to its original name,
/// rebuilt fresh for every schema build (spec.md §3 "GVKIndex").
#[derive(Debug, Default, Clone)]
pub struct GvkIndex {
    sanitized_to_original: HashMap<String, String>,
}

impl GvkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group, returning its sanitized name. Re-registering the
    /// same original group is a no-op; registering two different originals
    /// to the same sanitized name would break the bijection and is a
    /// programmer error the schema builder must not trigger (each group is
    /// registered exactly once while partitioning definitions).
    pub fn register(&mut self, original: &str) -> String {
        let sanitized = sanitize(original);
        self.sanitized_to_original
            .entry(sanitized.clone())
            .or_insert_with(|| original.to_owned());
        sanitized
    }

    /// Recover the original group name from its sanitized form, restoring it
    /// before any REST call (spec.md §4.3 "Group name re-hydration").
    pub fn original(&self, sanitized: &str) -> Option<&str> {
        self.sanitized_to_original.get(sanitized).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize("cert-manager.io"), "cert_manager_io");
    }

    #[test]
    fn sanitize_prepends_underscore_for_leading_digit() {
        assert_eq!(sanitize("9fans.io"), "_9fans_io");
    }

    #[test]
    fn sanitize_of_empty_is_core_marker() {
        assert_eq!(sanitize(""), CORE_GROUP_MARKER);
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["apps", "cert-manager.io", "", "9fans.io", "_already_ok"] {
            let once = sanitize(raw);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "sanitize not idempotent for {raw:?}");
        }
    }

    #[test]
    fn gvk_index_round_trips_original_group() {
        let mut index = GvkIndex::new();
        let sanitized = index.register("cert-manager.io");
        assert_eq!(index.original(&sanitized), Some("cert-manager.io"));
    }

    #[test]
    fn pascalize_joins_segments() {
        assert_eq!(pascalize("example.io"), "ExampleIo");
    }
}
