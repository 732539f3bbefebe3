//! Naming helpers for schema synthesis (spec.md §4.2 "Name choice").

use inflector::Inflector;

use crate::types::{pascalize, sanitize};

/// `<Singular>` is always the `Kind` itself.
pub fn singular(kind: &str) -> String {
    kind.to_owned()
}

/// `<Plural>` is the English pluralization of `Kind` (spec.md §4.2).
pub fn plural(kind: &str) -> String {
    kind.to_plural()
}

/// The wrapper object name for one API group, e.g. `apps` -> `AppsGroup`.
pub fn group_wrapper_name(sanitized_group: &str) -> String {
    format!("{}Group", pascalize(sanitized_group))
}

/// The wrapper object name for one `(group, version)` pair, attached under
/// the group wrapper (or directly under root for the core group).
pub fn version_wrapper_name(sanitized_group: &str, version: &str) -> String {
    format!("{}{}", pascalize(sanitized_group), pascalize(version))
}

/// The `Pascalize(sanitizedGroup+"_"+version)` prefix used to disambiguate a
/// `Kind` claimed by more than one `(group, version)` (spec.md §4.1
/// "Canonical keys").
pub fn group_version_prefix(sanitized_group: &str, version: &str) -> String {
    pascalize(&format!("{sanitized_group}_{version}"))
}

/// Subscription field base name: `[sanitizedGroup_]<version>_<name>`
/// (spec.md §4.2, step 4's subscription field names).
pub fn subscription_field_name(sanitized_group: &str, version: &str, name: &str) -> String {
    let sanitized_version = sanitize(version);
    if sanitized_group == crate::types::CORE_GROUP_MARKER {
        format!("{sanitized_version}_{name}")
    } else {
        format!("{sanitized_group}_{sanitized_version}_{name}")
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `create<Singular>` / `update<Singular>` / `delete<Singular>` mutation
/// names lower-case their leading letter the way GraphQL field
/// conventions do, while the `<Singular>`/`<Plural>` queries keep `Kind`'s
/// own casing verbatim (spec.md §4.2).
pub fn mutation_field_name(verb: &str, kind: &str) -> String {
    format!("{verb}{kind}")
}

pub fn yaml_field_name(kind: &str) -> String {
    format!("{kind}Yaml")
}

pub fn relation_field_name(ref_field_name: &str) -> Option<String> {
    ref_field_name.strip_suffix("Ref").map(lower_first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_handles_regular_and_irregular_nouns() {
        assert_eq!(plural("Pod"), "Pods");
        assert_eq!(plural("Policy"), "Policies");
    }

    #[test]
    fn relation_field_strips_ref_suffix_and_lowercases() {
        assert_eq!(relation_field_name("roleRef").as_deref(), Some("role"));
        assert_eq!(relation_field_name("name"), None);
    }

    #[test]
    fn subscription_name_omits_group_for_core() {
        assert_eq!(subscription_field_name("core", "v1", "pod"), "v1_pod");
        assert_eq!(subscription_field_name("apps", "v1", "deployment"), "apps_v1_deployment");
    }
}
