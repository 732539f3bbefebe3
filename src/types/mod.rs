//! Data model for OpenAPI-derived resource descriptors and the registry
//! that converts them into GraphQL type names (spec.md §3).

pub mod descriptor;
pub mod gvk;
pub mod registry;
pub mod scalars;

pub use descriptor::{parse_descriptor, PropertySchema, ResourceDescriptor};
pub use gvk::{pascalize, sanitize, GroupVersionKind, GvkIndex, Scope, CORE_GROUP_MARKER};
pub use registry::{ConversionState, TypeRegistry, CYCLE_PLACEHOLDER};
