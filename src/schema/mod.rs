//! Schema synthesis: OpenAPI definitions -> dynamic GraphQL schema (spec.md
//! §4.1, §4.2).

pub mod builder;
pub mod convert;
pub mod names;

pub use builder::{build_schema, BuiltSchema};
