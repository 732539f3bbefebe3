//! Resolver Engine (spec.md §4.3, §4.4): argument parsing, CRUD, relation
//! expansion, and live subscriptions, all bound to one `(GVK, Scope)` pair
//! at schema-build time.

pub mod args;
pub mod crud;
pub mod relation;
pub mod subscriptions;

pub use crud::{
    build_create_field, build_delete_field, build_get_field, build_list_field, build_update_field,
    build_yaml_field, ResourceOps,
};
pub use subscriptions::build_subscription_field;
