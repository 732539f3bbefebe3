//! HTTP surface: routing, the interactive query page, and the SSE
//! subscription adapter (spec.md §4.7).

pub mod front_door;
pub mod playground;
pub mod sse;

pub use front_door::routes;
