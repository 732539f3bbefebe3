//! Kubernetes REST client wrapper (spec.md §1 scope: "the concrete
//! Kubernetes REST wire format ... assumed implemented by a client
//! library").

pub mod client;

pub use client::{placeholder, ListPage, RawWatchEvent, RestClient};
