//! Cluster registry (spec.md §4.6 "Handler lifecycle", §5 "Shared
//! resources"): maps cluster names to live handlers behind a read/write
//! lock so HTTP dispatch never blocks on another dispatch, only briefly on a
//! watcher-driven replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::handler::ClusterHandler;

#[derive(Default)]
pub struct ClusterRegistry {
    handlers: RwLock<HashMap<String, Arc<ClusterHandler>>>,
    initial_walk_done: AtomicBool,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<Arc<ClusterHandler>> {
        self.handlers.read().await.get(name).cloned()
    }

    /// Replace (or insert) a cluster's handler atomically (spec.md §4.6:
    /// "the new handler is built off-path and swapped under lock").
    pub async fn upsert(&self, name: String, handler: ClusterHandler) {
        self.handlers.write().await.insert(name, Arc::new(handler));
    }

    pub async fn remove(&self, name: &str) {
        self.handlers.write().await.remove(name);
    }

    /// `true` once the watcher's initial directory walk has completed
    /// (spec.md §4.6 "Startup"; SPEC_FULL.md §6 "Health endpoint").
    pub fn is_ready(&self) -> bool {
        self.initial_walk_done.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.initial_walk_done.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let registry = ClusterRegistry::new();
        assert!(!registry.is_ready());
        registry.mark_ready();
        assert!(registry.is_ready());
    }

    #[tokio::test]
    async fn missing_cluster_returns_none() {
        let registry = ClusterRegistry::new();
        assert!(registry.get("nope").await.is_none());
    }
}
