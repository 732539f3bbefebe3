//! Schema Watcher (spec.md §4.6): maps filesystem state under a configured
//! directory to live cluster handlers, the file base name being the cluster
//! name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cluster::ClusterRegistry;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Recursively walk `root`, invoking `OnSchemaChanged` for every regular
/// file found (spec.md §4.6 "Startup").
async fn walk_and_register(root: &Path, registry: &ClusterRegistry, config: &GatewayConfig) -> Result<()> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|err| GatewayError::lifecycle(format!("cannot read {}: {err}", dir.display())))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| GatewayError::lifecycle(format!("cannot read entry in {}: {err}", dir.display())))?
        {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                on_schema_changed(&path, registry, config).await;
            }
        }
    }
    Ok(())
}

fn cluster_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

async fn on_schema_changed(path: &Path, registry: &ClusterRegistry, config: &GatewayConfig) {
    let Some(name) = cluster_name(path) else {
        return;
    };
    let contents = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(cluster = %name, %err, "failed to read schema file");
            return;
        }
    };
    match crate::cluster::handler::ClusterHandler::build(&name, &contents, config).await {
        Ok(handler) => {
            registry.upsert(name.clone(), handler).await;
            info!(cluster = %name, "cluster handler registered");
        }
        Err(err) => {
            warn!(cluster = %name, %err, "failed to build cluster handler, keeping previous version if any");
        }
    }
}

async fn on_schema_deleted(path: &Path, registry: &ClusterRegistry) {
    if let Some(name) = cluster_name(path) {
        registry.remove(&name).await;
        info!(cluster = %name, "cluster handler removed");
    }
}

/// Perform the initial directory walk and mark the registry ready (spec.md
/// §4.6 "Startup"). Separated from [`run`] so the binary entrypoint can gate
/// HTTP bind on this succeeding first (SPEC_FULL.md §6 "Exit codes").
pub async fn initial_walk(directory: &Path, registry: &ClusterRegistry, config: &GatewayConfig) -> Result<()> {
    walk_and_register(directory, registry, config).await?;
    registry.mark_ready();
    info!(dir = %directory.display(), "initial schema walk complete");
    Ok(())
}

/// Run the watcher forever: perform the initial walk, mark the registry
/// ready, then react to filesystem events until the event channel closes
/// (spec.md §4.6 "Failures": channel closure terminates the watcher with an
/// error).
pub async fn run(directory: PathBuf, registry: Arc<ClusterRegistry>, config: Arc<GatewayConfig>) -> Result<()> {
    if !registry.is_ready() {
        initial_walk(&directory, &registry, &config).await?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })
    .map_err(|err| GatewayError::lifecycle(format!("cannot start filesystem watcher: {err}")))?;
    watcher
        .watch(&directory, RecursiveMode::Recursive)
        .map_err(|err| GatewayError::lifecycle(format!("cannot watch {}: {err}", directory.display())))?;

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) => handle_event(event, &registry, &config, &mut watcher).await,
            Err(err) => error!(%err, "watcher error channel reported a failure"),
        }
    }

    Err(GatewayError::lifecycle("watcher event channel closed"))
}

async fn handle_event(event: Event, registry: &ClusterRegistry, config: &GatewayConfig, watcher: &mut notify::RecommendedWatcher) {
    match event.kind {
        EventKind::Create(notify::event::CreateKind::Folder) => {
            for path in &event.paths {
                if let Err(err) = watcher.watch(path, RecursiveMode::Recursive) {
                    warn!(path = %path.display(), %err, "failed to watch new directory");
                    continue;
                }
                if let Err(err) = Box::pin(walk_and_register(path, registry, config)).await {
                    warn!(path = %path.display(), %err, "failed to walk new directory");
                }
            }
        }
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
            for path in &event.paths {
                if path.is_file() {
                    on_schema_changed(path, registry, config).await;
                } else {
                    on_schema_deleted(path, registry).await;
                }
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in &event.paths {
                if path.is_file() {
                    on_schema_changed(path, registry, config).await;
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                on_schema_deleted(path, registry).await;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_name_is_file_base_name() {
        let path = PathBuf::from("/etc/gateway/clusters/workspaceA");
        assert_eq!(cluster_name(&path).as_deref(), Some("workspaceA"));
    }
}
