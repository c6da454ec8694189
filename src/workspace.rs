//! Persistent, project-keyed git workspace cache.
//!
//! The workspace is the only entity whose lifetime crosses runs: first sync
//! clones, later syncs fetch and wipe everything except `.git` so the
//! reconciler starts from a clean slate. Acquisition for a project is
//! serialized through a per-project async mutex held by the caller for the
//! whole acquire-reconcile sequence.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::git;
use crate::paths::CacheLayout;

/// A ready-to-reconcile git working tree for one project.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub project_id: String,
    pub dir: PathBuf,
}

/// Owns the on-disk cache and the per-project lock registry.
pub struct GitWorkspaceCache {
    layout: CacheLayout,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GitWorkspaceCache {
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Take the exclusive per-project lock.
    ///
    /// The caller holds the guard across [`acquire`](Self::acquire) and the
    /// whole reconcile sequence; two concurrent runs for the same project
    /// never interleave their fetch/wipe/copy/commit steps.
    pub async fn lock_project(&self, project_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(project_id).lock_owned().await
    }

    /// Produce a ready workspace: reuse the cached clone when present,
    /// otherwise perform a shallow checkout-less clone.
    ///
    /// Caller must hold the guard from [`lock_project`](Self::lock_project).
    pub async fn acquire(
        &self,
        project_id: &str,
        config: &SyncConfig,
    ) -> Result<Workspace, SyncError> {
        let dir = self.layout.workspace_dir(project_id);
        if dir.join(".git").is_dir() {
            tracing::info!(project_id, "reusing cached workspace");
            git::verify_workspace(&dir).await?;
            git::fetch(&dir, config).await?;
            wipe_except_git(&dir).await?;
        } else {
            tracing::info!(project_id, "cloning fresh workspace");
            // A directory without .git is debris from an interrupted clone;
            // git refuses to clone into it.
            if dir.exists() {
                tokio::fs::remove_dir_all(&dir)
                    .await
                    .map_err(|e| SyncError::write_failure(&dir, e))?;
            }
            if let Some(parent) = dir.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| SyncError::write_failure(parent, e))?;
            }
            git::clone_no_checkout(config, &dir).await?;
        }
        Ok(Workspace {
            project_id: project_id.to_string(),
            dir,
        })
    }

    /// Delete a project's cached workspace. Backs the remove-temp-git-dir
    /// endpoint and the recovery path for `CacheCorrupt`.
    pub async fn remove(&self, project_id: &str) -> Result<(), SyncError> {
        let _guard = self.lock_project(project_id).await;
        let dir = self.layout.workspace_dir(project_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(project_id, "workspace cache removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::write_failure(dir, e)),
        }
    }
}

/// Delete every entry in `dir` except the `.git` subtree.
async fn wipe_except_git(dir: &std::path::Path) -> Result<(), SyncError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SyncError::write_failure(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::write_failure(dir, e))?
    {
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| SyncError::write_failure(&path, e))?
            .is_dir();
        let removed = if is_dir {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| SyncError::write_failure(&path, e))?;
    }
    Ok(())
}
