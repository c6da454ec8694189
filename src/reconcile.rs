//! Workspace reconciliation.
//!
//! Overlays a snapshot onto a cached workspace and produces a new commit:
//! full tree copy (not a diff), control-file strip, repo-scoped identity,
//! stage, commit, push. Each step is fail-fast; partial state is left in
//! the workspace on purpose, since the next run re-copies over it.

use std::path::Path;

use crate::config::{SyncConfig, CONTROL_FILE};
use crate::error::SyncError;
use crate::git;
use crate::workspace::Workspace;

/// Outcome of a completed commit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub commit_id: String,
}

/// Copy every snapshot entry into the workspace root, overwriting existing
/// paths, then remove the control file so it never reaches the remote.
pub async fn overlay_snapshot(workspace: &Workspace, snapshot_dir: &Path) -> Result<(), SyncError> {
    copy_tree(snapshot_dir, &workspace.dir).await?;
    match tokio::fs::remove_file(workspace.dir.join(CONTROL_FILE)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SyncError::write_failure(
            workspace.dir.join(CONTROL_FILE),
            e,
        )),
    }
}

/// Set repo-scoped commit identity from the validated config.
pub async fn prepare_identity(
    workspace: &Workspace,
    config: &SyncConfig,
) -> Result<(), SyncError> {
    git::set_identity(&workspace.dir, config).await
}

/// Stage all paths. Returns whether anything differs from the last commit;
/// `false` is the "nothing to sync" signal.
pub async fn stage_all(workspace: &Workspace) -> Result<bool, SyncError> {
    git::add_all(&workspace.dir).await?;
    git::has_staged_changes(&workspace.dir).await
}

/// Commit the staged snapshot with the caller-supplied message.
pub async fn commit(workspace: &Workspace, message: &str) -> Result<CommitResult, SyncError> {
    let commit_id = git::commit(&workspace.dir, message).await?;
    Ok(CommitResult { commit_id })
}

/// Push the committed head to `main` on the remote.
pub async fn push(workspace: &Workspace, config: &SyncConfig) -> Result<(), SyncError> {
    git::push(&workspace.dir, config).await
}

/// Recursive full-tree copy, creating directories as needed.
async fn copy_tree(src: &Path, dst: &Path) -> Result<(), SyncError> {
    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((src_dir, dst_dir)) = stack.pop() {
        tokio::fs::create_dir_all(&dst_dir)
            .await
            .map_err(|e| SyncError::write_failure(&dst_dir, e))?;
        let mut entries = tokio::fs::read_dir(&src_dir)
            .await
            .map_err(|e| SyncError::write_failure(&src_dir, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::write_failure(&src_dir, e))?
        {
            let from = entry.path();
            let to = dst_dir.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SyncError::write_failure(&from, e))?;
            if file_type.is_dir() {
                stack.push((from, to));
            } else {
                tokio::fs::copy(&from, &to)
                    .await
                    .map_err(|e| SyncError::write_failure(&to, e))?;
            }
        }
    }
    Ok(())
}
