//! The sync run state machine.
//!
//! Drives one run end to end: assemble, validate, prepare workspace,
//! reconcile, commit, push. States execute strictly in order, no state is
//! skipped, and exactly one terminal event is emitted. The ephemeral
//! staging directory is removed on success and failure alike; the cached
//! workspace is always left intact for reuse.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{self, ConfigProbe};
use crate::error::SyncError;
use crate::paths::CacheLayout;
use crate::progress::ProgressStreamer;
use crate::reconcile::{self, CommitResult};
use crate::snapshot;
use crate::source::ProjectSource;
use crate::workspace::GitWorkspaceCache;

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Assembling,
    Validating,
    PreparingWorkspace,
    Reconciling,
    Committing,
    Pushing,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Assembling => "assembling",
            RunStatus::Validating => "validating",
            RunStatus::PreparingWorkspace => "preparing-workspace",
            RunStatus::Reconciling => "reconciling",
            RunStatus::Committing => "committing",
            RunStatus::Pushing => "pushing",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    /// Progress line announced when the pipeline enters this state.
    fn announcement(&self) -> Option<&'static str> {
        match self {
            RunStatus::Assembling => Some("Assembling project snapshot"),
            RunStatus::Validating => Some("Validating sync configuration"),
            RunStatus::PreparingWorkspace => Some("Preparing git workspace"),
            RunStatus::Reconciling => Some("Copying snapshot into workspace"),
            RunStatus::Committing => Some("Committing changes"),
            RunStatus::Pushing => Some("Pushing to remote"),
            // Terminal lines carry run-specific detail instead.
            RunStatus::Succeeded | RunStatus::Failed => None,
        }
    }
}

/// One end-to-end invocation of the pipeline for one project.
#[derive(Debug)]
pub struct SyncRun {
    pub project_id: String,
    pub commit_message: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
}

impl SyncRun {
    fn new(project_id: &str, commit_message: Option<&str>, started_at: DateTime<Utc>) -> Self {
        let commit_message = commit_message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sync from project {project_id}"));
        Self {
            project_id: project_id.to_string(),
            commit_message,
            started_at,
            status: RunStatus::Assembling,
        }
    }

    fn advance(&mut self, to: RunStatus, progress: &ProgressStreamer) {
        tracing::debug!(project_id = %self.project_id, from = self.status.as_str(), to = to.as_str(), "state transition");
        self.status = to;
        if let Some(line) = to.announcement() {
            progress.emit(line);
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug)]
pub enum RunOutcome {
    Synced { commit_id: String },
    NothingToSync,
    Failed(SyncError),
}

/// Sequences the pipeline components and reports outcomes.
pub struct SyncOrchestrator {
    source: Arc<dyn ProjectSource>,
    cache: Arc<GitWorkspaceCache>,
    layout: CacheLayout,
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn ProjectSource>,
        cache: Arc<GitWorkspaceCache>,
        layout: CacheLayout,
    ) -> Self {
        Self {
            source,
            cache,
            layout,
        }
    }

    /// Run one sync for `project_id`, mirroring every transition to
    /// `progress`. Emits exactly one terminal line.
    pub async fn run(
        &self,
        project_id: &str,
        commit_message: Option<&str>,
        progress: &ProgressStreamer,
    ) -> RunOutcome {
        let started_at = Utc::now();
        let staging = self.layout.staging_dir(project_id, started_at);
        let mut run = SyncRun::new(project_id, commit_message, started_at);

        let result = self.execute(&mut run, &staging, progress).await;
        remove_staging(&staging).await;

        match result {
            Ok(CommitResult { commit_id }) => {
                run.status = RunStatus::Succeeded;
                progress.emit(format!(
                    "Project synced to GitHub successfully (commit {commit_id})"
                ));
                RunOutcome::Synced { commit_id }
            }
            Err(SyncError::NothingToSync) => {
                run.status = RunStatus::Succeeded;
                progress.emit("Nothing to sync: project already matches the remote repository");
                RunOutcome::NothingToSync
            }
            Err(e) => {
                run.status = RunStatus::Failed;
                tracing::warn!(project_id, error = %e, "sync run failed");
                progress.emit(format!("Sync failed: {e}"));
                RunOutcome::Failed(e)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut SyncRun,
        staging: &Path,
        progress: &ProgressStreamer,
    ) -> Result<CommitResult, SyncError> {
        run.advance(RunStatus::Assembling, progress);
        let summary = snapshot::assemble(self.source.as_ref(), &run.project_id, staging).await?;
        progress.emit(format!(
            "Snapshot ready: {} documents, {} files",
            summary.documents, summary.files
        ));

        run.advance(RunStatus::Validating, progress);
        let config = config::load(staging)?;
        progress.set_secret(&config.github_token);

        run.advance(RunStatus::PreparingWorkspace, progress);
        // Held through push: serializes the whole acquire-reconcile
        // sequence against concurrent runs for the same project.
        let _project_guard = self.cache.lock_project(&run.project_id).await;
        let workspace = self.cache.acquire(&run.project_id, &config).await?;

        run.advance(RunStatus::Reconciling, progress);
        reconcile::overlay_snapshot(&workspace, staging).await?;
        reconcile::prepare_identity(&workspace, &config).await?;
        if !reconcile::stage_all(&workspace).await? {
            return Err(SyncError::NothingToSync);
        }

        run.advance(RunStatus::Committing, progress);
        let commit = reconcile::commit(&workspace, &run.commit_message).await?;

        run.advance(RunStatus::Pushing, progress);
        reconcile::push(&workspace, &config).await?;

        Ok(commit)
    }

    /// Pre-flight for the check-config endpoint: assemble a fresh snapshot,
    /// probe the control file, tear the snapshot down.
    pub async fn probe_config(&self, project_id: &str) -> ConfigProbe {
        let staging = self.layout.staging_dir(project_id, Utc::now());
        let probe = match snapshot::assemble(self.source.as_ref(), project_id, &staging).await {
            Ok(_) => config::probe(&staging),
            Err(e) => ConfigProbe {
                valid: false,
                reason: Some(e.to_string()),
            },
        };
        remove_staging(&staging).await;
        probe
    }
}

/// Best-effort staging teardown; a leftover staging directory is only a
/// disk-space concern, never a correctness one.
async fn remove_staging(staging: &Path) {
    match tokio::fs::remove_dir_all(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(staging = %staging.display(), error = %e, "failed to remove staging directory")
        }
    }
}
