//! Snapshot assembly.
//!
//! Materializes a project's current document and file state into a plain
//! directory tree under the run's staging directory. The two listings are
//! fetched concurrently; entry writes run with a bounded concurrency
//! ceiling and fail fast on the first error.

use std::collections::BTreeMap;
use std::path::Path;

use futures::stream::{self, TryStreamExt};
use futures::FutureExt;

use crate::error::SyncError;
use crate::source::{BlobRef, ProjectSource};

/// Ceiling on concurrent document/file writes, protecting the blob store
/// and local file descriptors.
pub const MAX_CONCURRENT_WRITES: usize = 5;

/// What an assemble produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub documents: usize,
    pub files: usize,
}

impl SnapshotSummary {
    pub fn total(&self) -> usize {
        self.documents + self.files
    }
}

/// Reject paths that could escape the staging directory or collide with the
/// git control directory.
fn validate_rel_path(path: &str) -> Result<(), SyncError> {
    let safe = !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != ".." && seg != ".git");
    if safe {
        Ok(())
    } else {
        Err(SyncError::write_failure(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unsafe relative path"),
        ))
    }
}

async fn write_entry_parent(staging_dir: &Path, rel: &str) -> Result<std::path::PathBuf, SyncError> {
    validate_rel_path(rel)?;
    let dest = staging_dir.join(rel);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::write_failure(parent, e))?;
    }
    Ok(dest)
}

async fn write_document(staging_dir: &Path, rel: &str, text: &str) -> Result<(), SyncError> {
    let dest = write_entry_parent(staging_dir, rel).await?;
    tokio::fs::write(&dest, text)
        .await
        .map_err(|e| SyncError::write_failure(dest, e))?;
    tracing::debug!(path = rel, "document written");
    Ok(())
}

async fn write_file(
    source: &dyn ProjectSource,
    staging_dir: &Path,
    rel: &str,
    blob: &BlobRef,
) -> Result<(), SyncError> {
    let dest = write_entry_parent(staging_dir, rel).await?;
    let mut stream = source
        .open_blob(blob)
        .await
        .map_err(|e| SyncError::SourceUnavailable(format!("blob for {rel}: {e:#}")))?;
    let mut out = tokio::fs::File::create(&dest)
        .await
        .map_err(|e| SyncError::write_failure(&dest, e))?;
    tokio::io::copy(&mut stream, &mut out)
        .await
        .map_err(|e| SyncError::write_failure(&dest, e))?;
    tracing::debug!(path = rel, "file written");
    Ok(())
}

/// Materialize `project_id` into `staging_dir`.
///
/// Documents and files are fetched and written independently, each with the
/// same concurrency ceiling; the call returns once both trees are complete,
/// or with the first error encountered.
pub async fn assemble(
    source: &dyn ProjectSource,
    project_id: &str,
    staging_dir: &Path,
) -> Result<SnapshotSummary, SyncError> {
    tokio::fs::create_dir_all(staging_dir)
        .await
        .map_err(|e| SyncError::write_failure(staging_dir, e))?;

    let (docs, files) = tokio::join!(
        source.list_documents(project_id),
        source.list_files(project_id),
    );
    let docs: BTreeMap<String, String> =
        docs.map_err(|e| SyncError::SourceUnavailable(format!("document listing: {e:#}")))?;
    let files: BTreeMap<String, BlobRef> =
        files.map_err(|e| SyncError::SourceUnavailable(format!("file listing: {e:#}")))?;

    // Boxing erases the combinator future types; without it the enclosing
    // future trips rustc's higher-ranked lifetime leak check when spawned
    // (rust-lang/rust#102211).
    let write_docs = stream::iter(docs.iter().map(Ok::<_, SyncError>))
        .try_for_each_concurrent(MAX_CONCURRENT_WRITES, |(rel, text)| async move {
            write_document(staging_dir, rel, text).await
        })
        .boxed();
    let write_files = stream::iter(files.iter().map(Ok::<_, SyncError>))
        .try_for_each_concurrent(MAX_CONCURRENT_WRITES, |(rel, blob)| async move {
            write_file(source, staging_dir, rel, blob).await
        })
        .boxed();
    tokio::try_join!(write_docs, write_files)?;

    let summary = SnapshotSummary {
        documents: docs.len(),
        files: files.len(),
    };
    tracing::info!(
        project_id,
        documents = summary.documents,
        files = summary.files,
        "snapshot assembled"
    );
    Ok(summary)
}
