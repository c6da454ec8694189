//! Project storage seam.
//!
//! The document store and blob store are external collaborators; the
//! pipeline only sees this trait. The shipped binary uses
//! [`DirProjectSource`], which serves a project from a plain directory tree
//! (documents under `<root>/<project>/docs`, blobs under
//! `<root>/<project>/files`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte stream handed back by the blob store.
pub type BlobStream = Pin<Box<dyn AsyncRead + Send>>;

/// Opaque reference to a binary source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef(pub String);

/// Read access to a project's documents and files.
///
/// Listings are ordered maps keyed by `/`-separated relative path, so
/// snapshot materialization is deterministic.
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// All text documents of the project, keyed by relative path.
    async fn list_documents(&self, project_id: &str) -> Result<BTreeMap<String, String>>;

    /// All binary files of the project, keyed by relative path.
    async fn list_files(&self, project_id: &str) -> Result<BTreeMap<String, BlobRef>>;

    /// Open a byte stream for one blob reference.
    async fn open_blob(&self, blob: &BlobRef) -> Result<BlobStream>;
}

/// Filesystem-backed project source.
///
/// Layout: `<root>/<project_id>/docs/**` for documents and
/// `<root>/<project_id>/files/**` for binary files. A missing `docs` or
/// `files` subdirectory is an empty listing; a missing project directory is
/// an error.
#[derive(Debug, Clone)]
pub struct DirProjectSource {
    root: PathBuf,
}

impl DirProjectSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(project_id)
    }

    /// Walk `base` and return every file as `relative path -> absolute path`.
    fn walk(base: &Path) -> Result<BTreeMap<String, PathBuf>> {
        let mut out = BTreeMap::new();
        if !base.is_dir() {
            return Ok(out);
        }
        let walker = ignore::WalkBuilder::new(base)
            .standard_filters(false)
            .hidden(false)
            .build();
        for entry in walker {
            let entry = entry.with_context(|| format!("walking {}", base.display()))?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(base)
                .expect("walker yields paths under base");
            let rel = rel
                .to_str()
                .with_context(|| format!("non-UTF-8 path under {}", base.display()))?
                .replace(std::path::MAIN_SEPARATOR, "/");
            out.insert(rel, entry.path().to_path_buf());
        }
        Ok(out)
    }
}

#[async_trait]
impl ProjectSource for DirProjectSource {
    async fn list_documents(&self, project_id: &str) -> Result<BTreeMap<String, String>> {
        let dir = self.project_dir(project_id);
        anyhow::ensure!(dir.is_dir(), "unknown project {project_id}");
        let mut docs = BTreeMap::new();
        for (rel, abs) in Self::walk(&dir.join("docs"))? {
            let text = tokio::fs::read_to_string(&abs)
                .await
                .with_context(|| format!("reading document {rel}"))?;
            docs.insert(rel, text);
        }
        Ok(docs)
    }

    async fn list_files(&self, project_id: &str) -> Result<BTreeMap<String, BlobRef>> {
        let dir = self.project_dir(project_id);
        anyhow::ensure!(dir.is_dir(), "unknown project {project_id}");
        let files = Self::walk(&dir.join("files"))?
            .into_iter()
            .map(|(rel, abs)| (rel, BlobRef(abs.to_string_lossy().into_owned())))
            .collect();
        Ok(files)
    }

    async fn open_blob(&self, blob: &BlobRef) -> Result<BlobStream> {
        let file = tokio::fs::File::open(&blob.0)
            .await
            .with_context(|| format!("opening blob {}", blob.0))?;
        Ok(Box::pin(file))
    }
}
