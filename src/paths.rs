//! On-disk layout of the workspace cache and per-run staging directories.
//!
//! Workspaces are keyed by project identity only, so the clone survives
//! across runs. Staging directories are keyed by project plus run timestamp
//! and are removed at run end.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Deterministic directory layout under a single cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persistent git workspace for a project. One directory per project.
    pub fn workspace_dir(&self, project_id: &str) -> PathBuf {
        self.root.join("workspaces").join(project_id)
    }

    /// Ephemeral staging directory for one run.
    pub fn staging_dir(&self, project_id: &str, started_at: DateTime<Utc>) -> PathBuf {
        // Filesystem-safe ISO timestamp: colons and dots replaced.
        let stamp = started_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        self.root
            .join("staging")
            .join(format!("{project_id}-{stamp}"))
    }
}

/// Whether `id` is safe to use as a single path segment.
///
/// Project identifiers come from the URL path; anything that could escape
/// the cache root is rejected before the pipeline starts.
pub fn is_valid_project_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_dir_is_keyed_by_project_only() {
        let layout = CacheLayout::new("/var/cache/ghsync");
        let a = layout.workspace_dir("p1");
        let b = layout.workspace_dir("p1");
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/var/cache/ghsync/workspaces/p1"));
    }

    #[test]
    fn staging_dir_includes_run_timestamp() {
        let layout = CacheLayout::new("/var/cache/ghsync");
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::milliseconds(5);
        let a = layout.staging_dir("p1", t0);
        let b = layout.staging_dir("p1", t1);
        assert_ne!(a, b);
        assert!(a.starts_with("/var/cache/ghsync/staging"));
        // No characters that are awkward on common filesystems.
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(!name.contains(':'));
    }

    #[test]
    fn project_id_validation() {
        assert!(is_valid_project_id("64e2f9a1b2c3d4e5f6a7b8c9"));
        assert!(is_valid_project_id("my-project_1"));
        assert!(!is_valid_project_id(""));
        assert!(!is_valid_project_id("../escape"));
        assert!(!is_valid_project_id("a/b"));
        assert!(!is_valid_project_id(".hidden"));
    }
}
