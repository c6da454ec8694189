//! Per-project sync configuration.
//!
//! Credentials and target repository are discovered as a single control file
//! inside the assembled snapshot. The parsed value lives only for the
//! duration of one run and is excluded from the final commit.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::SyncError;

/// Control file name inside the project's file tree.
pub const CONTROL_FILE: &str = ".github-sync-config.json";

/// Validated sync credentials and target descriptor.
#[derive(Clone, Deserialize)]
pub struct SyncConfig {
    pub commit_username: String,
    pub commit_email: String,
    pub github_token: String,
    pub repo_https_url: String,
}

// The token must never leak through Debug formatting.
impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("commit_username", &self.commit_username)
            .field("commit_email", &self.commit_email)
            .field("github_token", &"***")
            .field("repo_https_url", &self.repo_https_url)
            .finish()
    }
}

impl SyncConfig {
    fn check_complete(&self) -> Result<(), SyncError> {
        let required = [
            ("commit_username", &self.commit_username),
            ("commit_email", &self.commit_email),
            ("github_token", &self.github_token),
            ("repo_https_url", &self.repo_https_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(SyncError::ConfigIncomplete(format!("{name} is empty")));
            }
        }
        if !self.repo_https_url.starts_with("https://") {
            return Err(SyncError::ConfigIncomplete(
                "repo_https_url must be an https:// URL".into(),
            ));
        }
        Ok(())
    }
}

/// Load and validate the control file from an assembled snapshot.
pub fn load(snapshot_dir: &Path) -> Result<SyncConfig, SyncError> {
    let path = snapshot_dir.join(CONTROL_FILE);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SyncError::ConfigMissing(CONTROL_FILE))
        }
        Err(e) => return Err(SyncError::write_failure(path, e)),
    };
    let config: SyncConfig = serde_json::from_str(&raw).map_err(SyncError::ConfigMalformed)?;
    config.check_complete()?;
    Ok(config)
}

/// Non-fatal pre-flight result for the check-config endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProbe {
    pub valid: bool,
    pub reason: Option<String>,
}

/// Same validation as [`load`], reported instead of raised.
pub fn probe(snapshot_dir: &Path) -> ConfigProbe {
    match load(snapshot_dir) {
        Ok(_) => ConfigProbe {
            valid: true,
            reason: None,
        },
        Err(e) => ConfigProbe {
            valid: false,
            reason: Some(e.to_string()),
        },
    }
}
