//! End-to-end orchestrator tests.
//!
//! The validator requires an https:// repository URL, so these tests point
//! the control file at a fake https remote and redirect it to a local bare
//! repository through git's url.insteadOf rewriting (scoped to a throwaway
//! GIT_CONFIG_GLOBAL file).

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use std::sync::Arc;

    use ghsync::config::CONTROL_FILE;
    use ghsync::paths::CacheLayout;
    use ghsync::progress::ProgressStreamer;
    use ghsync::run::{RunOutcome, SyncOrchestrator};
    use ghsync::source::DirProjectSource;
    use ghsync::workspace::GitWorkspaceCache;
    use serial_test::serial;
    use tempfile::TempDir;

    const REMOTE_URL: &str = "https://github.com/test/thesis.git";
    const TOKEN: &str = "tok123";

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .current_dir(dir)
            .args(args)
            .output()
            .expect("git runs");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Redirect both the plain and the token-authenticated form of
    /// REMOTE_URL to a local bare repository.
    struct UrlRewrite {
        _config: PathBuf,
    }

    impl UrlRewrite {
        fn install(root: &Path, bare: &Path) -> Self {
            let config = root.join("gitconfig");
            let file_url = format!("file://{}", bare.display());
            let auth_url = format!(
                "https://x-access-token:{TOKEN}@{}",
                REMOTE_URL.strip_prefix("https://").unwrap()
            );
            fs::write(
                &config,
                format!(
                    "[url \"{file_url}\"]\n\tinsteadOf = {REMOTE_URL}\n\tinsteadOf = {auth_url}\n"
                ),
            )
            .unwrap();
            std::env::set_var("GIT_CONFIG_GLOBAL", &config);
            Self { _config: config }
        }
    }

    impl Drop for UrlRewrite {
        fn drop(&mut self) {
            std::env::remove_var("GIT_CONFIG_GLOBAL");
        }
    }

    fn init_bare(root: &Path) -> PathBuf {
        let bare = root.join("remote.git");
        fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare"]);
        bare
    }

    fn write_control_file(docs: &Path) {
        fs::write(
            docs.join(CONTROL_FILE),
            format!(
                r#"{{"commit_username": "ada", "commit_email": "ada@example.com",
                     "github_token": "{TOKEN}", "repo_https_url": "{REMOTE_URL}"}}"#
            ),
        )
        .unwrap();
    }

    fn orchestrator(store: &Path, cache_root: &Path) -> SyncOrchestrator {
        let layout = CacheLayout::new(cache_root);
        SyncOrchestrator::new(
            Arc::new(DirProjectSource::new(store)),
            Arc::new(GitWorkspaceCache::new(layout.clone())),
            layout,
        )
    }

    fn index_of(log: &[String], needle: &str) -> usize {
        log.iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("no line containing {needle:?} in {log:?}"))
    }

    #[tokio::test]
    #[serial]
    async fn happy_path_pushes_and_streams_ordered_events() {
        let tmp = TempDir::new().unwrap();
        let bare = init_bare(tmp.path());
        let _rewrite = UrlRewrite::install(tmp.path(), &bare);

        let store = tmp.path().join("store");
        let docs = store.join("p1/docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("main.tex"), "\\documentclass{article}").unwrap();
        write_control_file(&docs);

        let orch = orchestrator(&store, &tmp.path().join("cache"));
        let progress = ProgressStreamer::detached();
        let outcome = orch.run("p1", Some("initial import"), &progress).await;

        let log = progress.log();
        let commit_id = match outcome {
            RunOutcome::Synced { commit_id } => commit_id,
            other => panic!("expected Synced, got {other:?}; log: {log:?}"),
        };

        // Events arrive in pipeline order, ending with the one success line.
        let order = [
            "Assembling project snapshot",
            "Validating sync configuration",
            "Preparing git workspace",
            "Copying snapshot into workspace",
            "Committing changes",
            "Pushing to remote",
            "Project synced to GitHub successfully",
        ];
        let positions: Vec<_> = order.iter().map(|n| index_of(&log, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "log: {log:?}");
        assert!(log.last().unwrap().contains("successfully"));
        // The token never leaks into the stream.
        assert!(log.iter().all(|l| !l.contains(TOKEN)));

        // Remote main contains exactly main.tex with the document content.
        let tree = git(&bare, &["ls-tree", "-r", "main", "--name-only"]);
        assert_eq!(tree.trim(), "main.tex");
        assert_eq!(
            git(&bare, &["show", "main:main.tex"]),
            "\\documentclass{article}"
        );
        assert_eq!(git(&bare, &["rev-parse", "main"]).trim(), commit_id);
        assert_eq!(
            git(&bare, &["log", "-1", "--format=%s %an", "main"]).trim(),
            "initial import ada"
        );
    }

    #[tokio::test]
    #[serial]
    async fn second_run_with_unchanged_project_is_nothing_to_sync() {
        let tmp = TempDir::new().unwrap();
        let bare = init_bare(tmp.path());
        let _rewrite = UrlRewrite::install(tmp.path(), &bare);

        let store = tmp.path().join("store");
        let docs = store.join("p1/docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("main.tex"), "content").unwrap();
        write_control_file(&docs);

        let orch = orchestrator(&store, &tmp.path().join("cache"));

        let progress = ProgressStreamer::detached();
        assert!(matches!(
            orch.run("p1", None, &progress).await,
            RunOutcome::Synced { .. }
        ));
        let first_head = git(&bare, &["rev-parse", "main"]);

        let progress = ProgressStreamer::detached();
        let outcome = orch.run("p1", None, &progress).await;
        assert!(matches!(outcome, RunOutcome::NothingToSync));

        let log = progress.log();
        assert!(log.last().unwrap().contains("Nothing to sync"));
        assert!(
            !log.iter().any(|l| l.contains("Committing")),
            "no commit state on an unchanged project: {log:?}"
        );
        // Remote untouched.
        assert_eq!(git(&bare, &["rev-parse", "main"]), first_head);
    }

    #[tokio::test]
    #[serial]
    async fn project_with_only_control_file_is_nothing_to_sync() {
        let tmp = TempDir::new().unwrap();
        let bare = init_bare(tmp.path());
        let _rewrite = UrlRewrite::install(tmp.path(), &bare);

        let store = tmp.path().join("store");
        let docs = store.join("p1/docs");
        fs::create_dir_all(&docs).unwrap();
        write_control_file(&docs);

        let orch = orchestrator(&store, &tmp.path().join("cache"));
        let progress = ProgressStreamer::detached();
        let outcome = orch.run("p1", None, &progress).await;

        assert!(matches!(outcome, RunOutcome::NothingToSync));
        // Nothing was ever pushed.
        assert_eq!(git(&bare, &["for-each-ref"]).trim(), "");
    }

    #[tokio::test]
    #[serial]
    async fn failed_run_keeps_workspace_but_removes_staging() {
        let tmp = TempDir::new().unwrap();
        let bare = init_bare(tmp.path());
        let _rewrite = UrlRewrite::install(tmp.path(), &bare);

        let store = tmp.path().join("store");
        let docs = store.join("p1/docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("main.tex"), "content").unwrap();
        write_control_file(&docs);

        let cache_root = tmp.path().join("cache");
        let orch = orchestrator(&store, &cache_root);

        let progress = ProgressStreamer::detached();
        assert!(matches!(
            orch.run("p1", None, &progress).await,
            RunOutcome::Synced { .. }
        ));

        // Break the source so the next run fails while assembling.
        fs::remove_dir_all(store.join("p1")).unwrap();
        let progress = ProgressStreamer::detached();
        let outcome = orch.run("p1", None, &progress).await;
        assert!(matches!(outcome, RunOutcome::Failed(_)));

        // Workspace cache survives the failure; staging does not.
        assert!(cache_root.join("workspaces/p1/.git").is_dir());
        let staging_root = cache_root.join("staging");
        assert!(
            !staging_root.exists() || fs::read_dir(&staging_root).unwrap().next().is_none()
        );
    }
}
