//! Local repository reconciliation
//!
//! Brings the scratch clone of the umbrella repository to a known-good
//! state relative to both its original upstream and the invoking user's
//! fork, before registry changes are applied. The clone is disposable:
//! local history is discarded, conflicting lines always resolve to
//! upstream's content.
//!
//! The flow is an explicit state machine
//! (`Dirty → Clean → Synced → RemotesConfigured → Reset → Merged`) with
//! timestamped transitions. Probe steps that are allowed to fail record the
//! named `ExpectedNegative` outcome instead of swallowing errors silently;
//! every other failure propagates and aborts the run.

use crate::core::error::PublishError;
use crate::git::command::CommandRunner;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// States of the reconciliation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Dirty,
    Clean,
    Synced,
    RemotesConfigured,
    Reset,
    Merged,
}

/// Outcome of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's commands succeeded
    Completed,
    /// A tolerated probe failed; the flow continues on the fallback path
    ExpectedNegative,
}

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTransition {
    pub from: SyncState,
    pub to: SyncState,
    pub outcome: StepOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Result of a reconciliation run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// URL pushes should go to; equals origin's push URL when the user has
    /// direct write access, the derived fork URL otherwise
    pub fork_url: String,

    /// Whether the pull + dry-run push probe succeeded against origin
    pub has_push_access: bool,

    /// Transition history, oldest first
    pub transitions: Vec<SyncTransition>,
}

/// Git operations over one working copy
pub struct GitWorkspace<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
}

impl<'a> GitWorkspace<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The final path segment of a repository URL, without the .git suffix
    pub fn repo_name(url: &str) -> String {
        let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
        trimmed
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(trimmed)
            .to_string()
    }

    /// Clone `url` under `parent` unless a clone is already present
    pub async fn ensure_clone(
        runner: &'a dyn CommandRunner,
        parent: &Path,
        url: &str,
    ) -> Result<GitWorkspace<'a>, PublishError> {
        let dir = parent.join(Self::repo_name(url));
        if !dir.join(".git").exists() {
            runner.stream("git", &["clone", url], Some(parent)).await?;
        }
        Ok(Self::new(runner, dir))
    }

    /// Remote name → push URL, from `git remote -v`
    pub async fn remote_push_urls(&self) -> Result<BTreeMap<String, String>, PublishError> {
        let listing = self
            .runner
            .run("git", &["remote", "-v"], Some(&self.dir))
            .await?;

        let mut urls = BTreeMap::new();
        for line in listing.lines() {
            let mut fields = line.split_whitespace();
            if let (Some(name), Some(url), Some("(push)")) =
                (fields.next(), fields.next(), fields.next())
            {
                urls.insert(name.to_string(), url.to_string());
            }
        }
        Ok(urls)
    }

    /// Point `remote` at `url`, creating it if it does not exist yet
    pub async fn set_remote(
        &self,
        remote: &str,
        url: &str,
        exists: bool,
    ) -> Result<(), PublishError> {
        let action = if exists { "set-url" } else { "add" };
        self.runner
            .run("git", &["remote", action, remote, url], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn add_all(&self) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["add", "--all"], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn stash(&self) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["stash"], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn pull(&self) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["pull"], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn fetch(&self, remote: &str) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["fetch", remote], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn reset_hard(&self, reference: &str) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["reset", "--hard", reference], Some(&self.dir))
            .await?;
        Ok(())
    }

    /// Merge, resolving every conflicting hunk to the other side's content
    pub async fn merge_theirs(&self, reference: &str) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["merge", "-X", "theirs", reference], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn push(&self) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["push"], Some(&self.dir))
            .await?;
        Ok(())
    }

    pub async fn push_dry_run(&self) -> Result<(), PublishError> {
        self.runner
            .stream("git", &["push", "--dry-run"], Some(&self.dir))
            .await?;
        Ok(())
    }

    /// Commit staged and unstaged changes; a no-op commit is never created
    pub async fn commit_if_changed(&self, message: &str) -> Result<bool, PublishError> {
        self.add_all().await?;
        let status = self
            .runner
            .run("git", &["status", "--porcelain"], Some(&self.dir))
            .await?;

        if status.trim().is_empty() {
            return Ok(false);
        }

        self.runner
            .stream("git", &["commit", "-m", message], Some(&self.dir))
            .await?;
        Ok(true)
    }

    pub async fn config_value(&self, args: &[&str]) -> Result<String, PublishError> {
        Ok(self.runner.run("git", args, Some(&self.dir)).await?)
    }
}

/// Reconciler over a disposable working copy
pub struct Reconciler<'a> {
    workspace: &'a GitWorkspace<'a>,
    transitions: Vec<SyncTransition>,
}

impl<'a> Reconciler<'a> {
    pub fn new(workspace: &'a GitWorkspace<'a>) -> Self {
        Self {
            workspace,
            transitions: Vec::new(),
        }
    }

    fn record(&mut self, from: SyncState, to: SyncState, outcome: StepOutcome) {
        self.transitions.push(SyncTransition {
            from,
            to,
            outcome,
            timestamp: Utc::now(),
        });
    }

    /// Drive the full state machine
    ///
    /// `default_fork_url` is the fork URL derived from the umbrella name and
    /// the user's identity; it is replaced by origin's push URL when the
    /// probe shows the user can push to origin directly.
    pub async fn reconcile(
        &mut self,
        upstream_url: &str,
        default_fork_url: &str,
    ) -> Result<SyncReport, PublishError> {
        let ws = self.workspace;
        let remotes = ws.remote_push_urls().await?;

        // Dirty → Clean: shelve whatever is lying around, never trust it
        ws.add_all().await?;
        ws.stash().await?;
        self.record(SyncState::Dirty, SyncState::Clean, StepOutcome::Completed);

        // Clean → Synced: probe for direct write access to origin. Network,
        // auth and non-fast-forward failures all mean the same thing here.
        let probe = async {
            ws.pull().await?;
            ws.push_dry_run().await?;
            Ok::<(), PublishError>(())
        };
        let has_push_access = probe.await.is_ok();
        let fork_url = if has_push_access {
            remotes
                .get("origin")
                .cloned()
                .unwrap_or_else(|| default_fork_url.to_string())
        } else {
            default_fork_url.to_string()
        };
        self.record(
            SyncState::Clean,
            SyncState::Synced,
            if has_push_access {
                StepOutcome::Completed
            } else {
                StepOutcome::ExpectedNegative
            },
        );

        // Synced → RemotesConfigured
        ws.set_remote("origin", &fork_url, remotes.contains_key("origin"))
            .await?;
        ws.set_remote("upstream", upstream_url, remotes.contains_key("upstream"))
            .await?;
        self.record(
            SyncState::Synced,
            SyncState::RemotesConfigured,
            StepOutcome::Completed,
        );

        // RemotesConfigured → Reset: become exactly the origin, or exactly
        // the upstream when the fork has no master branch yet
        ws.fetch("upstream").await?;
        let reset_to_origin = async {
            ws.fetch("origin").await?;
            ws.reset_hard("origin/master").await?;
            Ok::<(), PublishError>(())
        };
        let origin_outcome = if reset_to_origin.await.is_ok() {
            StepOutcome::Completed
        } else {
            ws.reset_hard("upstream/master").await?;
            StepOutcome::ExpectedNegative
        };
        self.record(SyncState::RemotesConfigured, SyncState::Reset, origin_outcome);

        // Reset → Merged: fork-specific pushed commits survive, conflicting
        // lines always resolve to upstream's content
        ws.merge_theirs("upstream/master").await?;
        self.record(SyncState::Reset, SyncState::Merged, StepOutcome::Completed);

        Ok(SyncReport {
            fork_url,
            has_push_access,
            transitions: self.transitions.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::command::testing::ScriptedRunner;

    const UPSTREAM: &str = "https://github.com/someone/clang-wasm.git";
    const FORK: &str = "git@github.com:me/clang-wasm.git";

    fn remotes_output(origin: &str) -> String {
        format!("origin\t{origin} (fetch)\norigin\t{origin} (push)")
    }

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(GitWorkspace::repo_name(UPSTREAM), "clang-wasm");
        assert_eq!(GitWorkspace::repo_name(FORK), "clang-wasm");
        assert_eq!(
            GitWorkspace::repo_name("https://github.com/a/b"),
            "b"
        );
    }

    #[tokio::test]
    async fn test_push_access_adopts_origin_url() {
        let runner = ScriptedRunner::new().output("git remote -v", &remotes_output(UPSTREAM));
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let report = Reconciler::new(&ws).reconcile(UPSTREAM, FORK).await.unwrap();

        assert!(report.has_push_access);
        // Fork URL equals origin's push URL; no separate fork is configured
        assert_eq!(report.fork_url, UPSTREAM);
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_derived_fork_url() {
        let runner = ScriptedRunner::new()
            .output("git remote -v", &remotes_output(UPSTREAM))
            .fail_on("git push --dry-run");
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let report = Reconciler::new(&ws).reconcile(UPSTREAM, FORK).await.unwrap();

        assert!(!report.has_push_access);
        assert_eq!(report.fork_url, FORK);

        let probe = report
            .transitions
            .iter()
            .find(|t| t.to == SyncState::Synced)
            .unwrap();
        assert_eq!(probe.outcome, StepOutcome::ExpectedNegative);

        // Origin is repointed at the fork
        let calls = runner.recorded_calls();
        assert!(
            calls
                .iter()
                .any(|c| c == &format!("git remote set-url origin {}", FORK))
        );
    }

    #[tokio::test]
    async fn test_reset_falls_back_to_upstream_master() {
        let runner = ScriptedRunner::new()
            .output("git remote -v", &remotes_output(UPSTREAM))
            .fail_on("git push --dry-run")
            .fail_on("git reset --hard origin/master");
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let report = Reconciler::new(&ws).reconcile(UPSTREAM, FORK).await.unwrap();

        let reset = report
            .transitions
            .iter()
            .find(|t| t.to == SyncState::Reset)
            .unwrap();
        assert_eq!(reset.outcome, StepOutcome::ExpectedNegative);

        let calls = runner.recorded_calls();
        assert!(calls.iter().any(|c| c == "git reset --hard upstream/master"));
        assert!(calls.iter().any(|c| c == "git merge -X theirs upstream/master"));
    }

    #[tokio::test]
    async fn test_non_probe_failure_propagates() {
        let runner = ScriptedRunner::new()
            .output("git remote -v", &remotes_output(UPSTREAM))
            .fail_on("git fetch upstream");
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let result = Reconciler::new(&ws).reconcile(UPSTREAM, FORK).await;
        assert!(matches!(result, Err(PublishError::ExternalProcess(_))));
    }

    #[tokio::test]
    async fn test_reconcile_state_order() {
        let runner = ScriptedRunner::new().output("git remote -v", &remotes_output(UPSTREAM));
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let report = Reconciler::new(&ws).reconcile(UPSTREAM, FORK).await.unwrap();

        let states: Vec<SyncState> = report.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                SyncState::Clean,
                SyncState::Synced,
                SyncState::RemotesConfigured,
                SyncState::Reset,
                SyncState::Merged,
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_if_changed_skips_clean_tree() {
        let runner = ScriptedRunner::new().output("git status --porcelain", "");
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let committed = ws.commit_if_changed("Version 1.0.1").await.unwrap();
        assert!(!committed);
        assert!(
            !runner
                .recorded_calls()
                .iter()
                .any(|c| c.starts_with("git commit"))
        );
    }

    #[tokio::test]
    async fn test_commit_if_changed_commits_dirty_tree() {
        let runner =
            ScriptedRunner::new().output("git status --porcelain", " M sources.js\n M package.json");
        let ws = GitWorkspace::new(&runner, "/tmp/clang-wasm");

        let committed = ws.commit_if_changed("Version 1.0.1").await.unwrap();
        assert!(committed);
        assert!(
            runner
                .recorded_calls()
                .iter()
                .any(|c| c == "git commit -m Version 1.0.1")
        );
    }

    #[tokio::test]
    async fn test_remote_push_urls_parsing() {
        let listing = "origin\tgit@github.com:me/r.git (fetch)\n\
                       origin\tgit@github.com:me/r.git (push)\n\
                       upstream\thttps://github.com/other/r.git (fetch)\n\
                       upstream\thttps://github.com/other/r.git (push)";
        let runner = ScriptedRunner::new().output("git remote -v", listing);
        let ws = GitWorkspace::new(&runner, "/tmp/r");

        let urls = ws.remote_push_urls().await.unwrap();
        assert_eq!(urls.get("origin").unwrap(), "git@github.com:me/r.git");
        assert_eq!(
            urls.get("upstream").unwrap(),
            "https://github.com/other/r.git"
        );
    }
}
