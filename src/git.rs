//! Git working copy orchestration.
//!
//! Every git invocation runs through the [`CommandRunner`] with the commit
//! identity and the per-host credential helpers injected as `-c` options.
//! Those options carry tokens, only the git sub-command is ever logged.
use log::*;
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

use crate::{
    entity::{Project, RemoteProject, strip_credentials},
    error::{Result, WatchError},
    forge::{
        github::parse_github_remote,
        request::{CreatePrRequest, PullRequest},
        traits::PullRequestCreator,
    },
    git::{
        credentials::GitIdentity,
        remote::{parse_remote_list, parse_remote_show},
    },
    process::{CommandRunner, ProcessOutput, args},
    store::Store,
};

pub mod credentials;
pub mod remote;

pub const COMMIT_MESSAGE: &str = "chore: upgrade dependencies";

pub const PULL_REQUEST_TITLE: &str = "Dependencies Update";

/// Pull requests target the first of these branches that exists.
pub const BASE_BRANCHES: [&str; 4] = ["next", "develop", "master", "main"];

const AUTH_FAILURES: [&str; 10] = [
    "authentication failed",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "terminal prompts disabled",
    "permission denied",
    "access denied",
    "not authorized",
    "returned error: 403",
    "returned error: 401",
];

static FILES_CHANGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) files? changed").unwrap());

/// Whether git's stderr reports rejected credentials.
pub fn is_auth_failure(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    AUTH_FAILURES.iter().any(|needle| stderr.contains(needle))
}

/// Number of changed files reported by `git commit`, 0 when nothing was
/// committed.
pub fn changed_files(output: &str) -> usize {
    FILES_CHANGED
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// Branch names from `git branch -a`, with remote prefixes removed.
pub fn parse_branches(output: &str) -> Vec<String> {
    let mut branches: Vec<String> = vec![];

    for line in output.lines() {
        let name = line.trim_start_matches(['*', ' ']).trim();
        if name.is_empty() || name.contains("->") || name.starts_with('(') {
            continue;
        }
        let name = match name.strip_prefix("remotes/") {
            Some(remote_branch) => remote_branch
                .split_once('/')
                .map(|(_, branch)| branch)
                .unwrap_or(remote_branch),
            None => name,
        };
        if !branches.iter().any(|b| b == name) {
            branches.push(name.to_string());
        }
    }

    branches
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    /// The remote rejected the configured credentials.
    Unauthorized,
    Failed,
}

/// Outcome of synchronizing one remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSync {
    pub remote: String,
    pub status: SyncStatus,
    /// The logged failure, `None` when synced.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestOutcome {
    Created(PullRequest),
    /// The branch has nothing the base does not have.
    NoCommits,
    Skipped(String),
}

/// Git invocations for one project with its credentials resolved.
struct Session<'a> {
    runner: &'a dyn CommandRunner,
    project: &'a str,
    dir: PathBuf,
    config: Vec<String>,
}

impl Session<'_> {
    async fn run(&self, git_args: &[&str]) -> Result<ProcessOutput> {
        debug!("{}: git {}", self.project, git_args.join(" "));

        let mut full = self.config.clone();
        full.extend(args(git_args));
        self.runner.run(&self.dir, "git", &full).await
    }

    /// Run and fail on a non-zero exit. Credential rejections of `remote`
    /// become [`WatchError::GitAuthorization`].
    async fn checked(
        &self,
        git_args: &[&str],
        remote: Option<&str>,
    ) -> Result<ProcessOutput> {
        let output = self.run(git_args).await?;
        if output.success() {
            return Ok(output);
        }

        let stderr = output.stderr.trim().to_string();
        match remote {
            Some(remote) if is_auth_failure(&stderr) => {
                Err(WatchError::GitAuthorization {
                    remote: remote.to_string(),
                    message: stderr,
                })
            }
            _ => Err(WatchError::git(format!(
                "git {} failed: {stderr}",
                git_args.first().copied().unwrap_or_default()
            ))),
        }
    }
}

pub struct GitOrchestrator {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn Store>,
    identity: Arc<GitIdentity>,
    forge: Arc<dyn PullRequestCreator>,
}

impl GitOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn Store>,
        identity: Arc<GitIdentity>,
        forge: Arc<dyn PullRequestCreator>,
    ) -> Self {
        Self {
            runner,
            store,
            identity,
            forge,
        }
    }

    async fn session<'a>(
        &'a self,
        project: &'a Project,
        dir: PathBuf,
    ) -> Result<Session<'a>> {
        let settings = self.store.load_remote_settings().await?;
        Ok(Session {
            runner: self.runner.as_ref(),
            project: &project.name,
            dir,
            config: self.identity.config_args(project, &settings),
        })
    }

    /// Whether the project path is the top level of a git working copy.
    pub async fn is_repo(&self, project: &Project) -> Result<bool> {
        if project.is_global || project.path.is_empty() {
            return Ok(false);
        }

        let path = Path::new(&project.path);
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(false);
        }

        let session = self.session(project, project.working_dir()).await?;
        let output = session.run(&["rev-parse", "--show-toplevel"]).await?;
        if !output.success() {
            return Ok(false);
        }

        // a directory nested in some other working copy is not a repo itself
        let top_level = PathBuf::from(output.stdout.trim());
        Ok(same_path(&top_level, path).await)
    }

    /// Record git remotes of the working copy the project does not know yet.
    /// Never removes remotes. Returns the number of added remotes.
    pub async fn check_remotes(&self, project: &mut Project) -> Result<usize> {
        if !self.is_repo(project).await? {
            return Ok(0);
        }

        let output = self
            .session(project, project.working_dir())
            .await?
            .checked(&["remote", "-v"], None)
            .await?;
        let mut added = vec![];

        for (name, urls) in parse_remote_list(&output.stdout) {
            let Some(fetch) = urls.fetch.clone().or(urls.push.clone()) else {
                continue;
            };
            let mut remote = RemoteProject::new(name, strip_credentials(&fetch));
            if remote.is_watcher_remote() {
                continue;
            }

            if urls.push.is_some() && urls.push != urls.fetch {
                warn!(
                    "{}: remote {} pushes to a different url than it fetches from",
                    project.name, remote.name
                );
            }

            let known = project
                .remotes
                .iter()
                .any(|r| r.name == remote.name && r.path == remote.path);
            if known {
                continue;
            }

            remote.project_id = project.id;
            self.store.save_remote(&mut remote).await?;
            info!("{}: recorded remote {}", project.name, remote.name);
            added.push(remote);
        }

        let count = added.len();
        project.remotes.extend(added);
        Ok(count)
    }

    /// Clone the first remote into the project path. Returns false for
    /// global projects and projects without remotes.
    pub async fn clone_repo(&self, project: &Project) -> Result<bool> {
        if project.is_global {
            return Ok(false);
        }
        let Some(remote) =
            project.remotes.iter().find(|r| !r.is_watcher_remote())
        else {
            return Ok(false);
        };

        let dir = Path::new(&project.path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let session = self.session(project, dir).await?;

        info!("{}: cloning {}", project.name, remote.path);
        session
            .checked(
                &["clone", "--origin", &remote.name, &remote.path, &project.path],
                Some(&remote.name),
            )
            .await?;
        Ok(true)
    }

    /// Check out `branch`, creating it when needed, then push it to every
    /// remote not having it yet and pull from every remote. A failing remote
    /// never stops the others.
    pub async fn checkout(
        &self,
        project: &Project,
        branch: &str,
    ) -> Result<Vec<RemoteSync>> {
        if !self.is_repo(project).await? && !self.clone_repo(project).await? {
            info!("{}: nothing to check out", project.name);
            return Ok(vec![]);
        }

        let session = self.session(project, project.working_dir()).await?;

        let existing = session.checked(&["branch", "--list", branch], None).await?;
        if existing.stdout.trim().is_empty() {
            info!("{}: checking out new branch {branch}", project.name);
            session.checked(&["checkout", "-b", branch], None).await?;
        } else {
            info!("{}: checking out branch {branch}", project.name);
            session.checked(&["checkout", branch], None).await?;
        }

        let output = session.checked(&["remote", "-v"], None).await?;
        let configured = parse_remote_list(&output.stdout);

        let mut results = vec![];
        for remote in project.remotes.iter().filter(|r| !r.is_watcher_remote()) {
            let mut result = Ok(());
            if !configured.contains_key(&remote.name) {
                result = session
                    .checked(&["remote", "add", &remote.name, &remote.path], None)
                    .await
                    .map(|_| ());
            }
            if result.is_ok() {
                result = self.sync_remote(&session, &remote.name, branch).await;
            }
            results.push(self.sync_status(project, &remote.name, result));
        }

        Ok(results)
    }

    async fn sync_remote(
        &self,
        session: &Session<'_>,
        remote: &str,
        branch: &str,
    ) -> Result<()> {
        let output = session.checked(&["remote", "show", remote], Some(remote)).await?;
        let details = parse_remote_show(&output.stdout);

        if !details.knows_branch(branch) {
            debug!("{}: pushing {branch} to {remote}", session.project);
            session
                .checked(&["push", "-u", remote, branch], Some(remote))
                .await?;
        }

        session
            .checked(&["pull", "--no-rebase", remote, branch], Some(remote))
            .await?;
        Ok(())
    }

    fn sync_status(
        &self,
        project: &Project,
        remote: &str,
        result: Result<()>,
    ) -> RemoteSync {
        let (status, error) = match result {
            Ok(()) => (SyncStatus::Synced, None),
            Err(err) if err.is_authorization() => {
                let message = format!("{}: {err}", project.name);
                error!("{message}");
                (SyncStatus::Unauthorized, Some(message))
            }
            Err(err) => {
                let message =
                    format!("{}: syncing remote {remote} failed: {err}", project.name);
                warn!("{message}");
                (SyncStatus::Failed, Some(message))
            }
        };
        RemoteSync {
            remote: remote.to_string(),
            status,
            error,
        }
    }

    /// Stage and commit everything, then push the current branch to every
    /// remote. Nothing is pushed when the commit changed no files. Returns
    /// the number of changed files.
    pub async fn commit_and_push(&self, project: &Project) -> Result<usize> {
        let session = self.session(project, project.working_dir()).await?;

        session.checked(&["add", "-A"], None).await?;
        let output = session.run(&["commit", "-m", COMMIT_MESSAGE]).await?;

        if !output.success() {
            let report = format!("{}{}", output.stdout, output.stderr);
            if report.contains("nothing to commit")
                || report.contains("no changes added")
            {
                info!("{}: nothing to commit", project.name);
                return Ok(0);
            }
            return Err(WatchError::git(format!(
                "git commit failed: {}",
                output.stderr.trim()
            )));
        }

        let changed = changed_files(&output.stdout);
        if changed == 0 {
            return Ok(0);
        }
        info!("{}: committed {changed} changed files", project.name);

        for remote in project.remotes.iter().filter(|r| !r.is_watcher_remote()) {
            let result = session
                .checked(&["push", &remote.name, "HEAD"], Some(&remote.name))
                .await
                .map(|_| ());
            self.sync_status(project, &remote.name, result);
        }

        Ok(changed)
    }

    /// Open a pull request from the current branch on the project's GitHub
    /// remote.
    pub async fn create_pull_request(
        &self,
        project: &Project,
    ) -> Result<PullRequestOutcome> {
        let Some(slug) = project
            .remotes
            .iter()
            .find_map(|remote| parse_github_remote(&remote.path))
        else {
            info!("{}: no github repository to open a pull request on", project.name);
            return Ok(PullRequestOutcome::Skipped("no github remote".into()));
        };

        let session = self.session(project, project.working_dir()).await?;

        let output = session.checked(&["branch", "-a"], None).await?;
        let branches = parse_branches(&output.stdout);
        let Some(base) = BASE_BRANCHES
            .iter()
            .find(|base| branches.iter().any(|b| b == *base))
        else {
            warn!("{}: no base branch for a pull request found", project.name);
            return Ok(PullRequestOutcome::Skipped("no base branch".into()));
        };

        let output = session
            .checked(&["rev-parse", "--abbrev-ref", "HEAD"], None)
            .await?;
        let head = output.stdout.trim().to_string();

        let req = CreatePrRequest {
            host: slug.host,
            owner: slug.owner,
            repo: slug.repo,
            title: PULL_REQUEST_TITLE.to_string(),
            head_branch: head,
            base_branch: base.to_string(),
            token: self.identity.token(),
        };

        match self.forge.create_pull_request(req).await {
            Ok(pr) => {
                info!("{}: opened pull request #{}", project.name, pr.number);
                Ok(PullRequestOutcome::Created(pr))
            }
            Err(WatchError::NoCommitsBetween { base, head }) => {
                info!(
                    "{}: no commits between {base} and {head}, skipping pull request",
                    project.name
                );
                Ok(PullRequestOutcome::NoCommits)
            }
            Err(err) => Err(err),
        }
    }
}

async fn same_path(left: &Path, right: &Path) -> bool {
    match (
        tokio::fs::canonicalize(left).await,
        tokio::fs::canonicalize(right).await,
    ) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}
