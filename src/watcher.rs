//! Per-project watch pipeline: check the dependencies, persist them, record
//! new git remotes and open an upgrade pull request when something is
//! outdated.
use chrono::{DateTime, Utc};
use log::*;
use std::{path::PathBuf, sync::Arc};

use crate::{
    adapter::CheckOptions,
    entity::{Dependency, Project},
    error::{Result, WatchError},
    git::{GitOrchestrator, PullRequestOutcome},
    process::CommandRunner,
    store::Store,
};

/// Branch upgrades of one day are committed to.
pub fn upgrade_branch(now: DateTime<Utc>) -> String {
    format!("upgrade-{}", now.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The project path is no git working copy, nothing to push to.
    NotARepository,
    UpToDate,
    /// The ecosystem cannot rewrite this project's manifest.
    Unsupported,
    Upgraded {
        dependencies: usize,
        changed_files: usize,
        pull_request: Option<PullRequestOutcome>,
    },
}

pub struct Watcher {
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn Store>,
    git: Arc<GitOrchestrator>,
    work_dir: PathBuf,
}

impl Watcher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn Store>,
        git: Arc<GitOrchestrator>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            store,
            git,
            work_dir: work_dir.into(),
        }
    }

    /// Run the ecosystem check and persist the result. Validity-only checks
    /// leave the stored project untouched.
    pub async fn check(
        &self,
        project: Project,
        options: CheckOptions,
    ) -> Result<Project> {
        let adapter = project.ecosystem.adapter(self.runner.clone());
        let mut project = adapter.check(project, options).await?;

        if !options.validity_only {
            self.store.save_project(&mut project).await?;
        }

        Ok(project)
    }

    /// One full watch round for a project.
    pub async fn watch_project(&self, project: Project) -> Result<UpgradeOutcome> {
        let mut project = self.check(project, CheckOptions::default()).await?;

        let added = self.git.check_remotes(&mut project).await?;
        if added > 0 {
            debug!("{}: {added} new remotes", project.name);
        }

        self.upgrade(&project).await
    }

    /// Upgrade outdated dependencies in a separate working copy and propose
    /// the change as a pull request.
    pub async fn upgrade(&self, project: &Project) -> Result<UpgradeOutcome> {
        if !self.git.is_repo(project).await? {
            debug!("{}: not a git repository, skipping upgrade", project.name);
            return Ok(UpgradeOutcome::NotARepository);
        }

        let working_copy = self.working_copy(project);
        tokio::fs::create_dir_all(working_copy.working_dir()).await?;

        let branch = upgrade_branch(Utc::now());
        self.git.checkout(&working_copy, &branch).await?;

        let adapter = working_copy.ecosystem.adapter(self.runner.clone());
        adapter.create_ci_file(&working_copy).await?;

        let upgradable = project
            .dependencies()
            .iter()
            .filter(|dependency| dependency.is_upgradable())
            .cloned()
            .collect::<Vec<Dependency>>();

        if upgradable.is_empty() {
            info!("{}: no updates available", project.name);
            return Ok(UpgradeOutcome::UpToDate);
        }

        info!(
            "{}: upgrading {} dependencies on {branch}",
            project.name,
            upgradable.len()
        );

        match adapter.upgrade_deps(&working_copy, &upgradable).await {
            Ok(()) => {}
            Err(WatchError::NotImplemented(what)) => {
                warn!("{}: {what} is not supported", project.name);
                return Ok(UpgradeOutcome::Unsupported);
            }
            Err(err) => return Err(err),
        }

        let changed_files = self.git.commit_and_push(&working_copy).await?;
        let pull_request = if changed_files > 0 {
            Some(self.git.create_pull_request(&working_copy).await?)
        } else {
            None
        };

        Ok(UpgradeOutcome::Upgraded {
            dependencies: upgradable.len(),
            changed_files,
            pull_request,
        })
    }

    /// The project as checked out below the work directory. Shares id,
    /// name, ecosystem and remotes so credentials resolve the same way.
    fn working_copy(&self, project: &Project) -> Project {
        let path = self.work_dir.join(&project.name);
        Project {
            path: path.to_string_lossy().to_string(),
            meta: None,
            ..project.clone()
        }
    }
}

#[cfg(test)]
mod tests;
