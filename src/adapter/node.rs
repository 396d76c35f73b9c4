//! npm projects, local or the global package set.
use async_trait::async_trait;
use log::*;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    adapter::{
        DependencyAdapter,
        common::{
            DependencyIndex, ensure_supported_path, file_exists, upgrade_targets,
        },
        node::{
            package_json::PackageJson,
            types::{NpmOutdated, NpmProject},
        },
    },
    entity::{Dependency, Ecosystem, Project},
    error::{Result, WatchError},
    process::{CommandRunner, args},
    version,
};

mod package_json;
mod types;

const NPM: &str = "npm";

pub struct NodeAdapter {
    runner: Arc<dyn CommandRunner>,
}

impl NodeAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn query_args(project: &Project, query: &str) -> Vec<String> {
        let mut query = args(&[query, "--json"]);
        if project.is_global {
            query.push("-g".into());
        }
        query
    }

    async fn list_all(&self, project: &Project) -> Result<NpmProject> {
        let output = self
            .runner
            .run(
                &project.working_dir(),
                NPM,
                &Self::query_args(project, "ls"),
            )
            .await?
            .into_result(NPM)?;

        Ok(serde_json::from_str(&output.stdout)?)
    }

    async fn list_outdated(
        &self,
        project: &Project,
    ) -> Result<BTreeMap<String, NpmOutdated>> {
        // exits with 1 whenever something is outdated
        let output = self
            .runner
            .run(
                &project.working_dir(),
                NPM,
                &Self::query_args(project, "outdated"),
            )
            .await?
            .into_result(NPM)?;

        if output.stdout.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&output.stdout)?)
    }
}

#[async_trait]
impl DependencyAdapter for NodeAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn validate(&self, project: &Project) -> Result<()> {
        ensure_supported_path(project)?;

        // plain `npm` prints its usage and exits with 1
        let exit_code =
            match self.runner.run(&project.working_dir(), NPM, &[]).await {
                Ok(output) => output.exit_code,
                Err(err) => {
                    warn!("{}: could not run {NPM}: {err}", project.name);
                    None
                }
            };

        let has_manifest = project.is_global
            || file_exists(&project.working_dir().join("package.json")).await;

        if exit_code != Some(1) || !has_manifest {
            return Err(WatchError::invalid_project(format!(
                "{} is not a npm project",
                project.name
            )));
        }

        Ok(())
    }

    async fn load_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<Dependency>> {
        let (all, outdated) = tokio::try_join!(
            self.list_all(project),
            self.list_outdated(project)
        )?;

        let mut index = DependencyIndex::from_project(project);

        for (name, dependency) in all.dependencies.iter() {
            let Some(version) = dependency.version.as_deref() else {
                warn!("{}: {name} is not installed", project.name);
                continue;
            };
            let data = serde_json::to_string(&[dependency])?;
            index.upsert_current(name, version, data);
        }

        for (name, record) in outdated.iter() {
            let current = record
                .current
                .as_deref()
                .or_else(|| {
                    all.dependencies
                        .get(name)
                        .and_then(|dep| dep.version.as_deref())
                })
                .unwrap_or_default();
            let versions = version::newer_than(
                current,
                [record.latest.as_str(), record.wanted.as_str()],
            );
            let data = serde_json::to_string(&[record])?;
            index.set_outdated(name, &versions, Some(data))?;
        }

        Ok(index.into_dependencies())
    }

    async fn upgrade_deps(
        &self,
        project: &Project,
        dependencies: &[Dependency],
    ) -> Result<()> {
        if project.is_global {
            return Err(WatchError::NotImplemented(
                "upgrading global npm packages".into(),
            ));
        }

        let upgrades = upgrade_targets(dependencies)?;

        if upgrades.is_empty() {
            return Ok(());
        }

        let manifest = project.working_dir().join("package.json");
        let content = tokio::fs::read_to_string(&manifest).await?;
        let (content, replaced) = PackageJson::new().upgrade(&content, &upgrades)?;
        tokio::fs::write(&manifest, content).await?;

        info!(
            "{}: upgraded {replaced} requirements in {}",
            project.name,
            manifest.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
