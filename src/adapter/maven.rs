//! Maven projects, driven through `mvn`.
use async_trait::async_trait;
use log::*;
use std::sync::Arc;

use crate::{
    adapter::{
        DependencyAdapter,
        common::{
            DependencyIndex, ensure_supported_path, file_exists, upgrade_targets,
        },
        maven::{
            graph::{DependencyTree, parse_dependency_trees},
            report::{OutdatedArtifact, parse_outdated},
        },
    },
    entity::{Dependency, Ecosystem, Project},
    error::{Result, WatchError},
    process::{CommandRunner, args},
    version,
};

pub mod graph;
pub mod pom;
pub mod report;

const MVN: &str = "mvn";

pub struct MavenAdapter {
    runner: Arc<dyn CommandRunner>,
}

impl MavenAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn list_all(&self, project: &Project) -> Result<Vec<DependencyTree>> {
        let output = self
            .runner
            .run(
                &project.working_dir(),
                MVN,
                &args(&["dependency:tree", "-DoutputType=dot"]),
            )
            .await?
            .into_result(MVN)?;

        parse_dependency_trees(&output.stdout)
    }

    async fn list_outdated(
        &self,
        project: &Project,
    ) -> Result<Vec<OutdatedArtifact>> {
        let output = self
            .runner
            .run(
                &project.working_dir(),
                MVN,
                &args(&["versions:display-dependency-updates"]),
            )
            .await?
            .into_result(MVN)?;

        Ok(parse_outdated(&output.stdout))
    }
}

#[async_trait]
impl DependencyAdapter for MavenAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    async fn validate(&self, project: &Project) -> Result<()> {
        if project.is_global {
            return Err(WatchError::invalid_project(
                "Global Maven Projects are currently not allowed",
            ));
        }
        ensure_supported_path(project)?;

        // plain `mvn` without a goal fails with exit code 1
        let probe = self.runner.run(&project.working_dir(), MVN, &[]).await;
        let exit_code = match probe {
            Ok(output) => output.exit_code,
            Err(err) => {
                warn!("{}: could not run {MVN}: {err}", project.name);
                None
            }
        };

        let pom = project.working_dir().join("pom.xml");
        if exit_code != Some(1) || !file_exists(&pom).await {
            return Err(WatchError::invalid_project(format!(
                "{} is not a maven project",
                project.path
            )));
        }

        Ok(())
    }

    async fn load_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<Dependency>> {
        let (trees, outdated) =
            tokio::try_join!(self.list_all(project), self.list_outdated(project))?;

        let mut index = DependencyIndex::from_project(project);
        let mut seen = vec![];

        // direct dependencies of every module, the first module wins
        for tree in trees.iter() {
            debug!(
                "{}: {} has {} transitive dependencies",
                project.name,
                tree.artifact.key(),
                tree.transitive_count()
            );
            for dependency in tree.dependencies.iter() {
                let key = dependency.artifact.key();
                if seen.contains(&key) {
                    continue;
                }
                let data = serde_json::to_string(&[dependency])?;
                index.upsert_current(&key, &dependency.artifact.version, data);
                seen.push(key);
            }
        }

        for artifact in outdated.iter() {
            let versions =
                version::newer_than(&artifact.current, [artifact.latest.as_str()]);
            index.set_outdated(&artifact.key(), &versions, None)?;
        }

        Ok(index.into_dependencies())
    }

    async fn upgrade_deps(
        &self,
        project: &Project,
        dependencies: &[Dependency],
    ) -> Result<()> {
        let upgrades = upgrade_targets(dependencies)?;

        if upgrades.is_empty() {
            return Ok(());
        }

        let pom = project.working_dir().join("pom.xml");
        let content = tokio::fs::read_to_string(&pom).await?;
        let (content, replaced) = pom::rewrite_versions(&content, &upgrades)?;
        tokio::fs::write(&pom, content).await?;

        info!(
            "{}: upgraded {replaced} of {} dependencies in {}",
            project.name,
            upgrades.len(),
            pom.display()
        );
        Ok(())
    }
}
