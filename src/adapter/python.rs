//! pip projects, either a project virtualenv or the global interpreter.
use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

use crate::{
    adapter::{
        DependencyAdapter,
        common::{DependencyIndex, ensure_supported_path, file_exists},
    },
    entity::{Dependency, Ecosystem, Project},
    error::{Result, WatchError},
    process::{CommandRunner, args},
    version,
};

/// An entry of `pip list --format json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipPackage {
    pub name: String,
    pub version: String,
}

/// An entry of `pip list --outdated --format json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipOutdated {
    pub name: String,
    pub version: String,
    pub latest_version: String,
    pub latest_filetype: String,
}

pub struct PipAdapter {
    runner: Arc<dyn CommandRunner>,
}

impl PipAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// `pip3` from the PATH for global projects, the virtualenv pip of the
    /// project otherwise.
    pub fn pip(project: &Project) -> PathBuf {
        if project.is_global {
            PathBuf::from("pip3")
        } else {
            project.working_dir().join(".venv").join("bin").join("pip")
        }
    }

    async fn pip_list<T: serde::de::DeserializeOwned>(
        &self,
        project: &Project,
        list_args: &[&str],
    ) -> Result<Vec<T>> {
        let pip = Self::pip(project);
        let pip = pip.to_string_lossy();

        let output = self
            .runner
            .run(&project.working_dir(), &pip, &args(list_args))
            .await?
            .into_result(&pip)?;

        Ok(serde_json::from_str(&output.stdout)?)
    }
}

#[async_trait]
impl DependencyAdapter for PipAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pip
    }

    async fn validate(&self, project: &Project) -> Result<()> {
        ensure_supported_path(project)?;

        if !project.is_global && !file_exists(&project.working_dir()).await {
            return Err(WatchError::invalid_project(format!(
                "{} is not available",
                project.path
            )));
        }

        let pip = Self::pip(project);
        let probe = self
            .runner
            .run(&project.working_dir(), &pip.to_string_lossy(), &[])
            .await;

        match probe {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(WatchError::invalid_project(format!(
                "{} exited with {:?}",
                pip.display(),
                output.exit_code
            ))),
            Err(err) => {
                warn!("{}: could not run {}: {err}", project.name, pip.display());
                Err(WatchError::invalid_project(format!(
                    "{} is not a pip project",
                    project.name
                )))
            }
        }
    }

    async fn load_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<Dependency>> {
        let (all, outdated) = tokio::try_join!(
            self.pip_list::<PipPackage>(project, &["list", "--format", "json"]),
            self.pip_list::<PipOutdated>(
                project,
                &["list", "--outdated", "--format", "json"]
            )
        )?;

        let mut index = DependencyIndex::from_project(project);

        for package in all.iter() {
            let data = serde_json::to_string(&[package])?;
            index.upsert_current(&package.name, &package.version, data);
        }

        for package in outdated.iter() {
            let versions = version::newer_than(
                &package.version,
                [package.latest_version.as_str()],
            );
            let data = serde_json::to_string(&[package])?;
            index.set_outdated(&package.name, &versions, Some(data))?;
        }

        Ok(index.into_dependencies())
    }

    /// Requirements files come in too many flavours to rewrite safely.
    async fn upgrade_deps(
        &self,
        project: &Project,
        dependencies: &[Dependency],
    ) -> Result<()> {
        warn!(
            "{}: cannot upgrade {} pip dependencies",
            project.name,
            dependencies.len()
        );
        Err(WatchError::NotImplemented(
            "upgrading pip dependencies".into(),
        ))
    }
}
