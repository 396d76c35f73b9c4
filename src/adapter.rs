//! Package manager adapters.
//!
//! Every supported [`Ecosystem`] has one adapter implementing
//! [`DependencyAdapter`]. Adapters shell out to the package manager through a
//! [`CommandRunner`], merge its "all" and "outdated" reports into the
//! project's dependency set and, where supported, rewrite the manifest to the
//! newest available versions.
use async_trait::async_trait;
use log::*;
use std::sync::Arc;

use crate::{
    adapter::{maven::MavenAdapter, node::NodeAdapter, python::PipAdapter},
    entity::{Dependency, Ecosystem, Project},
    error::Result,
    process::CommandRunner,
};

mod common;
pub mod maven;
pub mod node;
pub mod python;

/// Options for [`DependencyAdapter::check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Only run the validity probe, leave the dependency set alone.
    pub validity_only: bool,
}

impl CheckOptions {
    pub fn validity_only() -> Self {
        Self {
            validity_only: true,
        }
    }
}

#[async_trait]
pub trait DependencyAdapter: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Fail unless the project can be handled by this adapter.
    async fn validate(&self, project: &Project) -> Result<()>;

    async fn load_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<Dependency>>;

    /// Rewrite the manifest so every dependency uses the highest of its
    /// available versions.
    async fn upgrade_deps(
        &self,
        project: &Project,
        dependencies: &[Dependency],
    ) -> Result<()>;

    /// Validate the project and, unless only validity was asked for, replace
    /// its dependency set and stamp the run time.
    async fn check(
        &self,
        mut project: Project,
        options: CheckOptions,
    ) -> Result<Project> {
        self.validate(&project).await?;

        if !options.validity_only {
            let dependencies = self.load_dependencies(&project).await?;
            info!(
                "{}: found {} {} dependencies",
                project.name,
                dependencies.len(),
                self.ecosystem()
            );
            common::apply_dependencies(&mut project, dependencies);
        }

        Ok(project)
    }

    /// No ecosystem generates CI configuration yet.
    async fn create_ci_file(&self, project: &Project) -> Result<()> {
        debug!(
            "{}: no ci file generation for {} projects",
            project.name,
            self.ecosystem()
        );
        Ok(())
    }
}

impl Ecosystem {
    /// Adapter handling projects of this ecosystem.
    pub fn adapter(
        self,
        runner: Arc<dyn CommandRunner>,
    ) -> Box<dyn DependencyAdapter> {
        match self {
            Ecosystem::Maven => Box::new(MavenAdapter::new(runner)),
            Ecosystem::Npm => Box::new(NodeAdapter::new(runner)),
            Ecosystem::Pip => Box::new(PipAdapter::new(runner)),
        }
    }
}
