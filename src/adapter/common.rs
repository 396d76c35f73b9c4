use chrono::Utc;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use crate::{
    entity::{Dependency, Project, ProjectMeta},
    error::{Result, WatchError},
    version,
};

/// Adapters only handle local directories or the global package set.
pub fn ensure_supported_path(project: &Project) -> Result<()> {
    if project.is_global {
        return Ok(());
    }
    if project.path.is_empty() || project.has_remote_path() {
        return Err(WatchError::UnsupportedPath(project.path.clone()));
    }
    Ok(())
}

pub async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Merges package manager reports into the dependencies a project already
/// has, keyed by name so re-checks keep dependency identities.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    entries: BTreeMap<String, Dependency>,
}

impl DependencyIndex {
    pub fn from_project(project: &Project) -> Self {
        let entries = project
            .dependencies()
            .iter()
            .map(|dep| (dep.name.clone(), dep.clone()))
            .collect();
        Self { entries }
    }

    /// Record a dependency from the "all" report. Available versions are
    /// reset, only the outdated report may fill them again.
    pub fn upsert_current(
        &mut self,
        name: &str,
        version: &str,
        data: String,
    ) {
        let dependency = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Dependency::new(name));
        dependency.current_version = version.to_string();
        dependency.available_versions = "[]".into();
        dependency.data = data;
    }

    /// Record a dependency from the outdated report. It must have been part
    /// of the "all" report.
    pub fn set_outdated(
        &mut self,
        name: &str,
        versions: &[String],
        data: Option<String>,
    ) -> Result<()> {
        let dependency = self
            .entries
            .get_mut(name)
            .ok_or_else(|| WatchError::InconsistentReport(name.to_string()))?;
        dependency.set_available_versions(versions)?;
        if let Some(data) = data {
            dependency.data = data;
        }
        Ok(())
    }

    /// Dependencies ordered by name.
    pub fn into_dependencies(self) -> Vec<Dependency> {
        self.entries.into_values().collect()
    }
}

/// Replace the dependency set of a project and stamp its run time, creating
/// the meta on the first check.
pub fn apply_dependencies(project: &mut Project, dependencies: Vec<Dependency>) {
    let meta = project.meta.get_or_insert_with(ProjectMeta::default);
    meta.dependencies = dependencies;
    meta.last_run = Some(Utc::now());
}

/// Version each dependency should be raised to, only for dependencies
/// that have a newer one available.
pub fn upgrade_targets(
    dependencies: &[Dependency],
) -> Result<HashMap<String, String>> {
    let mut upgrades = HashMap::new();
    for dependency in dependencies.iter() {
        let available = dependency.available_versions()?;
        let target = version::highest(
            &dependency.current_version,
            available.iter().map(String::as_str),
        );
        if target != dependency.current_version {
            upgrades.insert(dependency.name.clone(), target.to_string());
        }
    }
    Ok(upgrades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Ecosystem;

    #[test]
    fn rejects_remote_and_empty_paths_of_local_projects() {
        let remote = Project::new("r", "https://example.com/x", Ecosystem::Npm);
        assert!(matches!(
            ensure_supported_path(&remote),
            Err(WatchError::UnsupportedPath(_))
        ));

        let empty = Project::new("e", "", Ecosystem::Npm);
        assert!(ensure_supported_path(&empty).is_err());

        let global = Project::global("g", Ecosystem::Npm);
        assert!(ensure_supported_path(&global).is_ok());

        let local = Project::new("l", "/srv/l", Ecosystem::Npm);
        assert!(ensure_supported_path(&local).is_ok());
    }

    #[test]
    fn merging_keeps_identities_of_known_dependencies() {
        let mut project = Project::new("demo", "/srv/demo", Ecosystem::Npm);
        let mut known = Dependency::new("left-pad");
        known.id = Some(4);
        known.meta_id = Some(2);
        known.current_version = "0.9.0".into();
        apply_dependencies(&mut project, vec![known]);

        let mut index = DependencyIndex::from_project(&project);
        index.upsert_current("left-pad", "1.0.0", "{}".into());
        index.upsert_current("chalk", "4.0.0", "{}".into());
        let dependencies = index.into_dependencies();

        assert_eq!(dependencies.len(), 2);
        assert_eq!(dependencies[0].name, "chalk");
        assert_eq!(dependencies[0].id, None);
        assert_eq!(dependencies[1].id, Some(4));
        assert_eq!(dependencies[1].current_version, "1.0.0");
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut project = Project::new("demo", "/srv/demo", Ecosystem::Npm);

        for _ in 0..2 {
            let mut index = DependencyIndex::from_project(&project);
            index.upsert_current("left-pad", "1.0.0", "[]".into());
            index
                .set_outdated("left-pad", &["1.1.0".to_string()], None)
                .unwrap();
            let dependencies = index.into_dependencies();
            apply_dependencies(&mut project, dependencies);
        }

        assert_eq!(project.dependencies().len(), 1);
        assert_eq!(project.dependencies()[0].available_versions, r#"["1.1.0"]"#);
    }

    #[test]
    fn outdated_without_current_is_inconsistent() {
        let mut index = DependencyIndex::default();
        index.upsert_current("left-pad", "1.0.0", "[]".into());

        let err = index
            .set_outdated("foo", &["2.0.0".to_string()], None)
            .unwrap_err();
        assert!(matches!(err, WatchError::InconsistentReport(name) if name == "foo"));
    }

    #[test]
    fn current_report_resets_available_versions() {
        let mut index = DependencyIndex::default();
        index.upsert_current("left-pad", "1.0.0", "[]".into());
        index
            .set_outdated("left-pad", &["1.1.0".to_string()], None)
            .unwrap();
        index.upsert_current("left-pad", "1.1.0", "[]".into());

        let dependencies = index.into_dependencies();
        assert_eq!(dependencies[0].available_versions, "[]");
        assert!(!dependencies[0].is_upgradable());
    }

    #[test]
    fn upgrade_targets_pick_the_highest_newer_version() {
        let mut outdated = Dependency::new("left-pad");
        outdated.current_version = "1.0.0".into();
        outdated
            .set_available_versions(&["1.1.0".to_string(), "1.3.0".to_string()])
            .unwrap();
        let mut current = Dependency::new("chalk");
        current.current_version = "4.0.0".into();

        let targets = upgrade_targets(&[outdated, current]).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets["left-pad"], "1.3.0");
    }

    #[test]
    fn applying_dependencies_stamps_last_run() {
        let mut project = Project::new("demo", "/srv/demo", Ecosystem::Npm);
        assert!(project.last_run().is_none());

        apply_dependencies(&mut project, vec![Dependency::new("a")]);

        assert!(project.last_run().is_some());
        assert_eq!(project.dependencies().len(), 1);
    }
}
