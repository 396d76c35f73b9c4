//! Persistence of projects and remote settings.
//!
//! The pipeline only talks to the [`Store`] trait. [`MemoryStore`] keeps
//! every entity in its own table keyed by surrogate id, children point at
//! their parent through explicit id fields, and aggregates are assembled on
//! load. It can mirror its tables into a JSON file so the last run of each
//! project survives restarts.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::Mutex};

#[cfg(test)]
use mockall::automock;

use crate::{
    entity::{
        Dependency, Ecosystem, Id, Project, ProjectMeta, RemoteProject,
        RemoteSetting, strip_credentials,
    },
    error::Result,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn load_projects(&self) -> Result<Vec<Project>>;
    async fn load_project(&self, id: Id) -> Result<Option<Project>>;
    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>>;
    /// Upsert the project together with its meta, dependencies and remotes.
    /// Assigns ids to every entity that did not have one yet.
    async fn save_project(&self, project: &mut Project) -> Result<()>;
    /// Delete the project and everything it owns.
    async fn delete_project(&self, id: Id) -> Result<bool>;
    async fn save_remote(&self, remote: &mut RemoteProject) -> Result<()>;
    async fn load_remote_settings(&self) -> Result<Vec<RemoteSetting>>;
    async fn save_remote_setting(&self, setting: &mut RemoteSetting)
    -> Result<()>;
    async fn delete_remote_setting(&self, id: Id) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProjectRow {
    name: String,
    path: String,
    ecosystem: Ecosystem,
    is_global: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetaRow {
    project_id: Id,
    last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    last_id: Id,
    projects: BTreeMap<Id, ProjectRow>,
    metas: BTreeMap<Id, MetaRow>,
    dependencies: BTreeMap<Id, Dependency>,
    remotes: BTreeMap<Id, RemoteProject>,
    settings: BTreeMap<Id, RemoteSetting>,
}

impl Tables {
    fn claim_id(&mut self, id: Option<Id>) -> Id {
        match id {
            Some(id) => {
                self.last_id = self.last_id.max(id);
                id
            }
            None => {
                self.last_id += 1;
                self.last_id
            }
        }
    }

    fn assemble(&self, id: Id, row: &ProjectRow) -> Project {
        let meta = self
            .metas
            .iter()
            .find(|(_, meta)| meta.project_id == id)
            .map(|(meta_id, meta)| {
                let mut dependencies = self
                    .dependencies
                    .values()
                    .filter(|dep| dep.meta_id == Some(*meta_id))
                    .cloned()
                    .collect::<Vec<Dependency>>();
                dependencies.sort_by(|a, b| a.name.cmp(&b.name));

                ProjectMeta {
                    id: Some(*meta_id),
                    project_id: Some(id),
                    last_run: meta.last_run,
                    dependencies,
                }
            });

        let remotes = self
            .remotes
            .values()
            .filter(|remote| remote.project_id == Some(id))
            .cloned()
            .collect();

        Project {
            id: Some(id),
            name: row.name.clone(),
            path: row.path.clone(),
            ecosystem: row.ecosystem,
            is_global: row.is_global,
            meta,
            remotes,
        }
    }

    fn upsert_remote(&mut self, remote: &mut RemoteProject) {
        let id = self.claim_id(remote.id);
        remote.id = Some(id);
        let mut row = remote.clone();
        row.path = strip_credentials(&row.path);
        self.remotes.insert(id, row);
    }

    fn remove_meta(&mut self, meta_id: Id) {
        self.metas.remove(&meta_id);
        self.dependencies.retain(|_, dep| dep.meta_id != Some(meta_id));
    }
}

/// In-memory arena store, optionally mirrored to a JSON snapshot file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file, loading it when it exists.
    pub async fn open(snapshot: impl AsRef<Path>) -> Result<Self> {
        let snapshot = snapshot.as_ref().to_path_buf();

        let tables = if fs::try_exists(&snapshot).await? {
            let content = fs::read_to_string(&snapshot).await?;
            let tables: Tables = serde_json::from_str(&content)?;
            info!(
                "loaded {} projects from {}",
                tables.projects.len(),
                snapshot.display()
            );
            tables
        } else {
            debug!("no snapshot found at {}", snapshot.display());
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot: Some(snapshot),
        })
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        if let Some(snapshot) = &self.snapshot {
            let content = serde_json::to_string_pretty(tables)?;
            fs::write(snapshot, content).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_projects(&self) -> Result<Vec<Project>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .iter()
            .map(|(id, row)| tables.assemble(*id, row))
            .collect())
    }

    async fn load_project(&self, id: Id) -> Result<Option<Project>> {
        let tables = self.tables.lock().await;
        Ok(tables.projects.get(&id).map(|row| tables.assemble(id, row)))
    }

    async fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .iter()
            .find(|(_, row)| row.name == name)
            .map(|(id, row)| tables.assemble(*id, row)))
    }

    async fn save_project(&self, project: &mut Project) -> Result<()> {
        let mut tables = self.tables.lock().await;

        let project_id = tables.claim_id(project.id);
        project.id = Some(project_id);
        tables.projects.insert(
            project_id,
            ProjectRow {
                name: project.name.clone(),
                path: project.path.clone(),
                ecosystem: project.ecosystem,
                is_global: project.is_global,
            },
        );

        let stale_metas = tables
            .metas
            .iter()
            .filter(|(meta_id, meta)| {
                meta.project_id == project_id
                    && project.meta.as_ref().and_then(|m| m.id)
                        != Some(**meta_id)
            })
            .map(|(meta_id, _)| *meta_id)
            .collect::<Vec<Id>>();
        for meta_id in stale_metas {
            tables.remove_meta(meta_id);
        }

        if let Some(meta) = project.meta.as_mut() {
            let meta_id = tables.claim_id(meta.id);
            meta.id = Some(meta_id);
            meta.project_id = Some(project_id);
            tables.metas.insert(
                meta_id,
                MetaRow {
                    project_id,
                    last_run: meta.last_run,
                },
            );

            let mut kept = vec![];
            for dependency in meta.dependencies.iter_mut() {
                let dep_id = tables.claim_id(dependency.id);
                dependency.id = Some(dep_id);
                dependency.meta_id = Some(meta_id);
                tables.dependencies.insert(dep_id, dependency.clone());
                kept.push(dep_id);
            }

            // the meta owns its dependency set, drop rows no longer in it
            tables.dependencies.retain(|id, dep| {
                dep.meta_id != Some(meta_id) || kept.contains(id)
            });
        }

        for remote in project.remotes.iter_mut() {
            remote.project_id = Some(project_id);
            tables.upsert_remote(remote);
        }

        debug!("saved project {} ({project_id})", project.name);
        self.persist(&tables).await
    }

    async fn delete_project(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;

        if tables.projects.remove(&id).is_none() {
            return Ok(false);
        }

        let metas = tables
            .metas
            .iter()
            .filter(|(_, meta)| meta.project_id == id)
            .map(|(meta_id, _)| *meta_id)
            .collect::<Vec<Id>>();
        for meta_id in metas {
            tables.remove_meta(meta_id);
        }
        tables
            .remotes
            .retain(|_, remote| remote.project_id != Some(id));
        tables
            .settings
            .retain(|_, setting| setting.project_id != Some(id));

        self.persist(&tables).await?;
        Ok(true)
    }

    async fn save_remote(&self, remote: &mut RemoteProject) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.upsert_remote(remote);
        self.persist(&tables).await
    }

    async fn load_remote_settings(&self) -> Result<Vec<RemoteSetting>> {
        let tables = self.tables.lock().await;
        Ok(tables.settings.values().cloned().collect())
    }

    async fn save_remote_setting(
        &self,
        setting: &mut RemoteSetting,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let id = tables.claim_id(setting.id);
        setting.id = Some(id);
        tables.settings.insert(id, setting.clone());
        self.persist(&tables).await
    }

    async fn delete_remote_setting(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let removed = tables.settings.remove(&id).is_some();
        if removed {
            self.persist(&tables).await?;
        }
        Ok(removed)
    }
}
