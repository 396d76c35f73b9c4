//! Configuration loading and parsing for `depwatch.toml` files.
//!
//! Declares the tracked projects, git host credentials and the timing of the
//! watch loop.
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    entity::{Ecosystem, Project, RemoteProject, RemoteSetting},
    error::{Result, WatchError},
    store::Store,
};

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "depwatch.toml";

/// Default staleness interval in seconds.
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 3600;

/// Default delay between two ticks in seconds.
pub const DEFAULT_TICK_DELAY_SECS: u64 = 600;

/// A git remote declared for a project.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
}

/// A tracked project.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Project directory, ignored for global projects.
    #[serde(default)]
    pub path: String,
    /// Ecosystem tag: maven, npm or pip.
    #[serde(rename = "type")]
    pub ecosystem: Ecosystem,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub remotes: Vec<RemoteConfig>,
}

impl ProjectConfig {
    pub fn to_project(&self) -> Project {
        let mut project = if self.is_global {
            Project::global(&self.name, self.ecosystem)
        } else {
            Project::new(&self.name, &self.path, self.ecosystem)
        };
        project.remotes = self
            .remotes
            .iter()
            .map(|remote| RemoteProject::new(&remote.name, &remote.url))
            .collect();
        project
    }
}

/// Credentials for a git host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteSettingConfig {
    pub name: String,
    pub host: String,
    pub username: String,
    pub token: String,
    pub priority: i32,
    /// Name of the project the setting is scoped to, all projects when unset.
    pub project: Option<String>,
}

/// Root configuration structure for `depwatch.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds after which a checked project is due again.
    pub run_interval_secs: u64,
    /// Seconds between the end of one tick and the start of the next.
    pub tick_delay_secs: u64,
    /// Directory holding the upgrade working copies.
    pub work_dir: PathBuf,
    /// JSON snapshot the store is mirrored to, in memory only when unset.
    pub store_file: Option<PathBuf>,
    /// Directory the git env file search starts in.
    pub env_dir: Option<PathBuf>,
    pub projects: Vec<ProjectConfig>,
    pub remote_settings: Vec<RemoteSettingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_interval_secs: DEFAULT_RUN_INTERVAL_SECS,
            tick_delay_secs: DEFAULT_TICK_DELAY_SECS,
            work_dir: default_work_dir(),
            store_file: None,
            env_dir: None,
            projects: vec![],
            remote_settings: vec![],
        }
    }
}

fn default_work_dir() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join(".watcher")
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "{} not found, using default configuration",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_secs(self.tick_delay_secs)
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }

    fn validate(&self) -> Result<()> {
        for (i, project) in self.projects.iter().enumerate() {
            if project.name.trim().is_empty() {
                return Err(WatchError::invalid_config(format!(
                    "project #{} has no name",
                    i + 1
                )));
            }
            if !project.is_global && project.path.trim().is_empty() {
                return Err(WatchError::invalid_config(format!(
                    "project {} needs a path or is_global",
                    project.name
                )));
            }
            if self.projects[..i].iter().any(|p| p.name == project.name) {
                return Err(WatchError::invalid_config(format!(
                    "project {} is declared twice",
                    project.name
                )));
            }
        }

        for setting in self.remote_settings.iter() {
            if setting.host.trim().is_empty() {
                return Err(WatchError::invalid_config(
                    "remote setting without host",
                ));
            }
            let unknown = setting
                .project
                .as_deref()
                .filter(|name| self.project(name).is_none());
            if let Some(name) = unknown {
                return Err(WatchError::invalid_config(format!(
                    "remote setting for {} refers to unknown project {name}",
                    setting.host
                )));
            }
        }

        Ok(())
    }

    /// Upsert the configured projects and remote settings into the store,
    /// matching projects by name. Stored check results are kept.
    pub async fn sync_into(&self, store: &dyn Store) -> Result<()> {
        for config in self.projects.iter() {
            let mut project = config.to_project();

            if let Some(stored) = store.find_project_by_name(&config.name).await?
            {
                project.id = stored.id;
                project.meta = stored.meta;
                for remote in stored.remotes {
                    match project.remotes.iter_mut().find(|r| r.name == remote.name)
                    {
                        Some(configured) => configured.id = remote.id,
                        None => project.remotes.push(remote),
                    }
                }
            }

            store.save_project(&mut project).await?;
        }

        let stored_settings = store.load_remote_settings().await?;
        for config in self.remote_settings.iter() {
            let project_id = match config.project.as_deref() {
                Some(name) => store
                    .find_project_by_name(name)
                    .await?
                    .and_then(|p| p.id),
                None => None,
            };

            let mut setting = RemoteSetting {
                id: None,
                project_id,
                name: config.name.clone(),
                host: config.host.clone(),
                username: config.username.clone(),
                token: config.token.clone(),
                priority: config.priority,
            };
            setting.id = stored_settings
                .iter()
                .find(|s| {
                    s.host == setting.host
                        && s.username == setting.username
                        && s.project_id == setting.project_id
                })
                .and_then(|s| s.id);

            store.save_remote_setting(&mut setting).await?;
        }

        Ok(())
    }
}
