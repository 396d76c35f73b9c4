//! Tracked projects and the data derived from checking them.
//!
//! Ownership runs strictly downwards: a [`Project`] owns its optional
//! [`ProjectMeta`] and its [`RemoteProject`]s, a meta owns its
//! [`Dependency`] records. Children only remember the surrogate id of their
//! parent, the store keeps the rows in flat tables keyed by those ids.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{path::PathBuf, str::FromStr};
use strum::{Display, EnumIter, EnumString};
use url::Url;

use crate::{
    error::{Result, WatchError},
    version,
};

/// Surrogate identity assigned by the store.
pub type Id = u64;

/// Remotes whose name ends with this suffix only exist to carry push
/// credentials and are never recorded on a project.
pub const WATCHER_SUFFIX: &str = "-watcher";

/// Package manager family a project belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Ecosystem {
    #[strum(to_string = "maven", serialize = "mvn")]
    Maven,
    #[strum(to_string = "npm", serialize = "node")]
    Npm,
    #[strum(to_string = "pip", serialize = "python")]
    Pip,
}

impl Ecosystem {
    /// Parse an ecosystem tag, ignoring case.
    pub fn parse(tag: &str) -> Result<Self> {
        Self::from_str(tag.trim())
            .map_err(|_| WatchError::UnknownEcosystem(tag.to_string()))
    }
}

impl Serialize for Ecosystem {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ecosystem {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ecosystem::parse(&tag).map_err(serde::de::Error::custom)
    }
}

/// A project tracked for outdated dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<Id>,
    pub name: String,
    /// Filesystem path of the project, empty for global projects.
    pub path: String,
    #[serde(rename = "type")]
    pub ecosystem: Ecosystem,
    /// Global projects track the package manager's global dependency set.
    pub is_global: bool,
    pub meta: Option<ProjectMeta>,
    pub remotes: Vec<RemoteProject>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        ecosystem: Ecosystem,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            path: path.into(),
            ecosystem,
            is_global: false,
            meta: None,
            remotes: vec![],
        }
    }

    pub fn global(name: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            is_global: true,
            ..Self::new(name, "", ecosystem)
        }
    }

    /// Directory external commands run in; `/` when no path is set.
    pub fn working_dir(&self) -> PathBuf {
        if self.path.is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(&self.path)
        }
    }

    /// Whether the path points at a remote location instead of a local
    /// directory.
    pub fn has_remote_path(&self) -> bool {
        self.path.contains("://")
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.meta.as_ref().and_then(|meta| meta.last_run)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        self.meta
            .as_ref()
            .map(|meta| meta.dependencies.as_slice())
            .unwrap_or_default()
    }
}

/// Result of the latest dependency check of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub id: Option<Id>,
    pub project_id: Option<Id>,
    /// `None` means the project has never been checked.
    pub last_run: Option<DateTime<Utc>>,
    /// Ordered by name.
    pub dependencies: Vec<Dependency>,
}

/// A single dependency of a project, identified by its name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Option<Id>,
    pub meta_id: Option<Id>,
    /// Ecosystem qualified name, e.g. `group:artifact` for Maven.
    pub name: String,
    pub current_version: String,
    /// JSON encoded list of newer versions, `[]` when up to date.
    pub available_versions: String,
    /// JSON encoded raw report entry of the adapter.
    pub data: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available_versions: "[]".into(),
            ..Default::default()
        }
    }

    /// Decoded list of available versions. An empty field decodes to an
    /// empty list.
    pub fn available_versions(&self) -> Result<Vec<String>> {
        if self.available_versions.trim().is_empty() {
            return Ok(vec![]);
        }
        Ok(serde_json::from_str(&self.available_versions)?)
    }

    pub fn set_available_versions(&mut self, versions: &[String]) -> Result<()> {
        self.available_versions = serde_json::to_string(versions)?;
        Ok(())
    }

    /// Whether any available version is newer than the current one.
    pub fn is_upgradable(&self) -> bool {
        match self.available_versions() {
            Ok(versions) => versions
                .iter()
                .any(|v| version::is_newer(v, &self.current_version)),
            Err(err) => {
                log::error!(
                    "invalid available versions for {}: {err}",
                    self.name
                );
                false
            }
        }
    }
}

/// A git remote recorded for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: Option<Id>,
    pub project_id: Option<Id>,
    pub name: String,
    /// Remote URL. Never stored with embedded credentials.
    pub path: String,
}

impl RemoteProject {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn is_watcher_remote(&self) -> bool {
        self.name.ends_with(WATCHER_SUFFIX)
    }
}

/// Credentials for a git host, either global or scoped to one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSetting {
    pub id: Option<Id>,
    /// `None` applies the setting to every project.
    pub project_id: Option<Id>,
    pub name: String,
    pub host: String,
    pub username: String,
    pub token: String,
    /// Stored but not used to break ties between settings of one host.
    pub priority: i32,
}

impl RemoteSetting {
    pub fn applies_to(&self, project: &Project) -> bool {
        match self.project_id {
            None => true,
            Some(id) => project.id == Some(id),
        }
    }
}

/// Remove user info from a remote URL. Values that are not URLs (scp-like
/// `git@host:path` remotes) are returned unchanged.
pub fn strip_credentials(remote_url: &str) -> String {
    match Url::parse(remote_url) {
        Ok(mut url)
            if !url.username().is_empty() || url.password().is_some() =>
        {
            // both only fail for cannot-be-a-base urls, which carry no
            // credentials anyway
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.to_string()
        }
        _ => remote_url.to_string(),
    }
}
