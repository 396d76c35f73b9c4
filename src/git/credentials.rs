//! Git identity and per-host credentials injected into git invocations.
use log::*;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    path::{Path, PathBuf},
};
use url::Url;

use crate::{
    entity::{Project, RemoteSetting},
    error::{Result, WatchError},
};

/// Directory marker the env file search stops at.
pub const ROOT_MARKER: &str = "Cargo.toml";

pub const ENV_FILE: &str = "env.env";

/// Identity used for commits, pushes and pull requests. Loaded once at
/// startup and shared by every git invocation.
#[derive(Clone)]
pub struct GitIdentity {
    pub mail: String,
    pub user: String,
    pub password: SecretString,
}

impl fmt::Debug for GitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitIdentity")
            .field("mail", &self.mail)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Parse `KEY=VALUE` lines. Lines without `=` are skipped, keys and values
/// are trimmed.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    content
        .split('\n')
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

impl GitIdentity {
    pub fn from_env(content: &str) -> Result<Self> {
        let mut values = parse_env(content);
        let mut take = |key: &str| {
            values.remove(key).ok_or_else(|| {
                WatchError::invalid_config(format!("{key} missing in {ENV_FILE}"))
            })
        };

        Ok(Self {
            mail: take("GIT_MAIL")?,
            password: SecretString::from(take("GIT_PASSWORD")?),
            user: take("GIT_USER")?,
        })
    }

    /// Walk upwards from `start` to the first directory containing
    /// `Cargo.toml` and read the env file located there.
    pub async fn discover(start: &Path) -> Result<Self> {
        let root = find_root(start).await.ok_or_else(|| {
            WatchError::invalid_config(format!(
                "no {ROOT_MARKER} found above {}",
                start.display()
            ))
        })?;

        let env_file = root.join(ENV_FILE);
        let content =
            tokio::fs::read_to_string(&env_file).await.map_err(|err| {
                WatchError::invalid_config(format!(
                    "could not read {}: {err}",
                    env_file.display()
                ))
            })?;

        let identity = Self::from_env(&content)?;
        info!("loaded git identity {} from {}", identity.mail, env_file.display());
        Ok(identity)
    }

    /// Git configuration for one invocation on `project`: the commit
    /// identity plus a username and credential helper for every setting that
    /// applies to the project.
    ///
    /// All matching settings are used, a global and a project setting for
    /// the same host both end up as helpers and git tries them in order.
    /// https remotes on hosts no setting covers fall back to `GIT_USER` and
    /// `GIT_PASSWORD`.
    pub fn config_args(
        &self,
        project: &Project,
        settings: &[RemoteSetting],
    ) -> Vec<String> {
        let mut config = vec![
            format!("user.email={}", self.mail),
            format!("user.name={}", self.user),
        ];

        let mut covered = BTreeSet::new();
        for setting in settings.iter().filter(|s| s.applies_to(project)) {
            covered.insert(setting.host.to_lowercase());
            push_credential(
                &mut config,
                &setting.host,
                &setting.username,
                &setting.token,
            );
        }

        for host in fallback_hosts(project, &covered) {
            push_credential(
                &mut config,
                &host,
                &self.user,
                self.password.expose_secret(),
            );
        }

        config
            .into_iter()
            .flat_map(|value| ["-c".to_string(), value])
            .collect()
    }

    /// Token for the pull request API.
    pub fn token(&self) -> SecretString {
        self.password.clone()
    }
}

fn push_credential(
    config: &mut Vec<String>,
    host: &str,
    username: &str,
    password: &str,
) {
    let scope = format!("credential.https://{host}");
    config.push(format!("{scope}.username={username}"));
    config.push(format!(
        "{scope}.helper=!f() {{ echo \"password={password}\"; }}; f"
    ));
}

/// Hosts of the project's https remotes that no setting covers, in remote
/// order and without duplicates. Watcher remotes are left out.
fn fallback_hosts(project: &Project, covered: &BTreeSet<String>) -> Vec<String> {
    let mut hosts: Vec<String> = vec![];
    for remote in project.remotes.iter().filter(|r| !r.is_watcher_remote()) {
        let Ok(url) = Url::parse(&remote.path) else {
            continue;
        };
        if url.scheme() != "https" {
            continue;
        }
        let Some(host) = url.host_str().map(str::to_lowercase) else {
            continue;
        };
        if !covered.contains(&host) && !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

async fn find_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if tokio::fs::try_exists(dir.join(ROOT_MARKER))
            .await
            .unwrap_or(false)
        {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}
