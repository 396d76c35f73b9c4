//! Common test helpers shared across test modules.
use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::{
    entity::{Ecosystem, Project, RemoteProject},
    error::{Result, WatchError},
    git::credentials::GitIdentity,
    process::{CommandRunner, ProcessOutput},
};

/// One recorded invocation of a [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub dir: PathBuf,
    pub command: String,
    pub args: Vec<String>,
}

impl Call {
    /// Arguments without leading `-c key=value` git configuration.
    pub fn plain_args(&self) -> Vec<String> {
        strip_config(&self.args).to_vec()
    }
}

fn strip_config(args: &[String]) -> &[String] {
    let mut rest = args;
    while rest.len() >= 2 && rest[0] == "-c" {
        rest = &rest[2..];
    }
    rest
}

#[derive(Debug, Clone)]
enum Reply {
    Output(ProcessOutput),
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    command: String,
    prefix: Vec<String>,
    dir: Option<PathBuf>,
    reply: Reply,
}

/// A [`CommandRunner`] answering from a script and recording every call.
///
/// Rules match on the command and a prefix of the arguments (git `-c`
/// configuration is skipped). The longest matching prefix wins, later rules
/// win ties. Unmatched calls succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, command: &str, prefix: &[&str], output: ProcessOutput) -> Self {
        self.rule(command, prefix, None, Reply::Output(output))
    }

    /// Like [`ScriptedRunner::on`] but only for calls inside `dir`.
    pub fn on_in(
        self,
        dir: impl AsRef<Path>,
        command: &str,
        prefix: &[&str],
        output: ProcessOutput,
    ) -> Self {
        let dir = Some(dir.as_ref().to_path_buf());
        self.rule(command, prefix, dir, Reply::Output(output))
    }

    pub fn ok(self, command: &str, prefix: &[&str], stdout: &str) -> Self {
        self.on(command, prefix, ProcessOutput::new(stdout, "", Some(0)))
    }

    /// Make the command impossible to spawn.
    pub fn missing(self, command: &str) -> Self {
        self.rule(command, &[], None, Reply::SpawnFailure)
    }

    fn rule(
        mut self,
        command: &str,
        prefix: &[&str],
        dir: Option<PathBuf>,
        reply: Reply,
    ) -> Self {
        self.rules.push(Rule {
            command: command.to_string(),
            prefix: prefix.iter().map(|p| p.to_string()).collect(),
            dir,
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Plain argument lists of every call of `command`.
    pub fn calls_of(&self, command: &str) -> Vec<Vec<String>> {
        self.calls()
            .iter()
            .filter(|call| call.command == command)
            .map(Call::plain_args)
            .collect()
    }

    /// Whether `command` was called with exactly these plain arguments.
    pub fn called(&self, command: &str, args: &[&str]) -> bool {
        self.calls_of(command).iter().any(|call| call == args)
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        working_dir: &Path,
        command: &str,
        args: &[String],
    ) -> Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                dir: working_dir.to_path_buf(),
                command: command.to_string(),
                args: args.to_vec(),
            });
        }

        let plain = strip_config(args);
        let rule = self
            .rules
            .iter()
            .filter(|rule| {
                rule.command == command
                    && plain.starts_with(&rule.prefix)
                    && rule.dir.as_ref().is_none_or(|dir| dir == working_dir)
            })
            .max_by_key(|rule| rule.prefix.len());

        match rule.map(|rule| &rule.reply) {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::SpawnFailure) => Err(WatchError::Other(
                color_eyre::eyre::eyre!("{command}: not found"),
            )),
            None => Ok(ProcessOutput::new("", "", Some(0))),
        }
    }
}

pub fn test_identity() -> GitIdentity {
    GitIdentity {
        mail: "watcher@example.com".into(),
        user: "watcher".into(),
        password: SecretString::from("gh-token".to_string()),
    }
}

/// A local project with a single `origin` remote on GitHub.
pub fn github_project(name: &str, path: impl AsRef<Path>, ecosystem: Ecosystem) -> Project {
    let mut project =
        Project::new(name, path.as_ref().to_string_lossy(), ecosystem);
    project.remotes.push(RemoteProject::new(
        "origin",
        format!("https://github.com/acme/{name}.git"),
    ));
    project
}
