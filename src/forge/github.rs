//! Implements pull request creation for GitHub
use async_trait::async_trait;
use log::*;
use octocrab::Octocrab;
use regex::Regex;
use std::sync::LazyLock;

use crate::{
    error::{Result, WatchError},
    forge::{
        request::{CreatePrRequest, PullRequest, RepoSlug},
        traits::PullRequestCreator,
    },
};

static GITHUB_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-z+]+://)?(?:[^@/]+@)?(github\.com)[:/]([^/\s]+)/([^/\s]+?)(?:\.git)?/?$",
    )
    .unwrap()
});

const NO_COMMITS: &str = "No commits between";

/// Owner and repository of a `github.com` remote, `None` for other hosts.
pub fn parse_github_remote(url: &str) -> Option<RepoSlug> {
    let caps = GITHUB_REMOTE.captures(url.trim())?;
    Some(RepoSlug {
        host: caps[1].to_string(),
        owner: caps[2].to_string(),
        repo: caps[3].to_string(),
    })
}

/// Creates pull requests through the GitHub REST API.
#[derive(Debug, Default, Clone)]
pub struct Github {}

impl Github {
    pub fn new() -> Self {
        Self {}
    }

    fn client(&self, req: &CreatePrRequest) -> Result<Octocrab> {
        let base_uri = format!("https://api.{}", req.host);
        let instance = Octocrab::builder()
            .personal_token(req.token.clone())
            .base_uri(base_uri)?
            .build()?;
        Ok(instance)
    }
}

fn is_no_commits_error(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            source.message.contains(NO_COMMITS)
                || source.errors.iter().flatten().any(|error| {
                    error
                        .get("message")
                        .and_then(|message| message.as_str())
                        .is_some_and(|message| message.contains(NO_COMMITS))
                })
        }
        _ => false,
    }
}

#[async_trait]
impl PullRequestCreator for Github {
    async fn create_pull_request(
        &self,
        req: CreatePrRequest,
    ) -> Result<PullRequest> {
        let instance = self.client(&req)?;

        info!(
            "creating pull request {}/{}: {} -> {}",
            req.owner, req.repo, req.head_branch, req.base_branch
        );

        let result = instance
            .pulls(&req.owner, &req.repo)
            .create(&req.title, &req.head_branch, &req.base_branch)
            .send()
            .await;

        match result {
            Ok(pr) => Ok(PullRequest {
                number: pr.number,
                url: pr.html_url.map(|url| url.to_string()),
            }),
            Err(err) if is_no_commits_error(&err) => {
                Err(WatchError::NoCommitsBetween {
                    base: req.base_branch,
                    head: req.head_branch,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
