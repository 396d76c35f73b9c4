//! Traits related to remote git forges
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::Result,
    forge::request::{CreatePrRequest, PullRequest},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PullRequestCreator: Send + Sync {
    /// Open a pull request. Fails with
    /// [`crate::error::WatchError::NoCommitsBetween`] when head has nothing
    /// base does not already have.
    async fn create_pull_request(&self, req: CreatePrRequest)
    -> Result<PullRequest>;
}
