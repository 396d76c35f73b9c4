use secrecy::SecretString;

#[derive(Debug, Clone)]
/// Request to open a pull request.
pub struct CreatePrRequest {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub head_branch: String,
    pub base_branch: String,
    pub token: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A created pull request.
pub struct PullRequest {
    pub number: u64,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Repository coordinates parsed from a remote url.
pub struct RepoSlug {
    pub host: String,
    pub owner: String,
    pub repo: String,
}
