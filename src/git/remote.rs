//! Parsers for `git remote` output.
use std::collections::BTreeMap;

/// Fetch and push URL of a remote as listed by `git remote -v`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteUrls {
    pub fetch: Option<String>,
    pub push: Option<String>,
}

/// Parse `git remote -v` into remote name -> urls.
pub fn parse_remote_list(output: &str) -> BTreeMap<String, RemoteUrls> {
    let mut remotes: BTreeMap<String, RemoteUrls> = BTreeMap::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        let urls = remotes.entry(name.to_string()).or_default();
        match parts.next() {
            Some("(push)") => urls.push = Some(url.to_string()),
            _ => urls.fetch = Some(url.to_string()),
        }
    }

    remotes
}

/// Detailed state of one remote as reported by `git remote show <name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDetails {
    pub name: String,
    pub fetch_url: Option<String>,
    pub push_url: Option<String>,
    pub head_branch: Option<String>,
    pub remote_branches: Vec<String>,
    /// Local branches configured to pull from this remote.
    pub pull_branches: Vec<String>,
    /// Local refs configured to push to this remote.
    pub push_refs: Vec<String>,
}

impl RemoteDetails {
    pub fn knows_branch(&self, branch: &str) -> bool {
        self.remote_branches.iter().any(|b| b == branch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    RemoteBranches,
    PullBranches,
    PushRefs,
}

/// Parse `git remote show <name>` by scanning line prefixes. Unknown lines
/// are ignored so new git versions do not break the parser.
pub fn parse_remote_show(output: &str) -> RemoteDetails {
    let mut details = RemoteDetails::default();
    let mut section = Section::Header;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("* remote ") {
            details.name = name.to_string();
            section = Section::Header;
        } else if let Some(url) = trimmed.strip_prefix("Fetch URL:") {
            details.fetch_url = Some(url.trim().to_string());
            section = Section::Header;
        } else if let Some(url) = trimmed.strip_prefix("Push  URL:") {
            details.push_url = Some(url.trim().to_string());
            section = Section::Header;
        } else if let Some(head) = trimmed.strip_prefix("HEAD branch:") {
            let head = head.trim();
            // "(unknown)" for empty remotes
            if !head.starts_with('(') {
                details.head_branch = Some(head.to_string());
            }
            section = Section::Header;
        } else if trimmed.starts_with("Remote branch") {
            section = Section::RemoteBranches;
            // single entries may share the line: "Remote branch: main tracked"
            if let Some(branch) = inline_entry(trimmed) {
                details.remote_branches.push(branch);
            }
        } else if trimmed.starts_with("Local branch")
            && trimmed.contains("'git pull'")
        {
            section = Section::PullBranches;
        } else if trimmed.starts_with("Local ref")
            && trimmed.contains("'git push'")
        {
            section = Section::PushRefs;
        } else if let Some(first) = trimmed.split_whitespace().next() {
            let entry = first.to_string();
            match section {
                Section::RemoteBranches => details.remote_branches.push(entry),
                Section::PullBranches => details.pull_branches.push(entry),
                Section::PushRefs => details.push_refs.push(entry),
                Section::Header => {}
            }
        }
    }

    details
}

fn inline_entry(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(':')?;
    rest.split_whitespace().next().map(str::to_string)
}
