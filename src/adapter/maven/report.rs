//! Parser for `mvn versions:display-dependency-updates` output.
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::adapter::maven::graph::clean_output;

static OUTDATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^:\s]+):([^:\s]+)[\s.]+(\S+)\s*->\s*(\S+)").unwrap()
});

/// One line of the updates report: `group:name ..... current -> latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedArtifact {
    pub group: String,
    pub name: String,
    pub current: String,
    pub latest: String,
}

impl OutdatedArtifact {
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }
}

/// Long coordinates make maven wrap the versions onto the next line, the
/// pattern spans line breaks to cover that.
pub fn parse_outdated(output: &str) -> Vec<OutdatedArtifact> {
    let output = clean_output(output);

    OUTDATED
        .captures_iter(&output)
        .map(|caps| OutdatedArtifact {
            group: caps[1].to_string(),
            name: caps[2].to_string(),
            current: caps[3].to_string(),
            latest: caps[4].to_string(),
        })
        .collect()
}
