use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of `npm ls --json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NpmProject {
    #[serde(default)]
    pub dependencies: BTreeMap<String, NpmDependency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpmDependency {
    /// Missing when the package is declared but not installed.
    pub version: Option<String>,
    pub resolved: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

/// One entry of `npm outdated --json`, keyed by package name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpmOutdated {
    pub current: Option<String>,
    pub wanted: String,
    pub latest: String,
    pub dependent: Option<String>,
    pub location: Option<String>,
}
