//! Parser for `mvn dependency:tree -DoutputType=dot` output.
//!
//! Maven prints one `digraph "<root>" { ... }` block per module. Every edge
//! line names the dependant and the dependency as quoted coordinates:
//!
//! ```text
//! [INFO] digraph "com.example:demo:jar:1.0.0" {
//! [INFO]  "com.example:demo:jar:1.0.0" -> "junit:junit:jar:4.12:test" ;
//! [INFO]  "junit:junit:jar:4.12:test" -> "org.hamcrest:hamcrest-core:jar:1.3:test" ;
//! [INFO]  }
//! ```
//!
//! Each block is reduced to a single rooted [`DependencyTree`].
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeSet, HashMap},
    sync::LazyLock,
};

use crate::error::{Result, WatchError};

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b[^m]*?m").unwrap());

static LOG_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\[[^\]\n]+\][ \t]*").unwrap());

static GRAPH_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"digraph\s+"([^"\s]+)"\s*\{"#).unwrap());

static EDGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\s]+)"\s*->\s*"([^"\s]+)"\s*;?"#).unwrap()
});

const SCOPES: [&str; 6] =
    ["compile", "provided", "runtime", "test", "system", "import"];

/// Remove color codes and leading `[INFO]` style tags from maven output.
pub fn clean_output(output: &str) -> String {
    let output = ANSI_ESCAPE.replace_all(output, "");
    LOG_LEVEL.replace_all(&output, "").into_owned()
}

/// A maven coordinate as printed in dependency graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub group: String,
    pub name: String,
    /// Packaging type, `jar` for most artifacts.
    pub packaging: String,
    pub classifier: Option<String>,
    pub version: String,
    /// Absent for the root of a graph.
    pub scope: Option<String>,
}

impl Artifact {
    /// Parse `group:name:packaging[:classifier]:version[:scope]`.
    pub fn parse(coordinate: &str) -> Result<Self> {
        let mut parts: Vec<&str> = coordinate.split(':').collect();

        let scope = if parts.len() >= 5
            && parts.last().is_some_and(|last| SCOPES.contains(last))
        {
            parts.pop().map(str::to_string)
        } else {
            None
        };

        let (group, name, packaging, classifier, version) = match parts[..] {
            [group, name, packaging, version] => {
                (group, name, packaging, None, version)
            }
            [group, name, packaging, classifier, version] => {
                (group, name, packaging, Some(classifier), version)
            }
            _ => {
                return Err(WatchError::parse(format!(
                    "invalid maven coordinate: {coordinate}"
                )));
            }
        };

        if !version.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(WatchError::parse(format!(
                "invalid version in maven coordinate: {coordinate}"
            )));
        }

        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            packaging: packaging.to_string(),
            classifier: classifier.map(str::to_string),
            version: version.to_string(),
            scope,
        })
    }

    /// `group:name`, the identity used for dependency records.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    fn node_key(&self) -> NodeKey {
        (
            self.group.clone(),
            self.name.clone(),
            self.packaging.clone(),
            self.classifier.clone(),
            self.version.clone(),
        )
    }
}

/// Nodes are merged when everything but the scope matches.
type NodeKey = (String, String, String, Option<String>, String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyTree {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub dependencies: Vec<DependencyTree>,
}

impl DependencyTree {
    /// Number of distinct artifacts below this node.
    pub fn transitive_count(&self) -> usize {
        let mut seen = BTreeSet::new();
        self.collect_keys(&mut seen);
        seen.len()
    }

    fn collect_keys(&self, seen: &mut BTreeSet<NodeKey>) {
        for dependency in self.dependencies.iter() {
            seen.insert(dependency.artifact.node_key());
            dependency.collect_keys(seen);
        }
    }
}

/// Parse every `digraph` block into one tree per block.
pub fn parse_dependency_trees(output: &str) -> Result<Vec<DependencyTree>> {
    let output = clean_output(output);
    let mut trees = vec![];
    let mut cursor = 0;

    while let Some(start) = GRAPH_START.captures_at(&output, cursor) {
        let (Some(header), Some(root)) = (start.get(0), start.get(1)) else {
            break;
        };

        if output[cursor..header.start()].contains('}') {
            return Err(WatchError::parse(
                "dependency tree end found before its start",
            ));
        }

        let end = output[header.end()..]
            .find('}')
            .map(|index| header.end() + index)
            .ok_or_else(|| {
                WatchError::parse("could not find dependency tree end")
            })?;

        let region = &output[header.end()..end];
        trees.push(build_tree(root.as_str(), region)?);
        cursor = end + 1;
    }

    if trees.is_empty() {
        return Err(WatchError::parse("could not find dependency tree start"));
    }

    Ok(trees)
}

#[derive(Debug)]
struct Node {
    artifact: Artifact,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
struct Graph {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, usize>,
    referenced: Vec<bool>,
}

impl Graph {
    fn node(&mut self, artifact: Artifact) -> usize {
        let key = artifact.node_key();
        if let Some(id) = self.index.get(&key) {
            return *id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            artifact,
            children: vec![],
        });
        self.referenced.push(false);
        self.index.insert(key, id);
        id
    }

    fn edge(&mut self, dependant: usize, dependency: usize) {
        let children = &mut self.nodes[dependant].children;
        if !children.contains(&dependency) {
            children.push(dependency);
        }
        self.referenced[dependency] = true;
    }

    fn single_root(&self) -> Result<usize> {
        let roots = (0..self.nodes.len())
            .filter(|id| !self.referenced[*id])
            .collect::<Vec<usize>>();

        match roots[..] {
            [root] => Ok(root),
            [] => Err(WatchError::parse("dependency graph has no root")),
            _ => Err(WatchError::parse(format!(
                "dependency graph has {} roots: {}",
                roots.len(),
                roots
                    .iter()
                    .map(|id| self.nodes[*id].artifact.key())
                    .collect::<Vec<String>>()
                    .join(", ")
            ))),
        }
    }

    fn tree(&self, id: usize, path: &mut Vec<usize>) -> DependencyTree {
        path.push(id);
        let mut dependencies = vec![];
        for child in self.nodes[id].children.iter() {
            // a cycle would never terminate, cut it where it closes
            if !path.contains(child) {
                dependencies.push(self.tree(*child, path));
            }
        }
        path.pop();

        DependencyTree {
            artifact: self.nodes[id].artifact.clone(),
            dependencies,
        }
    }
}

fn build_tree(root: &str, region: &str) -> Result<DependencyTree> {
    let mut graph = Graph::default();
    graph.node(Artifact::parse(root)?);

    for edge in EDGE.captures_iter(region) {
        let (Some(dependant), Some(dependency)) = (edge.get(1), edge.get(2))
        else {
            continue;
        };
        let dependant = graph.node(Artifact::parse(dependant.as_str())?);
        let dependency = graph.node(Artifact::parse(dependency.as_str())?);
        graph.edge(dependant, dependency);
    }

    let root = graph.single_root()?;
    Ok(graph.tree(root, &mut vec![]))
}
