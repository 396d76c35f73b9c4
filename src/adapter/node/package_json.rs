use log::*;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::Result;

const SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "optionalDependencies",
    "peerDependencies",
];

/// Handles package.json rewrites for upgraded dependencies.
pub struct PackageJson {}

impl PackageJson {
    pub fn new() -> Self {
        Self {}
    }

    /// Pin every dependency named in `upgrades` to its new version, keeping
    /// a `^` or `~` range operator. Returns the new document and the number
    /// of replaced requirements.
    pub fn upgrade(
        &self,
        content: &str,
        upgrades: &HashMap<String, String>,
    ) -> Result<(String, usize)> {
        let mut doc: Value = serde_json::from_str(content)?;
        let mut replaced = 0;

        for section in SECTIONS {
            let Some(deps) =
                doc.get_mut(section).and_then(Value::as_object_mut)
            else {
                continue;
            };

            for (name, requirement) in deps.iter_mut() {
                let (Some(next), Some(current)) =
                    (upgrades.get(name), requirement.as_str())
                else {
                    continue;
                };

                if let Some(updated) = self.replace_requirement(current, next) {
                    debug!("{section}: {name} {current} -> {updated}");
                    *requirement = Value::String(updated);
                    replaced += 1;
                }
            }
        }

        let mut formatted = serde_json::to_string_pretty(&doc)?;
        if content.ends_with('\n') {
            formatted.push('\n');
        }

        Ok((formatted, replaced))
    }

    /// Only plain versions are touched, tags, urls and paths are kept.
    fn replace_requirement(&self, current: &str, next: &str) -> Option<String> {
        let operator = match current.chars().next() {
            Some(c @ ('^' | '~')) => c.to_string(),
            _ => String::new(),
        };
        let version = &current[operator.len()..];

        if !version.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }

        let updated = format!("{operator}{next}");
        (updated != current).then_some(updated)
    }
}
