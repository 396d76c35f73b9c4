use log::*;
use quick_xml::{
    Reader, Writer,
    events::{BytesText, Event},
};
use std::collections::HashMap;

use crate::error::Result;

/// Literal versions that can be replaced. Property references and ranges
/// are owned by the pom author.
fn is_literal_version(version: &str) -> bool {
    !version.is_empty()
        && !version.contains("${")
        && !version.starts_with(['[', '('])
}

#[derive(Debug, Default)]
struct PendingDependency<'a> {
    events: Vec<Event<'a>>,
    /// Element nesting below `<dependency>`.
    depth: usize,
    child: Option<String>,
    group: String,
    artifact: String,
    /// Position of the text event holding the version.
    version: Option<(usize, String)>,
}

impl PendingDependency<'_> {
    fn key(&self) -> String {
        format!("{}:{}", self.group.trim(), self.artifact.trim())
    }
}

/// Rewrite the `<version>` of every `<dependency>` whose `groupId:artifactId`
/// is a key of `upgrades`. Returns the new document and the number of
/// replaced versions.
pub fn rewrite_versions(
    content: &str,
    upgrades: &HashMap<String, String>,
) -> Result<(String, usize)> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::new());
    let mut pending: Option<PendingDependency> = None;
    let mut replaced = 0;

    loop {
        let event = reader.read_event()?;

        if let Event::Eof = event {
            break;
        }

        if pending.is_none() {
            if matches!(&event, Event::Start(e) if e.name().as_ref() == b"dependency")
            {
                pending = Some(PendingDependency {
                    events: vec![event],
                    ..Default::default()
                });
            } else {
                writer.write_event(event)?;
            }
            continue;
        }
        let Some(dependency) = pending.as_mut() else {
            continue;
        };

        match &event {
            Event::Start(e) => {
                dependency.depth += 1;
                if dependency.depth == 1 {
                    dependency.child =
                        Some(String::from_utf8_lossy(e.name().as_ref()).into());
                }
            }
            Event::Text(e) if dependency.depth == 1 => {
                let text = e.unescape()?.into_owned();
                match dependency.child.as_deref() {
                    Some("groupId") => dependency.group.push_str(&text),
                    Some("artifactId") => dependency.artifact.push_str(&text),
                    Some("version") => {
                        dependency.version =
                            Some((dependency.events.len(), text));
                    }
                    _ => {}
                }
            }
            Event::End(_) if dependency.depth > 0 => {
                dependency.depth -= 1;
                if dependency.depth == 0 {
                    dependency.child = None;
                }
            }
            _ => {}
        }

        let closes = dependency.depth == 0
            && matches!(&event, Event::End(e) if e.name().as_ref() == b"dependency");
        dependency.events.push(event);

        if closes && let Some(finished) = pending.take() {
            replaced += flush(&mut writer, finished, upgrades)?;
        }
    }

    // unbalanced documents keep whatever was buffered
    if let Some(dependency) = pending {
        for event in dependency.events {
            writer.write_event(event)?;
        }
    }

    Ok((String::from_utf8(writer.into_inner())?, replaced))
}

fn flush(
    writer: &mut Writer<Vec<u8>>,
    mut dependency: PendingDependency,
    upgrades: &HashMap<String, String>,
) -> Result<usize> {
    let mut replaced = 0;
    let key = dependency.key();

    if let (Some((index, current)), Some(next)) =
        (dependency.version.take(), upgrades.get(&key))
        && is_literal_version(current.trim())
        && current.trim() != next
    {
        info!("upgrading {key} from {} to {next}", current.trim());
        dependency.events[index] =
            Event::Text(BytesText::new(next).into_owned());
        replaced += 1;
    }

    for event in dependency.events {
        writer.write_event(event)?;
    }

    Ok(replaced)
}
