//! Lenient version ordering shared by every ecosystem.
//!
//! npm reports strict semver, pip and Maven frequently do not ("1.2",
//! "2.0.0.RELEASE", "31.1-jre"). Versions are compared as semver when both
//! sides can be coerced into it, otherwise segment by segment.
use semver::Version as SemVer;
use std::cmp::Ordering;

/// Try to read a version as semver, padding missing minor/patch parts.
pub fn coerce(version: &str) -> Option<SemVer> {
    let trimmed = version.trim().trim_start_matches(['v', 'V']);

    if let Ok(parsed) = SemVer::parse(trimmed) {
        return Some(parsed);
    }

    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(index) => trimmed.split_at(index),
        None => (trimmed, ""),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);

    SemVer::parse(&padded).ok()
}

/// Total order over version strings.
pub fn compare(left: &str, right: &str) -> Ordering {
    if let (Some(l), Some(r)) = (coerce(left), coerce(right)) {
        return l.cmp(&r);
    }
    compare_segments(left, right)
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare(candidate, current) == Ordering::Greater
}

/// Highest version among `current` and `candidates`.
pub fn highest<'a>(
    current: &'a str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> &'a str {
    candidates.into_iter().fold(current, |best, candidate| {
        if is_newer(candidate, best) {
            candidate
        } else {
            best
        }
    })
}

/// Keep the candidates newer than `current`, in order, without duplicates.
pub fn newer_than<'a>(
    current: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut versions: Vec<String> = vec![];
    for candidate in candidates {
        if is_newer(candidate, current)
            && !versions.iter().any(|v| v == candidate)
        {
            versions.push(candidate.to_string());
        }
    }
    versions
}

fn compare_segments(left: &str, right: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.trim()
            .split(['.', '-', '_', '+'])
            .map(|s| s.to_ascii_lowercase())
            .collect()
    };
    let left = split(left);
    let right = split(right);

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            // numeric segments sort after qualifiers like "beta"
            (Ok(_), Err(_)) => Ordering::Greater,
            (Err(_), Ok(_)) => Ordering::Less,
            (Err(_), Err(_)) => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len())
}
