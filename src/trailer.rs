//! `Co-authored-by:` trailers as a medium-confidence signal.

use crate::model::{Detection, Tool};
use crate::process::KNOWN_EXECUTABLES;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static CO_AUTHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*co-authored-by:[ \t]*(?P<identity>.+?)[ \t]*$")
        .expect("co-author pattern is valid")
});

/// Tools named by co-author trailers, deduplicated, in message order.
///
/// Only the display name (the part before `<`) is considered. It is split
/// into lowercase alphanumeric words and must contain the words of an
/// executable alias as a contiguous run, so `Claude` and `GitHub Copilot`
/// match while `Claudette` does not. Identities naming more than one tool,
/// or none, are skipped.
pub fn trailer_tools(message: &str) -> Vec<Tool> {
    let mut tools = Vec::new();
    for caps in CO_AUTHOR.captures_iter(message) {
        let identity = &caps["identity"];
        match identify(identity) {
            Some(tool) if !tools.contains(&tool) => tools.push(tool),
            Some(_) => {}
            None => debug!(identity, "co-author does not name exactly one tool"),
        }
    }
    tools
}

/// Medium-confidence trailer detections for `message`.
pub fn detect_trailers(message: &str, files_committed: usize) -> Vec<Detection> {
    trailer_tools(message)
        .into_iter()
        .map(|tool| Detection::trailer(tool, files_committed))
        .collect()
}

fn identify(identity: &str) -> Option<Tool> {
    let name = identity.split('<').next().unwrap_or_default();
    let words = normalize(name);
    if words.is_empty() {
        return None;
    }
    let haystack = format!("-{words}-");

    let mut found: Option<Tool> = None;
    for (alias, tool) in KNOWN_EXECUTABLES {
        if !haystack.contains(&format!("-{}-", normalize(alias))) {
            continue;
        }
        match found {
            None => found = Some(*tool),
            Some(t) if t == *tool => {}
            Some(_) => return None,
        }
    }
    found
}

/// Lowercase alphanumeric words joined by `-`.
fn normalize(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
