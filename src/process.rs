//! Running-process presence as a medium-confidence signal.
//!
//! A running tool proves nothing about who wrote the committed files, so
//! the pipeline only uses this for tools no session reader has claimed.

use crate::model::Tool;
use std::process::{Command, Stdio};
use tracing::trace;

/// Executable names, including case variants and aliases, and the tool each
/// one belongs to. Trailer identities are matched against the same table.
pub const KNOWN_EXECUTABLES: &[(&str, Tool)] = &[
    ("claude", Tool::ClaudeCode),
    ("aider", Tool::Aider),
    ("Cursor", Tool::Cursor),
    ("cursor", Tool::Cursor),
    ("copilot", Tool::Copilot),
    ("copilot-agent", Tool::Copilot),
    ("github-copilot", Tool::Copilot),
    ("codex", Tool::Codex),
];

/// Executable names registered for `tool`, in table order.
pub fn aliases(tool: Tool) -> impl Iterator<Item = &'static str> {
    KNOWN_EXECUTABLES
        .iter()
        .filter(move |(_, t)| *t == tool)
        .map(|(name, _)| *name)
}

/// Process table lookup by exact executable name.
pub trait ProcessProbe {
    /// `false` on platforms where the table cannot be queried.
    fn supported(&self) -> bool;

    fn is_running(&self, executable: &str) -> bool;
}

/// `pgrep -x` on Unix. Unsupported elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pgrep;

impl ProcessProbe for Pgrep {
    fn supported(&self) -> bool {
        cfg!(unix)
    }

    fn is_running(&self, executable: &str) -> bool {
        let status = Command::new("pgrep")
            .arg("-x")
            .arg(executable)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) => s.success(),
            Err(e) => {
                trace!(executable, error = %e, "pgrep unavailable");
                false
            }
        }
    }
}

/// Tools with at least one running executable, in [`Tool::ALL`] order.
/// Probing stops at a tool's first running alias.
pub fn running_tools(probe: &dyn ProcessProbe) -> Vec<Tool> {
    if !probe.supported() {
        return Vec::new();
    }
    Tool::ALL
        .into_iter()
        .filter(|tool| aliases(*tool).any(|exe| probe.is_running(exe)))
        .collect()
}
