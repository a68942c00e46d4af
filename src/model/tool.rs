use serde::{Deserialize, Serialize};
use std::fmt;

/// An AI coding tool that can be attributed to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    ClaudeCode,
    Aider,
    Cursor,
    Copilot,
    Codex,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::ClaudeCode,
        Tool::Aider,
        Tool::Cursor,
        Tool::Copilot,
        Tool::Codex,
    ];

    /// Wire identifier, e.g. `claude-code`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::ClaudeCode => "claude-code",
            Tool::Aider => "aider",
            Tool::Cursor => "cursor",
            Tool::Copilot => "copilot",
            Tool::Codex => "codex",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

/// How a tool was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    FileMatch,
    Process,
    Trailer,
}
