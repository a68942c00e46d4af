use super::{ReadContext, SessionReader};
use crate::error::ReadError;
use crate::model::{SessionInfo, Tool};
use std::collections::BTreeSet;
use std::fs;
use std::io;

/// Chat log Aider appends to in the repo root
pub const HISTORY_FILE: &str = ".aider.chat.history.md";

/// Marks a user turn in the history file
const USER_TURN: &str = "#### ";

/// Reads Aider's chat history from the repository itself.
///
/// Aider records no structured write events, so every filename-like user
/// input line is a candidate. The pipeline's intersection with the committed
/// files does the real filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct AiderReader;

impl SessionReader for AiderReader {
    fn tool(&self) -> Tool {
        Tool::Aider
    }

    fn read(&self, ctx: &ReadContext<'_>) -> Result<Option<SessionInfo>, ReadError> {
        let path = ctx.repo_root.join(HISTORY_FILE);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReadError::io(&path, e)),
        };
        let modified = meta.modified().map_err(|e| ReadError::io(&path, e))?;
        if !ctx.is_recent(modified) {
            return Ok(None);
        }

        let bytes = fs::read(&path).map_err(|e| ReadError::io(&path, e))?;
        let files = parse_history(&String::from_utf8_lossy(&bytes));
        if files.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionInfo::new(Tool::Aider).with_files(files)))
    }
}

/// Candidate paths from `#### ` user lines: trimmed, non-empty, and free of
/// whitespace. Prose prompts never survive the whitespace check.
pub fn parse_history(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix(USER_TURN))
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| !candidate.contains(char::is_whitespace))
        .map(str::to_string)
        .collect()
}
