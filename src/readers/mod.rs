//! Per-tool session readers.
//!
//! Each reader answers one question for its tool: which repo files did it
//! write recently? Readers never see each other; the pipeline iterates the
//! registered list and treats `Ok(None)` and `Err(_)` alike as "no session".

mod aider;
mod claude_code;
mod copilot;
mod cursor;
mod workspace;

pub use aider::{parse_history, AiderReader, HISTORY_FILE};
pub use claude_code::{find_latest_session, flatten_repo_path, parse_transcript, ClaudeCodeReader};
pub use copilot::{parse_chat_session, CopilotReader};
pub use cursor::CursorReader;
pub use workspace::{find_workspace, folder_uri_to_path};

use crate::error::ReadError;
use crate::model::{SessionInfo, Tool};
use crate::paths::StoragePaths;
use crate::store::StoreQuery;
use chrono::{DateTime, Utc};
use std::path::{Component, Path};
use std::time::SystemTime;

/// Inputs shared by every reader for one detection run.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub repo_root: &'a Path,
    /// Artifacts last touched before this instant are stale
    pub cutoff: DateTime<Utc>,
}

impl<'a> ReadContext<'a> {
    pub fn new(repo_root: &'a Path, cutoff: DateTime<Utc>) -> Self {
        Self { repo_root, cutoff }
    }

    /// `true` when `modified` is at or after the cutoff.
    pub fn is_recent(&self, modified: SystemTime) -> bool {
        DateTime::<Utc>::from(modified) >= self.cutoff
    }

    /// Same as [`is_recent`](Self::is_recent) for epoch-millisecond stamps.
    pub fn is_recent_millis(&self, epoch_ms: i64) -> bool {
        epoch_ms >= self.cutoff.timestamp_millis()
    }

    /// Repo-relative, `/`-separated form of `absolute`, or `None` when it
    /// does not lie under the repo root.
    pub fn relativize(&self, absolute: &str) -> Option<String> {
        let rel = Path::new(absolute).strip_prefix(self.repo_root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}

pub trait SessionReader {
    fn tool(&self) -> Tool;

    /// Recent session data for the repo in `ctx`. `Ok(None)` means the tool
    /// is not installed, has no matching session, or wrote no files.
    fn read(&self, ctx: &ReadContext<'_>) -> Result<Option<SessionInfo>, ReadError>;
}

/// The standard reader registry, one reader per storage shape.
pub fn default_readers(
    paths: &StoragePaths,
    store: Box<dyn StoreQuery>,
) -> Vec<Box<dyn SessionReader>> {
    vec![
        Box::new(ClaudeCodeReader::new(paths.claude_projects.clone())),
        Box::new(AiderReader),
        Box::new(CopilotReader::new(paths.vscode_workspace_storage.clone())),
        Box::new(CursorReader::new(
            paths.cursor_workspace_storage.clone(),
            paths.cursor_global_db.clone(),
            store,
        )),
    ]
}
