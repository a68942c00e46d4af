use super::{find_workspace, ReadContext, SessionReader};
use crate::error::ReadError;
use crate::model::{SessionInfo, Tool};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CHAT_SESSIONS_DIR: &str = "chatSessions";

/// Response part kind carrying an applied file edit
const EDIT_PART: &str = "textEditGroup";

/// Reads Copilot agent-mode chat sessions from VS Code workspace storage.
#[derive(Debug, Clone)]
pub struct CopilotReader {
    workspace_storage: Vec<PathBuf>,
}

impl CopilotReader {
    /// `workspace_storage` lists the `User/workspaceStorage` directories of
    /// each VS Code channel, searched in order.
    pub fn new(workspace_storage: Vec<PathBuf>) -> Self {
        Self { workspace_storage }
    }
}

impl SessionReader for CopilotReader {
    fn tool(&self) -> Tool {
        Tool::Copilot
    }

    fn read(&self, ctx: &ReadContext<'_>) -> Result<Option<SessionInfo>, ReadError> {
        let Some(workspace) = find_workspace(&self.workspace_storage, ctx.repo_root) else {
            return Ok(None);
        };

        let mut merged = SessionInfo::new(Tool::Copilot);
        let mut longest: u64 = 0;

        for path in recent_sessions(&workspace.join(CHAT_SESSIONS_DIR), ctx) {
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "unreadable chat session");
                    continue;
                }
            };
            let session = match parse_chat_session(&bytes, ctx) {
                Ok(Some(s)) => s,
                Ok(None) => continue,
                Err(e) => {
                    debug!(error = %ReadError::json(&path, e), "skipping malformed chat session");
                    continue;
                }
            };

            merged.files_written.extend(session.files_written);
            if let Some(model) = session.model {
                merged.set_model(model);
            }
            longest = longest.max(session.session_duration_sec.unwrap_or(0));
        }

        if merged.is_empty() {
            return Ok(None);
        }
        Ok(Some(merged.with_duration_secs(longest)))
    }
}

/// Recent `*.json` files in `chat_dir`, in name order.
fn recent_sessions(chat_dir: &Path, ctx: &ReadContext<'_>) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(chat_dir) else {
        return Vec::new();
    };
    let mut sessions: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let path = entry.path();
            path.extension().is_some_and(|ext| ext == "json")
                && entry
                    .metadata()
                    .ok()
                    .filter(|m| m.is_file())
                    .and_then(|m| m.modified().ok())
                    .is_some_and(|t| ctx.is_recent(t))
        })
        .map(|entry| entry.path())
        .collect();
    sessions.sort();
    sessions
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatSession {
    #[serde(default)]
    requests: Option<Vec<ChatRequest>>,
    #[serde(default)]
    selected_model: Option<SelectedModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    /// Epoch milliseconds
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    model_id: Option<String>,
    /// Parts are heterogeneous; only edit groups are inspected. Null is
    /// written for requests that never got a reply.
    #[serde(default)]
    response: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct SelectedModel {
    #[serde(default)]
    metadata: Option<ModelMetadata>,
}

#[derive(Deserialize)]
struct ModelMetadata {
    #[serde(default)]
    family: Option<String>,
}

/// Parse one chat session file.
///
/// Files come from `textEditGroup` response parts whose `uri.path` lies
/// under the repo root. The model is `selectedModel.metadata.family`, or the
/// first per-request `modelId` when no family is recorded. Duration spans the
/// earliest to latest positive request timestamp.
///
/// `Ok(None)` when the session edited no repo files.
pub fn parse_chat_session(
    bytes: &[u8],
    ctx: &ReadContext<'_>,
) -> Result<Option<SessionInfo>, serde_json::Error> {
    let session: ChatSession = serde_json::from_slice(bytes)?;
    let mut info = SessionInfo::new(Tool::Copilot);

    if let Some(family) = session
        .selected_model
        .and_then(|m| m.metadata)
        .and_then(|m| m.family)
    {
        info.set_model(family);
    }

    let mut first: Option<i64> = None;
    let mut last: Option<i64> = None;

    for request in session.requests.unwrap_or_default() {
        if let Some(ts) = request.timestamp.filter(|t| *t > 0) {
            first = Some(first.map_or(ts, |f| f.min(ts)));
            last = Some(last.map_or(ts, |l| l.max(ts)));
        }
        if info.model.is_none() {
            if let Some(model_id) = request.model_id {
                info.set_model(model_id);
            }
        }

        for part in request.response.iter().flatten() {
            if part.get("kind").and_then(Value::as_str) != Some(EDIT_PART) {
                continue;
            }
            let Some(path) = part.pointer("/uri/path").and_then(Value::as_str) else {
                continue;
            };
            if let Some(rel) = ctx.relativize(path) {
                info.add_file(rel);
            }
        }
    }

    if info.is_empty() {
        return Ok(None);
    }

    let duration_ms = match (first, last) {
        (Some(f), Some(l)) => (l - f).max(0),
        _ => 0,
    };
    Ok(Some(info.with_duration_secs((duration_ms / 1000) as u64)))
}
