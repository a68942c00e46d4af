use super::{ReadContext, SessionReader};
use crate::error::ReadError;
use crate::model::{SessionInfo, Tool};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Sub-agent transcripts share the directory but never own file edits
const SUBAGENT_PREFIX: &str = "agent-";

/// Tool names whose `input.file_path` is a file the session wrote
const WRITE_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit"];

/// Reads Claude Code transcripts from `~/.claude/projects/{flattened repo}/`.
#[derive(Debug, Clone)]
pub struct ClaudeCodeReader {
    projects_dir: PathBuf,
}

impl ClaudeCodeReader {
    pub fn new(projects_dir: PathBuf) -> Self {
        Self { projects_dir }
    }

    pub fn session_dir(&self, repo_root: &Path) -> PathBuf {
        self.projects_dir.join(flatten_repo_path(repo_root))
    }
}

impl SessionReader for ClaudeCodeReader {
    fn tool(&self) -> Tool {
        Tool::ClaudeCode
    }

    fn read(&self, ctx: &ReadContext<'_>) -> Result<Option<SessionInfo>, ReadError> {
        let dir = self.session_dir(ctx.repo_root);
        let Some(path) = find_latest_session(&dir, ctx)? else {
            return Ok(None);
        };
        let file = File::open(&path).map_err(|e| ReadError::io(&path, e))?;
        parse_transcript(BufReader::new(file), ctx).map_err(|e| ReadError::io(&path, e))
    }
}

/// Project directory token: the repo path with every separator replaced by `-`.
/// `/Users/dev/projects/tempo` becomes `-Users-dev-projects-tempo`.
pub fn flatten_repo_path(repo_root: &Path) -> String {
    repo_root
        .display()
        .to_string()
        .replace(std::path::MAIN_SEPARATOR, "-")
}

/// Most recently modified `*.jsonl` in `dir` that is not a sub-agent
/// transcript and is not older than the cutoff. A missing directory is `None`.
pub fn find_latest_session(dir: &Path, ctx: &ReadContext<'_>) -> Result<Option<PathBuf>, ReadError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ReadError::io(dir, e)),
    };

    let mut candidates: Vec<(PathBuf, std::time::SystemTime)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if !name.ends_with(".jsonl") || name.starts_with(SUBAGENT_PREFIX) {
                return None;
            }
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().ok()?;
            ctx.is_recent(modified).then(|| (entry.path(), modified))
        })
        .collect();

    // Name order first so equal mtimes resolve the same way every run
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    let mut best: Option<(PathBuf, std::time::SystemTime)> = None;
    for (path, modified) in candidates {
        if best.as_ref().map_or(true, |(_, t)| modified > *t) {
            best = Some((path, modified));
        }
    }
    Ok(best.map(|(p, _)| p))
}

#[derive(Deserialize)]
struct TranscriptLine {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<AssistantMessage>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<ToolInput>,
}

#[derive(Deserialize)]
struct ToolInput {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

impl Usage {
    fn total(&self) -> u64 {
        [
            self.input_tokens,
            self.output_tokens,
            self.cache_creation_input_tokens,
            self.cache_read_input_tokens,
        ]
        .into_iter()
        .flatten()
        .fold(0u64, u64::saturating_add)
    }
}

/// Extract written files, model, tokens and duration from a transcript.
///
/// # Functional Core
/// Streams the transcript one line at a time, so memory stays bounded by
/// the longest line. Lines that are not valid UTF-8, not JSON, or not
/// assistant turns are skipped. Token totals are session-wide, so a long
/// session spanning many commits reports all of them.
///
/// Returns `Ok(None)` when no file under the repo root was written; errors
/// only on a failed read.
pub fn parse_transcript<R: BufRead>(
    mut reader: R,
    ctx: &ReadContext<'_>,
) -> io::Result<Option<SessionInfo>> {
    let mut info = SessionInfo::new(Tool::ClaudeCode);
    let mut tokens: u64 = 0;
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    let mut buf = Vec::new();
    let mut line_num = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_num += 1;
        let Ok(line) = std::str::from_utf8(&buf) else {
            continue;
        };
        // Cheap pre-filter before a full parse
        if !line.contains("\"assistant\"") {
            continue;
        }
        let entry: TranscriptLine = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(e) => {
                trace!(line = line_num, error = %e, "skipping unparsable transcript line");
                continue;
            }
        };
        if entry.kind.as_deref() != Some("assistant") {
            continue;
        }

        if let Some(ts) = entry
            .timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
        {
            first = Some(first.map_or(ts, |f| f.min(ts)));
            last = Some(last.map_or(ts, |l| l.max(ts)));
        }

        let Some(message) = entry.message else {
            continue;
        };
        if let Some(model) = message.model {
            info.set_model(model);
        }
        if let Some(usage) = &message.usage {
            tokens = tokens.saturating_add(usage.total());
        }

        for block in message.content.into_iter().flatten() {
            if block.kind.as_deref() != Some("tool_use") {
                continue;
            }
            if !block.name.as_deref().is_some_and(|n| WRITE_TOOLS.contains(&n)) {
                continue;
            }
            let Some(path) = block.input.and_then(|i| i.file_path) else {
                continue;
            };
            if let Some(rel) = ctx.relativize(&path) {
                info.add_file(rel);
            }
        }
    }

    if info.is_empty() {
        return Ok(None);
    }

    let duration = match (first, last) {
        (Some(f), Some(l)) => (l - f).num_seconds().max(0) as u64,
        _ => 0,
    };
    Ok(Some(info.with_tokens(tokens).with_duration_secs(duration)))
}
