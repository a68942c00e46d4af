use super::{find_workspace, ReadContext, SessionReader};
use crate::error::ReadError;
use crate::model::{SessionInfo, Tool};
use crate::store::{sql_literal, text_column, StoreQuery};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const WORKSPACE_DB: &str = "state.vscdb";

const INDEX_QUERY: &str = "SELECT value FROM ItemTable WHERE key = 'composer.composerData'";

const MARKER_QUERY: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'cursorDiskKV'";

/// Tool-call names that write or edit a file
const WRITE_TOOLS: &[&str] = &["edit_file", "search_replace", "create_file", "write_file", "write"];

/// Reads Cursor agent sessions from the per-workspace session index and the
/// shared global key-value store.
pub struct CursorReader {
    workspace_storage: Vec<PathBuf>,
    global_db: PathBuf,
    store: Box<dyn StoreQuery>,
}

impl CursorReader {
    pub fn new(workspace_storage: Vec<PathBuf>, global_db: PathBuf, store: Box<dyn StoreQuery>) -> Self {
        Self {
            workspace_storage,
            global_db,
            store,
        }
    }

    /// Recent composer heads from the workspace store, in index order.
    fn recent_composers(&self, workspace_db: &Path, ctx: &ReadContext<'_>) -> Result<Vec<ComposerHead>, ReadError> {
        let rows = self.store.query(workspace_db, INDEX_QUERY)?;
        let Some(raw) = rows.first().and_then(|row| text_column(row, "value")) else {
            return Ok(Vec::new());
        };
        let index: ComposerIndex =
            serde_json::from_str(&raw).map_err(|e| ReadError::json(workspace_db, e))?;

        Ok(index
            .into_heads()
            .into_iter()
            .filter(|head| head.composer_id.as_deref().is_some_and(|id| !id.is_empty()))
            .filter(|head| ctx.is_recent_millis(head.last_updated_at.unwrap_or(0)))
            .collect())
    }

    fn has_marker_table(&self) -> bool {
        match self.store.query(&self.global_db, MARKER_QUERY) {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                debug!(error = %e, "global store unusable");
                false
            }
        }
    }

    /// Kept write rows for one composer. A failed query yields nothing.
    fn composer_writes(&self, composer_id: &str, tally: &mut WriteTally) {
        let statement = bubble_query(composer_id);
        let rows = match self.store.query(&self.global_db, &statement) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(composer = composer_id, error = %e, "bubble query failed");
                return;
            }
        };
        for row in &rows {
            if let Some(raw) = text_column(row, "value") {
                tally.record(&raw);
            }
        }
    }

    fn composer_model(&self, composer_id: &str) -> Option<String> {
        let statement = format!(
            "SELECT value FROM cursorDiskKV WHERE key = {}",
            sql_literal(&format!("composerData:{composer_id}"))
        );
        let rows = self.store.query(&self.global_db, &statement).ok()?;
        let raw = rows.first().and_then(|row| text_column(row, "value"))?;
        composer_model(&raw)
    }
}

impl SessionReader for CursorReader {
    fn tool(&self) -> Tool {
        Tool::Cursor
    }

    fn read(&self, ctx: &ReadContext<'_>) -> Result<Option<SessionInfo>, ReadError> {
        if !self.store.is_available() {
            return Ok(None);
        }
        let Some(workspace) = find_workspace(&self.workspace_storage, ctx.repo_root) else {
            return Ok(None);
        };
        let workspace_db = workspace.join(WORKSPACE_DB);
        if !workspace_db.is_file() {
            return Ok(None);
        }

        let composers = self.recent_composers(&workspace_db, ctx)?;
        if composers.is_empty() {
            return Ok(None);
        }
        if !self.global_db.is_file() || !self.has_marker_table() {
            return Ok(None);
        }

        let mut tally = WriteTally::default();
        for head in &composers {
            if let Some(id) = head.composer_id.as_deref() {
                self.composer_writes(id, &mut tally);
            }
        }
        if tally.files.is_empty() {
            return Ok(None);
        }

        let mut info = SessionInfo::new(Tool::Cursor)
            .with_files(tally.files)
            .with_tokens(tally.tokens)
            .with_duration_secs(session_span_secs(&composers));
        if let Some(model) = latest_composer(&composers).and_then(|id| self.composer_model(id)) {
            info.set_model(model);
        }
        Ok(Some(info))
    }
}

/// Half-open key range over `bubbleId:<id>:*` plus a substring pre-filter on
/// write-tool names. `;` sorts immediately after `:`.
fn bubble_query(composer_id: &str) -> String {
    let lower = sql_literal(&format!("bubbleId:{composer_id}:"));
    let upper = sql_literal(&format!("bubbleId:{composer_id};"));
    let filters: Vec<String> = WRITE_TOOLS
        .iter()
        .map(|name| format!("value LIKE '%\"{name}\"%'"))
        .collect();
    format!(
        "SELECT value FROM cursorDiskKV WHERE key >= {lower} AND key < {upper} AND ({}) ORDER BY key",
        filters.join(" OR ")
    )
}

/// Session index, either `{"allComposers": [...]}` or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ComposerIndex {
    Wrapped {
        #[serde(default, rename = "allComposers")]
        all_composers: Vec<ComposerHead>,
    },
    Flat(Vec<ComposerHead>),
}

impl ComposerIndex {
    fn into_heads(self) -> Vec<ComposerHead> {
        match self {
            ComposerIndex::Wrapped { all_composers } => all_composers,
            ComposerIndex::Flat(heads) => heads,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposerHead {
    #[serde(default)]
    composer_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    created_at: Option<i64>,
    /// Epoch milliseconds
    #[serde(default)]
    last_updated_at: Option<i64>,
}

fn latest_composer(composers: &[ComposerHead]) -> Option<&str> {
    let mut latest: Option<&ComposerHead> = None;
    for head in composers {
        let ts = head.last_updated_at.unwrap_or(0);
        if latest.map_or(true, |l| ts > l.last_updated_at.unwrap_or(0)) {
            latest = Some(head);
        }
    }
    latest.and_then(|h| h.composer_id.as_deref())
}

/// Latest update minus earliest creation, in seconds. Zero unless both
/// bounds are known and ordered.
fn session_span_secs(composers: &[ComposerHead]) -> u64 {
    let earliest = composers.iter().filter_map(|c| c.created_at).min().unwrap_or(0);
    let latest = composers.iter().filter_map(|c| c.last_updated_at).max().unwrap_or(0);
    if earliest > 0 && latest > earliest {
        ((latest - earliest) / 1000) as u64
    } else {
        0
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bubble {
    #[serde(default)]
    tool_former_data: Option<ToolFormer>,
    #[serde(default)]
    token_count: Option<TokenCount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolFormer {
    #[serde(default)]
    name: Option<String>,
    /// JSON-encoded string in current builds, an object in some older ones
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    raw_args: Option<Value>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    user_decision: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenCount {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

impl ToolFormer {
    fn is_kept_write(&self) -> bool {
        self.name.as_deref().is_some_and(|n| WRITE_TOOLS.contains(&n))
            && self.status.as_deref() == Some("completed")
            && self.user_decision.as_deref() != Some("rejected")
    }

    fn file_path(&self) -> Option<String> {
        let from_params = self
            .params
            .as_ref()
            .and_then(embedded_object)
            .and_then(|p| non_empty_str(&p, "relativeWorkspacePath"));
        if from_params.is_some() {
            return from_params;
        }
        let raw = self.raw_args.as_ref().and_then(embedded_object)?;
        non_empty_str(&raw, "target_file").or_else(|| non_empty_str(&raw, "file_path"))
    }
}

/// `value` as a JSON object, decoding it first when it is a string.
fn embedded_object(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str::<Value>(s).ok().filter(Value::is_object),
        Value::Object(_) => Some(value.clone()),
        _ => None,
    }
}

fn non_empty_str(object: &Value, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Files and tokens accumulated over kept write rows.
#[derive(Debug, Default)]
struct WriteTally {
    files: Vec<String>,
    tokens: u64,
}

impl WriteTally {
    fn record(&mut self, raw: &str) {
        let bubble: Bubble = match serde_json::from_str(raw) {
            Ok(b) => b,
            Err(_) => return,
        };
        let Some(tool) = bubble.tool_former_data.filter(ToolFormer::is_kept_write) else {
            return;
        };
        if let Some(tokens) = bubble.token_count {
            self.tokens = self
                .tokens
                .saturating_add(tokens.input_tokens.unwrap_or(0))
                .saturating_add(tokens.output_tokens.unwrap_or(0));
        }
        if let Some(path) = tool.file_path() {
            self.files.push(path);
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComposerData {
    #[serde(default)]
    usage_data: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    model_config: Option<ModelConfig>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelConfig {
    #[serde(default)]
    model_name: Option<String>,
}

/// First non-empty `usageData` key, else `modelConfig.modelName` unless it
/// is the `default` placeholder.
fn composer_model(raw: &str) -> Option<String> {
    let data: ComposerData = serde_json::from_str(raw).ok()?;
    if let Some(model) = data
        .usage_data
        .as_ref()
        .and_then(|usage| usage.keys().find(|k| !k.is_empty()))
    {
        return Some(model.clone());
    }
    data.model_config
        .and_then(|c| c.model_name)
        .filter(|name| !name.is_empty() && name != "default")
}
