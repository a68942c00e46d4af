use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tempo_detect::readers::{CopilotReader, CursorReader, ReadContext, SessionReader};
use tempo_detect::store::{EmbeddedSqlite, Sqlite3Cli, StoreQuery};

// ============================================================================
// Fixtures
// ============================================================================

/// Epoch ms for 2025-01-15T10:00:00Z
const UPDATED_MS: i64 = 1_736_935_200_000;

struct Fixture {
    tmp: TempDir,
    repo: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("projects").join("myapp");
        fs::create_dir_all(&repo).unwrap();
        Self { tmp, repo }
    }

    fn storage(&self, channel: &str) -> PathBuf {
        self.tmp.path().join(channel).join("User").join("workspaceStorage")
    }

    /// Register a workspace for the fixture repo and return its directory.
    fn workspace(&self, channel: &str) -> PathBuf {
        let dir = self.storage(channel).join("abc123");
        fs::create_dir_all(&dir).unwrap();
        let folder = format!("file://{}", self.repo.display());
        fs::write(dir.join("workspace.json"), json!({ "folder": folder }).to_string()).unwrap();
        dir
    }

    fn global_db(&self) -> PathBuf {
        self.tmp.path().join("Cursor").join("User").join("globalStorage").join("state.vscdb")
    }

    fn ctx(&self) -> ReadContext<'_> {
        ReadContext::new(&self.repo, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }
}

fn item_table(path: &Path, index: &serde_json::Value) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);")
        .unwrap();
    conn.execute(
        "INSERT INTO ItemTable (key, value) VALUES ('composer.composerData', ?1)",
        [index.to_string()],
    )
    .unwrap();
}

fn disk_kv(path: &Path, rows: &[(String, serde_json::Value)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE cursorDiskKV (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);")
        .unwrap();
    for (key, value) in rows {
        conn.execute(
            "INSERT INTO cursorDiskKV (key, value) VALUES (?1, ?2)",
            [key.clone(), value.to_string()],
        )
        .unwrap();
    }
}

fn write_bubble(composer: &str, id: &str, tool: &str, path: &str, extra: serde_json::Value) -> (String, serde_json::Value) {
    let mut former = json!({
        "name": tool,
        "status": "completed",
        "params": json!({"relativeWorkspacePath": path}).to_string()
    });
    if let (Some(obj), Some(more)) = (former.as_object_mut(), extra.as_object()) {
        for (k, v) in more {
            obj.insert(k.clone(), v.clone());
        }
    }
    (
        format!("bubbleId:{composer}:{id}"),
        json!({
            "type": 2,
            "toolFormerData": former,
            "tokenCount": {"inputTokens": 1000, "outputTokens": 200}
        }),
    )
}

fn cursor_reader(fx: &Fixture, store: Box<dyn StoreQuery>) -> CursorReader {
    CursorReader::new(vec![fx.storage("Cursor")], fx.global_db(), store)
}

fn standard_cursor_fixture(fx: &Fixture) {
    let ws = fx.workspace("Cursor");
    item_table(
        &ws.join("state.vscdb"),
        &json!({"allComposers": [
            {"composerId": "c1", "createdAt": UPDATED_MS - 600_000, "lastUpdatedAt": UPDATED_MS},
            {"composerId": "stale", "createdAt": 1_000, "lastUpdatedAt": 2_000},
            {"composerId": "", "lastUpdatedAt": UPDATED_MS}
        ]}),
    );
    disk_kv(
        &fx.global_db(),
        &[
            write_bubble("c1", "b1", "edit_file", "src/main.ts", json!({"userDecision": "accepted"})),
            write_bubble("c1", "b2", "create_file", "src/new.ts", json!({})),
            write_bubble("c1", "b3", "edit_file", "src/rejected.ts", json!({"userDecision": "rejected"})),
            write_bubble("c1", "b4", "edit_file", "src/failed.ts", json!({"status": "error"})),
            write_bubble("stale", "b1", "edit_file", "src/stale.ts", json!({})),
            write_bubble("c10", "b1", "edit_file", "src/neighbor.ts", json!({})),
            (
                "composerData:c1".to_string(),
                json!({"usageData": {"claude-4-sonnet-thinking": {"amount": 3}}, "modelConfig": {"modelName": "default"}}),
            ),
        ],
    );
}

// ============================================================================
// Cursor
// ============================================================================

#[test]
fn cursor_reads_kept_writes_for_recent_composers() {
    let fx = Fixture::new();
    standard_cursor_fixture(&fx);

    let info = cursor_reader(&fx, Box::new(EmbeddedSqlite))
        .read(&fx.ctx())
        .unwrap()
        .unwrap();

    assert_eq!(
        info.files_written.iter().collect::<Vec<_>>(),
        vec!["src/main.ts", "src/new.ts"]
    );
    assert_eq!(info.total_tokens, Some(2400));
    assert_eq!(info.model.as_deref(), Some("claude-4-sonnet-thinking"));
    assert_eq!(info.session_duration_sec, Some(600));
}

#[test]
fn cursor_accepts_flat_index() {
    let fx = Fixture::new();
    let ws = fx.workspace("Cursor");
    item_table(
        &ws.join("state.vscdb"),
        &json!([{"composerId": "c1", "lastUpdatedAt": UPDATED_MS}]),
    );
    disk_kv(
        &fx.global_db(),
        &[write_bubble("c1", "b1", "write", "lib/x.py", json!({}))],
    );

    let info = cursor_reader(&fx, Box::new(EmbeddedSqlite))
        .read(&fx.ctx())
        .unwrap()
        .unwrap();
    assert!(info.files_written.contains("lib/x.py"));
    assert_eq!(info.model, None);
    assert_eq!(info.session_duration_sec, None);
}

#[test]
fn cursor_without_marker_table_is_absent() {
    let fx = Fixture::new();
    let ws = fx.workspace("Cursor");
    item_table(
        &ws.join("state.vscdb"),
        &json!({"allComposers": [{"composerId": "c1", "lastUpdatedAt": UPDATED_MS}]}),
    );
    fs::create_dir_all(fx.global_db().parent().unwrap()).unwrap();
    Connection::open(fx.global_db())
        .unwrap()
        .execute_batch("CREATE TABLE ItemTable (key TEXT, value BLOB);")
        .unwrap();

    assert!(cursor_reader(&fx, Box::new(EmbeddedSqlite))
        .read(&fx.ctx())
        .unwrap()
        .is_none());
}

#[test]
fn cursor_without_workspace_is_absent() {
    let fx = Fixture::new();
    assert!(cursor_reader(&fx, Box::new(EmbeddedSqlite))
        .read(&fx.ctx())
        .unwrap()
        .is_none());
}

#[test]
fn cursor_unavailable_capability_is_absent() {
    let fx = Fixture::new();
    standard_cursor_fixture(&fx);
    assert!(cursor_reader(&fx, Box::new(Sqlite3Cli::default()))
        .read(&fx.ctx())
        .unwrap()
        .is_none());
}

#[test]
fn cursor_cli_backend_matches_embedded() {
    let cli = Sqlite3Cli::locate();
    if !cli.is_available() {
        return;
    }
    let fx = Fixture::new();
    standard_cursor_fixture(&fx);

    let embedded = cursor_reader(&fx, Box::new(EmbeddedSqlite)).read(&fx.ctx()).unwrap();
    let via_cli = cursor_reader(&fx, Box::new(cli)).read(&fx.ctx()).unwrap();
    assert_eq!(embedded, via_cli);
}

// ============================================================================
// Copilot
// ============================================================================

fn chat_session(repo: &Path, ts: i64, family: Option<&str>, files: &[&str]) -> String {
    let response: Vec<serde_json::Value> = files
        .iter()
        .map(|f| json!({"kind": "textEditGroup", "uri": {"path": repo.join(f)}, "edits": []}))
        .collect();
    let mut session = json!({
        "requests": [
            {"timestamp": ts, "response": []},
            {"timestamp": ts + 90_000, "response": response}
        ]
    });
    if let Some(f) = family {
        session["selectedModel"] = json!({"metadata": {"family": f}});
    }
    session.to_string()
}

#[test]
fn copilot_merges_sessions_and_skips_malformed() {
    let fx = Fixture::new();
    let chats = fx.workspace("Code").join("chatSessions");
    fs::create_dir_all(&chats).unwrap();
    fs::write(chats.join("a.json"), chat_session(&fx.repo, UPDATED_MS, Some("gpt-4o"), &["src/a.ts"])).unwrap();
    fs::write(chats.join("b.json"), "{\"requests\": [").unwrap();
    fs::write(chats.join("c.json"), chat_session(&fx.repo, UPDATED_MS, Some("claude-sonnet-4"), &["src/c.ts"])).unwrap();
    fs::write(chats.join("notes.txt"), "ignored").unwrap();

    let reader = CopilotReader::new(vec![fx.storage("Code"), fx.storage("Code - Insiders")]);
    let info = reader.read(&fx.ctx()).unwrap().unwrap();

    assert_eq!(
        info.files_written.iter().collect::<Vec<_>>(),
        vec!["src/a.ts", "src/c.ts"]
    );
    assert_eq!(info.model.as_deref(), Some("claude-sonnet-4"));
    assert_eq!(info.session_duration_sec, Some(90));
}

#[test]
fn copilot_finds_insiders_workspace() {
    let fx = Fixture::new();
    let chats = fx.workspace("Code - Insiders").join("chatSessions");
    fs::create_dir_all(&chats).unwrap();
    fs::write(chats.join("s.json"), chat_session(&fx.repo, UPDATED_MS, None, &["main.go"])).unwrap();

    let reader = CopilotReader::new(vec![fx.storage("Code"), fx.storage("Code - Insiders")]);
    let info = reader.read(&fx.ctx()).unwrap().unwrap();
    assert!(info.files_written.contains("main.go"));
}

#[test]
fn copilot_without_edits_is_absent() {
    let fx = Fixture::new();
    let chats = fx.workspace("Code").join("chatSessions");
    fs::create_dir_all(&chats).unwrap();
    fs::write(chats.join("ask.json"), chat_session(&fx.repo, UPDATED_MS, Some("gpt-4o"), &[])).unwrap();

    let reader = CopilotReader::new(vec![fx.storage("Code")]);
    assert!(reader.read(&fx.ctx()).unwrap().is_none());
}
