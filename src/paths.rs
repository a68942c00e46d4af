use std::path::{Path, PathBuf};

/// Resolved storage locations for every tool whose local state is read.
/// Pure data structure with no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Claude Code per-project transcript root
    /// Example: ~/.claude/projects/
    pub claude_projects: PathBuf,

    /// Cursor per-workspace storage directories (each holds `{hash}/workspace.json`)
    /// Example: ~/.config/Cursor/User/workspaceStorage/
    pub cursor_workspace_storage: Vec<PathBuf>,

    /// Cursor shared key-value store
    /// Example: ~/.config/Cursor/User/globalStorage/state.vscdb
    pub cursor_global_db: PathBuf,

    /// VS Code workspace storage, stable channel first, then Insiders
    /// Example: ~/.config/Code/User/workspaceStorage/
    pub vscode_workspace_storage: Vec<PathBuf>,
}

impl StoragePaths {
    /// Resolves all paths relative to the given home directory.
    ///
    /// Pure function: only performs path concatenation. Does NOT verify that
    /// any of the directories exist; readers treat missing paths as "no session".
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use tempo_detect::paths::StoragePaths;
    ///
    /// let paths = StoragePaths::resolve(Path::new("/home/dev"));
    /// assert_eq!(paths.claude_projects, Path::new("/home/dev/.claude/projects"));
    /// ```
    pub fn resolve(home: &Path) -> Self {
        let app_config = app_config_dir(home);
        let cursor_user = app_config.join("Cursor").join("User");

        Self {
            claude_projects: home.join(".claude").join("projects"),
            cursor_workspace_storage: vec![cursor_user.join("workspaceStorage")],
            cursor_global_db: cursor_user.join("globalStorage").join("state.vscdb"),
            vscode_workspace_storage: ["Code", "Code - Insiders"]
                .iter()
                .map(|channel| app_config.join(channel).join("User").join("workspaceStorage"))
                .collect(),
        }
    }

    /// Resolve against the current user's home directory.
    /// Returns `None` if the home directory cannot be determined.
    pub fn from_home() -> Option<Self> {
        dirs::home_dir().map(|home| Self::resolve(&home))
    }
}

/// Per-OS base directory for Electron editors' user data.
fn app_config_dir(home: &Path) -> PathBuf {
    if cfg!(target_os = "macos") {
        home.join("Library").join("Application Support")
    } else if cfg!(windows) {
        home.join("AppData").join("Roaming")
    } else {
        home.join(".config")
    }
}
