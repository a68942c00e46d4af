use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// `workspaceStorage/{hash}/workspace.json`
#[derive(Deserialize)]
struct WorkspaceDescriptor {
    #[serde(default)]
    folder: Option<String>,
}

/// Find the `workspaceStorage/{hash}` directory whose `workspace.json`
/// points at `repo_root`. Bases are searched in order; within a base,
/// directories are visited in name order.
pub fn find_workspace(bases: &[PathBuf], repo_root: &Path) -> Option<PathBuf> {
    for base in bases {
        let mut dirs: Vec<PathBuf> = match fs::read_dir(base) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
            Err(_) => continue,
        };
        dirs.sort();

        for dir in dirs {
            let descriptor = dir.join("workspace.json");
            let content = match fs::read_to_string(&descriptor) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let folder = match serde_json::from_str::<WorkspaceDescriptor>(&content) {
                Ok(WorkspaceDescriptor { folder: Some(f) }) => f,
                Ok(_) => continue,
                Err(e) => {
                    trace!(path = %descriptor.display(), error = %e, "unreadable workspace descriptor");
                    continue;
                }
            };
            if folder_uri_to_path(&folder) == repo_root {
                return Some(dir);
            }
        }
    }
    None
}

/// Decode a `file://` folder URI to a local path. Anything that is not a
/// `file://` URI is taken as a path verbatim.
pub fn folder_uri_to_path(uri: &str) -> PathBuf {
    let Some(rest) = uri.strip_prefix("file://") else {
        return PathBuf::from(uri);
    };
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(rest))
}
