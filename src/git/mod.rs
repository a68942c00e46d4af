mod context;

pub use context::{committed_files, parse_remote_url, CommitContext, EMPTY_TREE_SHA};

use crate::error::GitError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Narrow version-control query capability: run a read-only git command in
/// `repo_root` and return its stdout.
pub trait GitQuery {
    fn run(&self, repo_root: &Path, args: &[&str]) -> Result<String, GitError>;
}

/// `GitQuery` backed by the `git` executable on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitQuery for GitCli {
    fn run(&self, repo_root: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo_root)
            .output()
            .map_err(|source| GitError::Spawn {
                args: args.join(" "),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Top-level directory of the repository containing `dir`.
pub fn repo_root(git: &dyn GitQuery, dir: &Path) -> Result<PathBuf, GitError> {
    let out = git.run(dir, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(out.trim()))
}
