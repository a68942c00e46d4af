//! Confidence fusion: one deduplicated [`Attribution`] per commit.
//!
//! # Imperative Shell
//! `Detector` owns the capabilities (git, readers, process probe) and runs
//! the passes strictly in order. A tool claimed by an earlier pass is never
//! reported again by a later one.

use crate::config::DetectConfig;
use crate::error::DetectError;
use crate::git::{CommitContext, GitCli, GitQuery};
use crate::model::{Attribution, Detection, Tool};
use crate::paths::StoragePaths;
use crate::process::{running_tools, Pgrep, ProcessProbe};
use crate::readers::{default_readers, AiderReader, ReadContext, SessionReader};
use crate::store::StoreBackend;
use crate::trailer::detect_trailers;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info};

pub struct Detector {
    git: Box<dyn GitQuery>,
    readers: Vec<Box<dyn SessionReader>>,
    processes: Box<dyn ProcessProbe>,
    config: DetectConfig,
}

impl Detector {
    pub fn new(
        git: Box<dyn GitQuery>,
        readers: Vec<Box<dyn SessionReader>>,
        processes: Box<dyn ProcessProbe>,
        config: DetectConfig,
    ) -> Self {
        Self {
            git,
            readers,
            processes,
            config,
        }
    }

    /// Real git, `pgrep`, and the standard readers rooted at the user's home.
    /// Without a home directory only the in-repo Aider reader is registered.
    pub fn from_environment(backend: StoreBackend, config: DetectConfig) -> Self {
        let readers = match StoragePaths::from_home() {
            Some(paths) => default_readers(&paths, backend.into_query()),
            None => {
                debug!("no home directory, per-user session stores skipped");
                vec![Box::new(AiderReader) as Box<dyn SessionReader>]
            }
        };
        Self::new(Box::new(GitCli), readers, Box::new(Pgrep), config)
    }

    /// Attribute HEAD of `repo_root`. `Ok(None)` when nothing was detected.
    pub fn detect(&self, repo_root: &Path) -> Result<Option<Attribution>, DetectError> {
        self.detect_at(repo_root, Utc::now())
    }

    /// [`detect`](Self::detect) with an explicit clock.
    pub fn detect_at(
        &self,
        repo_root: &Path,
        now: DateTime<Utc>,
    ) -> Result<Option<Attribution>, DetectError> {
        let commit = CommitContext::resolve(self.git.as_ref(), repo_root)?;
        if commit.files.is_empty() {
            debug!("commit touches no files");
            return Ok(None);
        }

        let committed: BTreeSet<&str> = commit.files.iter().map(String::as_str).collect();
        let files_committed = commit.files.len();
        // An age reaching past the representable range keeps every session
        let cutoff = now
            .checked_sub_signed(self.config.max_session_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let ctx = ReadContext::new(repo_root, cutoff);

        let mut claimed: HashSet<Tool> = HashSet::new();
        let mut detections = Vec::new();

        for reader in &self.readers {
            let session = match reader.read(&ctx) {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(e) => {
                    debug!(tool = %reader.tool(), error = %e, "session reader failed");
                    continue;
                }
            };
            let matched = intersect(&session.files_written, &committed);
            if matched.is_empty() || !claimed.insert(session.tool) {
                continue;
            }
            debug!(tool = %session.tool, matched = matched.len(), "file match");
            detections.push(Detection::file_match(&session, matched, files_committed));
        }

        for tool in running_tools(self.processes.as_ref()) {
            if claimed.insert(tool) {
                debug!(%tool, "running process");
                detections.push(Detection::process(tool, files_committed));
            }
        }

        for detection in detect_trailers(&commit.message, files_committed) {
            if claimed.insert(detection.tool) {
                debug!(tool = %detection.tool, "co-author trailer");
                detections.push(detection);
            }
        }

        if detections.is_empty() {
            return Ok(None);
        }

        info!(
            sha = %commit.sha,
            files_committed,
            detections = detections.len(),
            tools = ?detections.iter().map(|d| d.tool.as_str()).collect::<Vec<_>>(),
            "commit attributed"
        );
        Ok(Some(
            Attribution::new(commit.sha, commit.author, commit.repo, now.trunc_subsecs(0))
                .with_detections(detections),
        ))
    }
}

/// Written files that are also committed, sorted and deduplicated.
pub fn intersect(written: &BTreeSet<String>, committed: &BTreeSet<&str>) -> Vec<String> {
    written
        .iter()
        .filter(|f| committed.contains(f.as_str()))
        .cloned()
        .collect()
}

/// Attribute HEAD of `repo_root` with environment configuration and the
/// embedded store backend.
pub fn detect(repo_root: &Path) -> Result<Option<Attribution>, DetectError> {
    Detector::from_environment(StoreBackend::default(), DetectConfig::from_env()).detect(repo_root)
}
