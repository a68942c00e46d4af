use super::serde_utils::rfc3339_seconds;
use super::{Confidence, Method, SessionInfo, Tool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tool's evidence for one commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Detection {
    pub tool: Tool,
    pub confidence: Confidence,
    pub method: Method,
    /// Sorted ascending, no duplicates
    #[serde(default)]
    pub files_matched: Vec<String>,
    pub files_committed: usize,
    pub ai_files: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_sec: Option<u64>,
}

impl Detection {
    /// High-confidence detection from a session whose written files overlap
    /// the commit. `matched` must already be sorted and deduplicated.
    pub fn file_match(session: &SessionInfo, matched: Vec<String>, files_committed: usize) -> Self {
        Self {
            tool: session.tool,
            confidence: Confidence::High,
            method: Method::FileMatch,
            ai_files: matched.len(),
            files_matched: matched,
            files_committed,
            model: session.model.clone(),
            token_usage: session.total_tokens,
            session_duration_sec: session.session_duration_sec,
        }
    }

    pub fn process(tool: Tool, files_committed: usize) -> Self {
        Self::medium(tool, Method::Process, files_committed)
    }

    pub fn trailer(tool: Tool, files_committed: usize) -> Self {
        Self::medium(tool, Method::Trailer, files_committed)
    }

    fn medium(tool: Tool, method: Method, files_committed: usize) -> Self {
        Self {
            tool,
            confidence: Confidence::Medium,
            method,
            files_matched: Vec::new(),
            files_committed,
            ai_files: 0,
            model: None,
            token_usage: None,
            session_duration_sec: None,
        }
    }
}

/// The full attribution record for a single commit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribution {
    pub commit_sha: String,
    pub commit_author: String,
    pub repo: String,
    #[serde(with = "rfc3339_seconds")]
    pub timestamp: DateTime<Utc>,
    pub detections: Vec<Detection>,
}

impl Attribution {
    pub fn new(
        commit_sha: impl Into<String>,
        commit_author: impl Into<String>,
        repo: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            commit_sha: commit_sha.into(),
            commit_author: commit_author.into(),
            repo: repo.into(),
            timestamp,
            detections: Vec::new(),
        }
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    pub fn detection_for(&self, tool: Tool) -> Option<&Detection> {
        self.detections.iter().find(|d| d.tool == tool)
    }
}
