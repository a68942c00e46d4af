use super::Tool;
use std::collections::BTreeSet;

/// What one session reader learned about recent activity of its tool.
///
/// Built fresh per read and consumed by the detection pipeline. Zero token
/// counts, zero durations, and empty model names are stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub tool: Tool,
    /// Repo-relative paths, `/`-separated
    pub files_written: BTreeSet<String>,
    pub model: Option<String>,
    pub total_tokens: Option<u64>,
    pub session_duration_sec: Option<u64>,
}

impl SessionInfo {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            files_written: BTreeSet::new(),
            model: None,
            total_tokens: None,
            session_duration_sec: None,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files_written.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.set_model(model);
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.total_tokens = (tokens > 0).then_some(tokens);
        self
    }

    pub fn with_duration_secs(mut self, secs: u64) -> Self {
        self.session_duration_sec = (secs > 0).then_some(secs);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>) {
        self.files_written.insert(path.into());
    }

    /// Replace the model unless `model` is empty.
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if !model.is_empty() {
            self.model = Some(model);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files_written.is_empty()
    }
}
