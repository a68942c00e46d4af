use chrono::Duration;

/// Environment variable overriding the maximum session age, in whole hours.
pub const MAX_AGE_ENV: &str = "TEMPO_SESSION_MAX_AGE";

pub const DEFAULT_MAX_AGE_HOURS: u32 = 72;

/// Tunables for one detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectConfig {
    /// Session artifacts last modified before `now - max_session_age` are ignored
    pub max_session_age: Duration,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            max_session_age: Duration::hours(i64::from(DEFAULT_MAX_AGE_HOURS)),
        }
    }
}

impl DetectConfig {
    /// Default config with `TEMPO_SESSION_MAX_AGE` applied when it holds a
    /// positive integer. Any other value is ignored.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(MAX_AGE_ENV).ok().as_deref().and_then(parse_hours) {
            Some(hours) => config.with_max_age_hours(hours),
            None => config,
        }
    }

    pub fn with_max_age_hours(mut self, hours: u32) -> Self {
        self.max_session_age = Duration::hours(i64::from(hours));
        self
    }
}

fn parse_hours(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|h| *h > 0)
}
