use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type TaskId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
        }
    }
}

/// Completion filter applied by the derived view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Done,
}

impl TaskFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => !task.completed,
            TaskFilter::Done => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Newest,
    Oldest,
    Completed,
    Pending,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("unknown value `{0}`")]
pub struct UnknownVariant(pub String);

impl FromStr for TaskFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for SortKey {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "completed" => Ok(Self::Completed),
            "pending" => Ok(Self::Pending),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task text must not be empty")]
    EmptyText,
}

/// Producer-side check for new task text. The store never re-validates.
pub fn validate_task_text(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(text.to_string())
}

pub const ENV_API_URL: &str = "TASK_TRACKER_API_URL";
pub const ENV_PAGE_SIZE: &str = "TASK_TRACKER_PAGE_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "TASK_TRACKER_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_enabled: default_cache_enabled(),
        }
    }
}

impl Settings {
    /// Applies environment-style overrides on top of file settings.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`; tests pass a map instead.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = non_empty(ENV_PAGE_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => self.page_size = size,
                _ => log::warn!("ignoring invalid override key={ENV_PAGE_SIZE} value={raw}"),
            }
        }
        if let Some(raw) = non_empty(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => log::warn!("ignoring invalid override key={ENV_TIMEOUT_SECS} value={raw}"),
            }
        }
        self
    }
}

fn default_api_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_page_size() -> usize {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TasksFile {
    pub schema_version: u32,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SettingsFile {
    pub schema_version: u32,
    pub settings: Settings,
}
