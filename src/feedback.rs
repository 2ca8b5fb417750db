use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Info,
    Error,
}

/// Single-slot notification. A new one replaces the previous; dismissal only clears `open`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Notification {
    pub open: bool,
    pub message: String,
    pub severity: Severity,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            open: false,
            message: String::new(),
            severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Feedback {
    pub initial_loading: bool,
    pub retrying: bool,
    pub error: Option<String>,
    pub notification: Notification,
}

impl Feedback {
    pub fn notify(&mut self, message: &str, severity: Severity) {
        self.notification = Notification {
            open: true,
            message: message.to_string(),
            severity,
        };
    }

    pub fn dismiss(&mut self) {
        self.notification.open = false;
    }

    /// The error slot is cleared when the next attempt starts, never on failure.
    pub fn begin_load(&mut self, is_retry: bool) {
        if is_retry {
            self.retrying = true;
        } else {
            self.initial_loading = true;
        }
        self.error = None;
    }

    pub fn end_load(&mut self, is_retry: bool) {
        if is_retry {
            self.retrying = false;
        } else {
            self.initial_loading = false;
        }
    }

    pub fn fail(&mut self, message: String) {
        self.error = Some(message);
    }

    /// Active notification, if any.
    pub fn active_notification(&self) -> Option<&Notification> {
        self.notification.open.then_some(&self.notification)
    }
}
