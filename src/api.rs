use std::future::Future;

use crate::models::{Task, TaskId};

/// Failure of a remote task API call. The store treats every variant the same way: the
/// `Display` text lands in the error slot and the optimistic change is rolled back.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error (http {status}): {message}")]
    Server { status: u16, message: String },
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("{0}")]
    Transport(String),
}

/// Remote collection of tasks.
pub trait TaskApi: Send + Sync + 'static {
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Task>, TransportError>> + Send;

    /// Returns the stored task including its server-assigned id.
    fn create(&self, text: &str) -> impl Future<Output = Result<Task, TransportError>> + Send;

    fn set_completed(
        &self,
        id: TaskId,
        completed: bool,
    ) -> impl Future<Output = Result<Task, TransportError>> + Send;

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), TransportError>> + Send;
}
