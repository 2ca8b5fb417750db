use crate::feedback::Feedback;
use crate::models::Task;
use crate::view::{TaskView, ViewState};

pub const MSG_TASKS_REFRESHED: &str = "Tasks refreshed";
pub const MSG_TASK_ADDED: &str = "Task added";
pub const MSG_ADD_FAILED: &str = "Failed to add task";
pub const MSG_TASK_UPDATED: &str = "Task updated";
pub const MSG_UPDATE_FAILED: &str = "Failed to update task";
pub const MSG_TASK_DELETED: &str = "Task deleted";
pub const MSG_DELETE_FAILED: &str = "Failed to delete task";
pub const MSG_LOAD_FAILED: &str = "Failed to load tasks.";

/// Everything a presentation shell renders, published after every store change.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreSnapshot {
    pub tasks: Vec<Task>,
    pub view: TaskView,
    pub view_state: ViewState,
    pub feedback: Feedback,
    pub pending_mutations: usize,
}
