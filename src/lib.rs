//! Client-side task tracking: a task store that mirrors a remote task collection with optimistic
//! updates, rollback on failure and derived filter/search/sort/page views.
pub mod api;
pub mod events;
pub mod feedback;
#[cfg(feature = "app")]
pub mod http;
pub mod logging;
pub mod models;
pub mod storage;
pub mod store;
pub mod undo;
pub mod view;

pub use api::{TaskApi, TransportError};
pub use events::StoreSnapshot;
pub use feedback::{Feedback, Notification, Severity};
#[cfg(feature = "app")]
pub use http::HttpTaskApi;
pub use models::{Settings, SortKey, Task, TaskFilter, TaskId, ValidationError};
pub use storage::{Storage, StorageError, TaskCache};
pub use store::TaskStore;
pub use view::{TaskView, ViewState};
