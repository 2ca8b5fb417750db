use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{TaskApi, TransportError};
use crate::events::{
    StoreSnapshot, MSG_ADD_FAILED, MSG_DELETE_FAILED, MSG_LOAD_FAILED, MSG_TASKS_REFRESHED,
    MSG_TASK_ADDED, MSG_TASK_DELETED, MSG_TASK_UPDATED, MSG_UPDATE_FAILED,
};
use crate::feedback::{Feedback, Severity};
use crate::models::{SortKey, Task, TaskFilter, TaskId};
use crate::storage::TaskCache;
use crate::undo::{Inverse, Ticket, UndoLog};
use crate::view::{self, TaskView, ViewState};

/// Client-side task state: the collection, view state and feedback slot.
///
/// Mutations apply their optimistic change synchronously, then await the remote call and either
/// keep the change or roll it back. The lock is never held across an `.await`, so two handlers
/// never observe each other's half-applied state.
pub struct TaskStore<A: TaskApi> {
    api: Arc<A>,
    inner: Arc<Mutex<StoreData>>,
    cache: Option<Arc<dyn TaskCache>>,
    updates: Arc<watch::Sender<StoreSnapshot>>,
}

impl<A: TaskApi> Clone for TaskStore<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            inner: Arc::clone(&self.inner),
            cache: self.cache.clone(),
            updates: Arc::clone(&self.updates),
        }
    }
}

#[derive(Debug, Default)]
struct StoreData {
    tasks: Vec<Task>,
    view: ViewState,
    feedback: Feedback,
    undo: UndoLog,
    /// Bumped on every change to `tasks`.
    revision: u64,
}

impl StoreData {
    fn touch(&mut self) {
        self.revision += 1;
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.touch();
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            tasks: self.tasks.clone(),
            view: view::derive_view(&self.tasks, &self.view),
            view_state: self.view.clone(),
            feedback: self.feedback.clone(),
            pending_mutations: self.undo.len(),
        }
    }

    /// First id at or above `seed` that no task in the collection uses.
    fn next_placeholder_id(&self, seed: TaskId) -> TaskId {
        let mut id = seed.max(1);
        while self.tasks.iter().any(|task| task.id == id) {
            id += 1;
        }
        id
    }

    fn confirm_created(&mut self, placeholder: TaskId, task: Task) {
        let Some(index) = self.tasks.iter().position(|t| t.id == placeholder) else {
            // A reload replaced the collection while the create was in flight.
            log::debug!("placeholder gone before confirmation placeholder_id={placeholder}");
            return;
        };
        if task.id != placeholder {
            if let Some(owner) = self.undo.placeholder_owner(task.id) {
                // Another in-flight add holds the server id as its placeholder; move it aside.
                let fresh = self.next_placeholder_id(Utc::now().timestamp_millis());
                if let Some(other) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    other.id = fresh;
                }
                self.undo.rekey_placeholder(owner, fresh);
                log::warn!(
                    "server id collided with a pending placeholder id={} new_placeholder_id={fresh}",
                    task.id
                );
            } else if self.tasks.iter().any(|t| t.id == task.id) {
                log::warn!(
                    "confirmed task already present placeholder_id={placeholder} id={}",
                    task.id
                );
                self.tasks.remove(index);
                self.touch();
                return;
            }
        }
        self.tasks[index] = task;
        self.touch();
    }

    /// Undoes one optimistic change. Returns whether the ticket was still outstanding.
    fn discard(&mut self, ticket: Ticket) -> bool {
        let Some(entry) = self.undo.take(ticket) else {
            return false;
        };
        let revision = self.revision;
        let full = entry.rollback(&mut self.tasks, revision);
        self.touch();
        log::debug!("rolled back ticket={ticket} full_snapshot={full}");
        true
    }

    fn roll_back(&mut self, ticket: Ticket, err: &TransportError, failure_message: &str) {
        self.discard(ticket);
        self.feedback.fail(error_message(err, failure_message));
        self.feedback.notify(failure_message, Severity::Error);
    }
}

/// Work a handler still owes the store while its remote call is in flight.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Load { is_retry: bool },
    Mutation(Ticket),
}

/// Settles a handler's pending work if its future is dropped before the remote call returns.
///
/// A dropped load clears its loading flag and applies nothing. A dropped mutation is rolled back
/// since its remote outcome is unknown; the next load reconciles.
struct InFlight<'a, A: TaskApi> {
    store: &'a TaskStore<A>,
    pending: Option<Pending>,
}

impl<'a, A: TaskApi> InFlight<'a, A> {
    fn new(store: &'a TaskStore<A>, pending: Pending) -> Self {
        Self {
            store,
            pending: Some(pending),
        }
    }

    /// The handler is about to apply the remote result itself.
    fn complete(mut self) {
        self.pending = None;
    }
}

impl<A: TaskApi> Drop for InFlight<'_, A> {
    fn drop(&mut self) {
        match self.pending.take() {
            None => {}
            Some(Pending::Load { is_retry }) => {
                log::info!("load abandoned before completion retry={is_retry}");
                self.store.update(|data| data.feedback.end_load(is_retry));
            }
            Some(Pending::Mutation(ticket)) => {
                log::info!("mutation abandoned before completion ticket={ticket}");
                self.store.update(|data| data.discard(ticket));
                self.store.settle();
            }
        }
    }
}

fn error_message(err: &TransportError, fallback: &str) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

impl<A: TaskApi> TaskStore<A> {
    pub fn new(api: Arc<A>) -> Self {
        let data = StoreData::default();
        let (updates, _) = watch::channel(data.snapshot());
        Self {
            api,
            inner: Arc::new(Mutex::new(data)),
            cache: None,
            updates: Arc::new(updates),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn TaskCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.update(|data| data.view.page_size = page_size.max(1));
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the lock, then publishes the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut StoreData) -> R) -> R {
        let (out, snapshot) = {
            let mut guard = self.lock();
            let out = f(&mut guard);
            (out, guard.snapshot())
        };
        self.updates.send_replace(snapshot);
        out
    }

    /// Writes the collection through to the cache once no optimistic change is outstanding.
    fn settle(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let tasks = {
            let data = self.lock();
            if !data.undo.is_empty() {
                return;
            }
            data.tasks.clone()
        };
        cache.put(&tasks);
    }

    /// Seeds an empty collection from the local cache. Returns whether anything was applied.
    pub fn hydrate_from_cache(&self) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let Some(tasks) = cache.get() else {
            return false;
        };
        let count = tasks.len();
        let applied = self.update(|data| {
            if !data.tasks.is_empty() {
                return false;
            }
            data.replace_tasks(tasks);
            true
        });
        if applied {
            log::info!("hydrated tasks from cache count={count}");
        }
        applied
    }

    /// Fetches the full collection and replaces the local one on success.
    ///
    /// Failures only touch the error slot and the loading flag; the collection stays as it was.
    /// The returned error is informational, the store has already recorded it.
    pub async fn load(&self, is_retry: bool) -> Result<(), TransportError> {
        self.update(|data| data.feedback.begin_load(is_retry));
        log::info!("loading tasks retry={is_retry}");

        let in_flight = InFlight::new(self, Pending::Load { is_retry });
        let result = self.api.fetch_all().await;
        in_flight.complete();
        let outcome = self.update(|data| {
            let outcome = match result {
                Ok(tasks) => {
                    let count = tasks.len();
                    data.replace_tasks(tasks);
                    if is_retry {
                        data.feedback.notify(MSG_TASKS_REFRESHED, Severity::Success);
                    }
                    Ok(count)
                }
                Err(err) => {
                    data.feedback.fail(error_message(&err, MSG_LOAD_FAILED));
                    Err(err)
                }
            };
            data.feedback.end_load(is_retry);
            outcome
        });

        match outcome {
            Ok(count) => {
                log::info!("loaded tasks count={count} retry={is_retry}");
                if let Some(cache) = &self.cache {
                    cache.put(&self.tasks());
                }
                Ok(())
            }
            Err(err) => {
                log::warn!("failed to load tasks retry={is_retry} error={err}");
                Err(err)
            }
        }
    }

    /// Hydrates from the cache, then runs the initial load on the runtime.
    ///
    /// Aborting the returned handle when the consumer goes away discards the result.
    pub fn spawn_initial_load(&self) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            store.hydrate_from_cache();
            let _ = store.load(false).await;
        })
    }

    /// Appends a placeholder task immediately and swaps in the server's task once created.
    ///
    /// `text` is expected to be validated by the caller (see `models::validate_task_text`).
    pub async fn add_task(&self, text: impl Into<String>) -> Result<Task, TransportError> {
        let text = text.into();
        let (placeholder, ticket) = self.update(|data| {
            let before = data.tasks.clone();
            let id = data.next_placeholder_id(Utc::now().timestamp_millis());
            data.tasks.push(Task::new(id, text.clone()));
            data.touch();
            let ticket = data.undo.record(before, Inverse::Remove(id), data.revision);
            data.feedback.notify(MSG_TASK_ADDED, Severity::Success);
            (id, ticket)
        });
        log::debug!("task added optimistically placeholder_id={placeholder}");

        let in_flight = InFlight::new(self, Pending::Mutation(ticket));
        let result = self.api.create(&text).await;
        in_flight.complete();
        let outcome = self.update(|data| match result {
            Ok(task) => {
                // A colliding confirmation may have moved this placeholder to a new id.
                let placeholder = data.undo.placeholder(ticket).unwrap_or(placeholder);
                data.undo.commit(ticket);
                data.confirm_created(placeholder, task.clone());
                Ok(task)
            }
            Err(err) => {
                data.roll_back(ticket, &err, MSG_ADD_FAILED);
                Err(err)
            }
        });
        self.settle();

        match &outcome {
            Ok(task) => log::info!("task created placeholder_id={placeholder} id={}", task.id),
            Err(err) => log::warn!("failed to add task placeholder_id={placeholder} error={err}"),
        }
        outcome
    }

    /// Flips `completed` on one task. Unknown ids are ignored.
    pub async fn toggle_task(&self, id: TaskId) -> Result<(), TransportError> {
        let pending = self.update(|data| {
            let index = data.tasks.iter().position(|task| task.id == id)?;
            let before = data.tasks.clone();
            let previous = data.tasks[index].completed;
            data.tasks[index].completed = !previous;
            data.touch();
            let inverse = Inverse::SetCompleted {
                id,
                completed: previous,
            };
            let ticket = data.undo.record(before, inverse, data.revision);
            data.feedback.notify(MSG_TASK_UPDATED, Severity::Info);
            Some((ticket, !previous))
        });
        let Some((ticket, completed)) = pending else {
            log::debug!("toggle ignored for unknown task id={id}");
            return Ok(());
        };

        let in_flight = InFlight::new(self, Pending::Mutation(ticket));
        let result = self.api.set_completed(id, completed).await;
        in_flight.complete();
        let outcome = self.update(|data| match result {
            Ok(_) => {
                data.undo.commit(ticket);
                Ok(())
            }
            Err(err) => {
                data.roll_back(ticket, &err, MSG_UPDATE_FAILED);
                Err(err)
            }
        });
        self.settle();

        if let Err(err) = &outcome {
            log::warn!("failed to update task id={id} completed={completed} error={err}");
        }
        outcome
    }

    /// Removes one task. Unknown ids are ignored.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), TransportError> {
        let pending = self.update(|data| {
            let index = data.tasks.iter().position(|task| task.id == id)?;
            let before = data.tasks.clone();
            let task = data.tasks.remove(index);
            data.touch();
            let ticket = data
                .undo
                .record(before, Inverse::Reinsert { index, task }, data.revision);
            data.feedback.notify(MSG_TASK_DELETED, Severity::Info);
            Some(ticket)
        });
        let Some(ticket) = pending else {
            log::debug!("delete ignored for unknown task id={id}");
            return Ok(());
        };

        let in_flight = InFlight::new(self, Pending::Mutation(ticket));
        let result = self.api.delete(id).await;
        in_flight.complete();
        let outcome = self.update(|data| match result {
            Ok(()) => {
                data.undo.commit(ticket);
                Ok(())
            }
            Err(err) => {
                data.roll_back(ticket, &err, MSG_DELETE_FAILED);
                Err(err)
            }
        });
        self.settle();

        if let Err(err) = &outcome {
            log::warn!("failed to delete task id={id} error={err}");
        }
        outcome
    }

    pub fn set_filter(&self, filter: TaskFilter) {
        self.update(|data| {
            data.view.filter = filter;
            data.view.page = 1;
        });
    }

    pub fn set_search(&self, search: impl Into<String>) {
        let search = search.into();
        self.update(|data| {
            data.view.search = search;
            data.view.page = 1;
        });
    }

    pub fn set_sort(&self, sort: Option<SortKey>) {
        self.update(|data| {
            data.view.sort = sort;
            data.view.page = 1;
        });
    }

    pub fn set_page(&self, page: usize) {
        self.update(|data| data.view.page = page.max(1));
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.update(|data| {
            data.view.page_size = page_size.max(1);
            data.view.page = 1;
        });
    }

    pub fn dismiss_notification(&self) {
        self.update(|data| data.feedback.dismiss());
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    pub fn view(&self) -> TaskView {
        let data = self.lock();
        view::derive_view(&data.tasks, &data.view)
    }

    pub fn view_state(&self) -> ViewState {
        self.lock().view.clone()
    }

    pub fn feedback(&self) -> Feedback {
        self.lock().feedback.clone()
    }

    pub fn completed_count(&self) -> usize {
        view::completed_count(&self.lock().tasks)
    }

    /// Optimistic changes still waiting for the remote side.
    pub fn pending_mutations(&self) -> usize {
        self.lock().undo.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    /// Receives a fresh [`StoreSnapshot`] after every change.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.updates.subscribe()
    }
}
