//! Undo log for in-flight optimistic mutations.
//!
//! Every optimistic change records the collection as it was before the change plus a targeted
//! inverse. If the remote call fails and nothing else touched the collection in the meantime the
//! snapshot is restored wholesale; otherwise only the inverse is applied so that concurrent
//! mutations keep their effect.

use std::collections::HashMap;

use crate::models::{Task, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inverse {
    Remove(TaskId),
    SetCompleted { id: TaskId, completed: bool },
    Reinsert { index: usize, task: Task },
}

impl Inverse {
    pub fn apply(&self, tasks: &mut Vec<Task>) {
        match self {
            Inverse::Remove(id) => tasks.retain(|task| task.id != *id),
            Inverse::SetCompleted { id, completed } => {
                if let Some(task) = tasks.iter_mut().find(|task| task.id == *id) {
                    task.completed = *completed;
                }
            }
            Inverse::Reinsert { index, task } => {
                if tasks.iter().any(|existing| existing.id == task.id) {
                    return;
                }
                let index = (*index).min(tasks.len());
                tasks.insert(index, task.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoEntry {
    snapshot: Vec<Task>,
    inverse: Inverse,
    /// Collection revision right after the optimistic step.
    revision: u64,
}

impl UndoEntry {
    /// Rolls `tasks` back and reports whether the full snapshot was used.
    pub fn rollback(self, tasks: &mut Vec<Task>, current_revision: u64) -> bool {
        if current_revision == self.revision {
            *tasks = self.snapshot;
            return true;
        }
        self.inverse.apply(tasks);
        false
    }
}

pub type Ticket = u64;

#[derive(Debug, Default)]
pub struct UndoLog {
    next_ticket: Ticket,
    entries: HashMap<Ticket, UndoEntry>,
}

impl UndoLog {
    pub fn record(&mut self, snapshot: Vec<Task>, inverse: Inverse, revision: u64) -> Ticket {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.entries.insert(
            ticket,
            UndoEntry {
                snapshot,
                inverse,
                revision,
            },
        );
        ticket
    }

    pub fn commit(&mut self, ticket: Ticket) {
        self.entries.remove(&ticket);
    }

    pub fn take(&mut self, ticket: Ticket) -> Option<UndoEntry> {
        self.entries.remove(&ticket)
    }

    /// Placeholder id the in-flight add behind `ticket` currently owns.
    pub fn placeholder(&self, ticket: Ticket) -> Option<TaskId> {
        match self.entries.get(&ticket)?.inverse {
            Inverse::Remove(id) => Some(id),
            _ => None,
        }
    }

    /// Ticket of the in-flight add whose placeholder carries `id`.
    pub fn placeholder_owner(&self, id: TaskId) -> Option<Ticket> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.inverse == Inverse::Remove(id))
            .map(|(ticket, _)| *ticket)
    }

    /// Points an in-flight add at a new placeholder id after its old one was reassigned.
    pub fn rekey_placeholder(&mut self, ticket: Ticket, id: TaskId) {
        if let Some(entry) = self.entries.get_mut(&ticket) {
            if matches!(entry.inverse, Inverse::Remove(_)) {
                entry.inverse = Inverse::Remove(id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
