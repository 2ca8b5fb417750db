//! Derived task views.
//!
//! Everything here is a pure function of the task collection and a [`ViewState`]: filtering by
//! completion and search text, ordering, then slicing out one page.

use serde::{Deserialize, Serialize};

use crate::models::{SortKey, Task, TaskFilter};

pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ViewState {
    pub filter: TaskFilter,
    pub search: String,
    /// `None` keeps insertion order.
    pub sort: Option<SortKey>,
    /// 1-indexed.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            filter: TaskFilter::All,
            search: String::new(),
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TaskView {
    /// Tasks on the current page, filtered and sorted.
    pub tasks: Vec<Task>,
    pub filtered_count: usize,
    pub total_pages: usize,
    pub page: usize,
    /// Counted over the whole collection, independent of the view state.
    pub completed_count: usize,
    pub total_count: usize,
}

pub fn derive_view(tasks: &[Task], state: &ViewState) -> TaskView {
    let mut filtered = filter_tasks(tasks, state.filter, &state.search);
    if let Some(key) = state.sort {
        sort_tasks(&mut filtered, key);
    }
    let page = state.page.max(1);
    let page_size = state.page_size.max(1);
    TaskView {
        tasks: paginate(&filtered, page, page_size).to_vec(),
        filtered_count: filtered.len(),
        total_pages: total_pages(filtered.len(), page_size),
        page,
        completed_count: completed_count(tasks),
        total_count: tasks.len(),
    }
}

/// Keeps tasks matching `filter` whose text contains the trimmed `search` (case-insensitive).
pub fn filter_tasks(tasks: &[Task], filter: TaskFilter, search: &str) -> Vec<Task> {
    let needle = search.trim().to_lowercase();
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .filter(|task| needle.is_empty() || task.text.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Orders tasks in place. `sort_by_key` is stable, so completion sorts keep the relative order of
/// ties.
pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    match key {
        SortKey::Newest => tasks.sort_by_key(|task| std::cmp::Reverse(task.id)),
        SortKey::Oldest => tasks.sort_by_key(|task| task.id),
        SortKey::Completed => tasks.sort_by_key(|task| task.completed),
        SortKey::Pending => tasks.sort_by_key(|task| !task.completed),
    }
}

/// Returns `[(page - 1) * page_size, page * page_size)` clipped to the slice. Zero inputs are
/// treated as 1.
pub fn paginate(tasks: &[Task], page: usize, page_size: usize) -> &[Task] {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1).saturating_mul(page_size).min(tasks.len());
    let end = start.saturating_add(page_size).min(tasks.len());
    &tasks[start..end]
}

pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1))
}

pub fn completed_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| task.completed).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, text: &str, completed: bool) -> Task {
        Task {
            id,
            text: text.to_string(),
            completed,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn state(filter: TaskFilter) -> ViewState {
        ViewState {
            filter,
            ..ViewState::default()
        }
    }

    #[test]
    fn filter_by_completion_state() {
        let tasks = vec![task(1, "a", false), task(2, "b", true)];

        let active = derive_view(&tasks, &state(TaskFilter::Active));
        assert_eq!(active.tasks, vec![task(1, "a", false)]);

        let done = derive_view(&tasks, &state(TaskFilter::Done));
        assert_eq!(done.tasks, vec![task(2, "b", true)]);

        let all = derive_view(&tasks, &state(TaskFilter::All));
        assert_eq!(ids(&all.tasks), vec![1, 2]);
    }

    #[test]
    fn search_is_a_trimmed_case_insensitive_substring_match() {
        let tasks = vec![task(1, "Buy milk", false), task(2, "Walk dog", false)];
        let mut view_state = ViewState {
            search: "ilk".to_string(),
            ..ViewState::default()
        };
        assert_eq!(
            derive_view(&tasks, &view_state).tasks,
            vec![task(1, "Buy milk", false)]
        );

        view_state.search = "  WALK ".to_string();
        assert_eq!(ids(&derive_view(&tasks, &view_state).tasks), vec![2]);

        view_state.search = "   ".to_string();
        assert_eq!(ids(&derive_view(&tasks, &view_state).tasks), vec![1, 2]);
    }

    #[test]
    fn sort_keys_order_by_id_or_completion() {
        let base = vec![
            task(2, "b", true),
            task(3, "c", false),
            task(1, "a", true),
            task(4, "d", false),
        ];

        let mut tasks = base.clone();
        sort_tasks(&mut tasks, SortKey::Newest);
        assert_eq!(ids(&tasks), vec![4, 3, 2, 1]);

        let mut tasks = base.clone();
        sort_tasks(&mut tasks, SortKey::Oldest);
        assert_eq!(ids(&tasks), vec![1, 2, 3, 4]);

        // Ties keep their original relative order.
        let mut tasks = base.clone();
        sort_tasks(&mut tasks, SortKey::Completed);
        assert_eq!(ids(&tasks), vec![3, 4, 2, 1]);

        let mut tasks = base;
        sort_tasks(&mut tasks, SortKey::Pending);
        assert_eq!(ids(&tasks), vec![2, 1, 3, 4]);
    }

    #[test]
    fn sort_completed_puts_pending_tasks_first() {
        let tasks = vec![task(1, "a", true), task(2, "b", false)];
        let view_state = ViewState {
            sort: Some(SortKey::Completed),
            ..ViewState::default()
        };
        assert_eq!(
            derive_view(&tasks, &view_state).tasks,
            vec![task(2, "b", false), task(1, "a", true)]
        );
    }

    #[test]
    fn sort_applies_after_filtering() {
        let tasks = vec![
            task(1, "x", false),
            task(5, "y", true),
            task(3, "x", false),
        ];
        let view_state = ViewState {
            filter: TaskFilter::Active,
            sort: Some(SortKey::Newest),
            ..ViewState::default()
        };
        assert_eq!(ids(&derive_view(&tasks, &view_state).tasks), vec![3, 1]);
    }

    #[test]
    fn pages_cover_the_filtered_collection_exactly_once() {
        for count in 0..=23 {
            let tasks: Vec<Task> = (1..=count as i64)
                .map(|id| task(id, "t", id % 3 == 0))
                .collect();
            for page_size in 1..=7 {
                let pages = total_pages(tasks.len(), page_size);
                assert_eq!(pages, (count + page_size - 1) / page_size);

                let mut seen = Vec::new();
                for page in 1..=pages {
                    let slice = paginate(&tasks, page, page_size);
                    assert!(!slice.is_empty());
                    assert!(slice.len() <= page_size);
                    seen.extend(ids(slice));
                }
                assert_eq!(seen, ids(&tasks), "count={count} page_size={page_size}");
                assert!(paginate(&tasks, pages + 1, page_size).is_empty());
            }
        }
    }

    #[test]
    fn zero_page_and_page_size_are_clamped_to_one() {
        let tasks = vec![task(1, "a", false), task(2, "b", false)];
        assert_eq!(total_pages(2, 0), 2);
        assert_eq!(ids(paginate(&tasks, 0, 0)), vec![1]);

        let view = derive_view(
            &tasks,
            &ViewState {
                page: 0,
                page_size: 0,
                ..ViewState::default()
            },
        );
        assert_eq!(view.page, 1);
        assert_eq!(view.total_pages, 2);
        assert_eq!(ids(&view.tasks), vec![1]);
    }

    #[test]
    fn empty_collection_has_no_pages() {
        let view = derive_view(&[], &ViewState::default());
        assert!(view.tasks.is_empty());
        assert_eq!(view.total_pages, 0);
        assert_eq!(view.filtered_count, 0);
    }

    #[test]
    fn completed_count_ignores_filter_search_sort_and_page() {
        let tasks = vec![
            task(1, "alpha", true),
            task(2, "beta", true),
            task(3, "gamma", false),
        ];
        let view_state = ViewState {
            filter: TaskFilter::Active,
            search: "gam".to_string(),
            sort: Some(SortKey::Pending),
            page: 4,
            page_size: 1,
        };
        let view = derive_view(&tasks, &view_state);
        assert!(view.tasks.is_empty());
        assert_eq!(view.completed_count, 2);
        assert_eq!(view.completed_count, completed_count(&tasks));
        assert_eq!(view.total_count, 3);
        assert_eq!(view.filtered_count, 1);
    }

    #[test]
    fn deriving_twice_yields_identical_output() {
        let tasks = vec![
            task(4, "Walk dog", true),
            task(2, "buy milk", false),
            task(9, "Milk the cow", false),
        ];
        let view_state = ViewState {
            search: "milk".to_string(),
            sort: Some(SortKey::Oldest),
            page_size: 1,
            ..ViewState::default()
        };
        let first = derive_view(&tasks, &view_state);
        let second = derive_view(&tasks, &view_state);
        assert_eq!(first, second);
        assert_eq!(ids(&first.tasks), vec![2]);
        assert_eq!(first.total_pages, 2);
    }
}
