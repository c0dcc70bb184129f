use std::collections::HashSet;

use chrono::{DateTime, NaiveDate};
use proptest::prelude::*;
use todo_list::storage::{MemoryStore, TaskRepository};
use todo_list::store::TaskStore;
use todo_list::{view, DueAt, Filter, Task, TaskId};

fn due_strategy() -> impl Strategy<Value = Option<DueAt>> {
    let nanos = prop_oneof![Just(0u32), 0u32..1000, 0u32..1_000_000_000];
    proptest::option::of((0i64..3650, 0u32..86400, nanos).prop_map(|(days, secs, nanos)| {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(days);
        let at = date
            .and_hms_nano_opt(secs / 3600, (secs / 60) % 60, secs % 60, nanos)
            .unwrap();
        DueAt::new(at)
    }))
}

fn task_strategy() -> impl Strategy<Value = (String, bool, Option<DueAt>, i64)> {
    (
        "[a-zA-Z0-9 ]{0,8}[a-zA-Z0-9]",
        any::<bool>(),
        due_strategy(),
        1_600_000_000_000i64..1_900_000_000_000i64,
    )
}

fn build(specs: Vec<(String, bool, Option<DueAt>, i64)>) -> Vec<Task> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, (text, completed, due, millis))| {
            let created = DateTime::from_timestamp_millis(millis).unwrap();
            let mut task = Task::new(TaskId(i as u64 + 1), text, due, created);
            task.completed = completed;
            task
        })
        .collect()
}

fn ids(tasks: &[&Task]) -> HashSet<TaskId> {
    tasks.iter().map(|t| t.id).collect()
}

proptest! {
    #[test]
    fn prop_add_ids_are_distinct(texts in proptest::collection::vec("[a-z]{1,6}", 1..40)) {
        let mut store = TaskStore::load(MemoryStore::new()).unwrap();
        let mut seen = HashSet::new();
        for text in &texts {
            let task = store.add(text, None).unwrap();
            prop_assert!(seen.insert(task.id));
        }
        prop_assert_eq!(store.len(), texts.len());
    }

    #[test]
    fn prop_storage_round_trip(specs in proptest::collection::vec(task_strategy(), 0..20)) {
        let tasks = build(specs);
        let mut repo = TaskRepository::new(MemoryStore::new());
        repo.save(&tasks).unwrap();
        prop_assert_eq!(repo.load().unwrap(), tasks);
    }

    #[test]
    fn prop_filters_partition_all(specs in proptest::collection::vec(task_strategy(), 0..30)) {
        let tasks = build(specs);
        let all = ids(&view(&tasks, Filter::All));
        let active = ids(&view(&tasks, Filter::Active));
        let completed = ids(&view(&tasks, Filter::Completed));
        prop_assert!(active.is_disjoint(&completed));
        let union: HashSet<TaskId> = active.union(&completed).copied().collect();
        prop_assert_eq!(union, all);
    }

    #[test]
    fn prop_view_is_repeatable(specs in proptest::collection::vec(task_strategy(), 0..30)) {
        let tasks = build(specs);
        for filter in Filter::ALL {
            let first: Vec<TaskId> = view(&tasks, filter).iter().map(|t| t.id).collect();
            let second: Vec<TaskId> = view(&tasks, filter).iter().map(|t| t.id).collect();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn prop_incomplete_always_first(specs in proptest::collection::vec(task_strategy(), 0..30)) {
        let tasks = build(specs);
        let shown = view(&tasks, Filter::All);
        let first_done = shown.iter().position(|t| t.completed).unwrap_or(shown.len());
        prop_assert!(shown[first_done..].iter().all(|t| t.completed));
    }
}
