use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::storage::{KeyValueStore, StorageError, TaskRepository};
use crate::task::{DueAt, Task, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Please enter a task")]
    EmptyText,
    #[error("no task ids left after {0}")]
    IdsExhausted(u64),
    #[error("could not save tasks: {0}")]
    Storage(#[from] StorageError),
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The in-memory task collection, written through to storage on every
/// mutation.
///
/// Mutations take `&mut self`, so there is never more than one writer. A
/// mutation is applied to a copy first and only becomes visible once the
/// write succeeded; a failed write leaves the collection untouched.
#[derive(Debug)]
pub struct TaskStore<S, C = SystemClock> {
    tasks: Vec<Task>,
    repo: TaskRepository<S>,
    clock: C,
    last_id: u64,
}

impl<S: KeyValueStore> TaskStore<S, SystemClock> {
    pub fn load(backend: S) -> Result<Self, StorageError> {
        Self::load_with_clock(backend, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> TaskStore<S, C> {
    pub fn load_with_clock(backend: S, clock: C) -> Result<Self, StorageError> {
        let repo = TaskRepository::new(backend);
        let tasks = repo.load()?;
        let last_id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0);
        info!("event=store_load module=store status=ok count={}", tasks.len());
        Ok(Self {
            tasks,
            repo,
            clock,
            last_id,
        })
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn backend(&self) -> &S {
        self.repo.backend()
    }

    pub fn backend_mut(&mut self) -> &mut S {
        self.repo.backend_mut()
    }

    /// Create a task. Text is trimmed; blank text is rejected.
    pub fn add(&mut self, text: &str, due_at: Option<DueAt>) -> Result<Task, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("event=task_add module=store status=rejected reason=empty_text");
            return Err(StoreError::EmptyText);
        }
        let now = self.clock.now();
        let id = self.next_id(now)?;
        let task = Task::new(id, text.to_string(), due_at, now);

        let mut next = self.tasks.clone();
        next.push(task.clone());
        self.commit(next)?;
        self.last_id = id.0;
        info!("event=task_add module=store status=ok id={}", id);
        Ok(task)
    }

    pub fn toggle(&mut self, id: TaskId, completed: bool) -> Result<(), StoreError> {
        let Some(index) = self.position(id) else {
            debug!("event=task_toggle module=store status=stale id={}", id);
            return Ok(());
        };
        let mut next = self.tasks.clone();
        next[index].completed = completed;
        self.commit(next)?;
        info!("event=task_toggle module=store status=ok id={} completed={}", id, completed);
        Ok(())
    }

    /// Replace text and due date. Blank text deletes the task instead.
    /// Unknown ids are ignored.
    pub fn update(&mut self, id: TaskId, text: &str, due_at: Option<DueAt>) -> Result<(), StoreError> {
        let Some(index) = self.position(id) else {
            debug!("event=task_update module=store status=stale id={}", id);
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            return self.delete(id);
        }
        let mut next = self.tasks.clone();
        next[index].text = text.to_string();
        next[index].due_at = due_at;
        self.commit(next)?;
        info!("event=task_update module=store status=ok id={}", id);
        Ok(())
    }

    pub fn delete(&mut self, id: TaskId) -> Result<(), StoreError> {
        if self.position(id).is_none() {
            debug!("event=task_delete module=store status=stale id={}", id);
            return Ok(());
        }
        let next: Vec<Task> = self.tasks.iter().filter(|t| t.id != id).cloned().collect();
        self.commit(next)?;
        info!("event=task_delete module=store status=ok id={}", id);
        Ok(())
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn next_id(&self, now: DateTime<Utc>) -> Result<TaskId, StoreError> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let after_last = self
            .last_id
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted(self.last_id))?;
        Ok(TaskId(millis.max(after_last)))
    }

    fn commit(&mut self, next: Vec<Task>) -> Result<(), StoreError> {
        if let Err(e) = self.repo.save(&next) {
            warn!("event=store_save module=store status=error error={}", e);
            return Err(e.into());
        }
        self.tasks = next;
        Ok(())
    }
}
