use log::debug;

use crate::storage::KeyValueStore;
use crate::store::{Clock, StoreError, TaskStore};
use crate::task::{DueAt, ParseDueError, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Text,
    Due,
}

/// Editable copy of a task's fields. Nothing reaches the store until commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub id: TaskId,
    pub text: String,
    pub due_input: String,
    pub field: Field,
    initial_due: String,
}

impl Draft {
    pub fn of(task: &Task) -> Self {
        let due_input = task.due_at.map(|d| d.to_input_string()).unwrap_or_default();
        Self {
            id: task.id,
            text: task.text.clone(),
            initial_due: due_input.clone(),
            due_input,
            field: Field::Text,
        }
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.field {
            Field::Text => &mut self.text,
            Field::Due => &mut self.due_input,
        }
    }

    pub fn push(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn due_changed(&self) -> bool {
        self.due_input.trim() != self.initial_due.trim()
    }
}

/// What caused a commit. Every trigger commits; there is no discard path
/// other than [`EditMode::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTrigger {
    Confirm,
    FocusLost,
    DueChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Updated,
    /// The edited text was blank, so the task was removed.
    Deleted,
    Stale,
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    InvalidDue(#[from] ParseDueError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Viewing/editing state of the focused task row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing(Draft),
}

impl EditMode {
    pub fn is_editing(&self) -> bool {
        matches!(self, EditMode::Editing(_))
    }

    pub fn is_editing_task(&self, id: TaskId) -> bool {
        matches!(self, EditMode::Editing(d) if d.id == id)
    }

    pub fn draft(&self) -> Option<&Draft> {
        match self {
            EditMode::Editing(d) => Some(d),
            EditMode::Viewing => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut Draft> {
        match self {
            EditMode::Editing(d) => Some(d),
            EditMode::Viewing => None,
        }
    }

    /// Viewing -> Editing, seeded from the task's current values.
    pub fn begin(&mut self, task: &Task) {
        debug!("event=edit_begin module=edit id={}", task.id);
        *self = EditMode::Editing(Draft::of(task));
    }

    pub fn cancel(&mut self) {
        if let EditMode::Editing(d) = self {
            debug!("event=edit_cancel module=edit id={}", d.id);
        }
        *self = EditMode::Viewing;
    }

    /// Editing -> Viewing by writing the draft through `update`.
    ///
    /// Returns `Ok(None)` when not editing. On error the draft is kept so the
    /// user can fix it.
    pub fn commit<S: KeyValueStore, C: Clock>(
        &mut self,
        store: &mut TaskStore<S, C>,
        trigger: CommitTrigger,
    ) -> Result<Option<CommitOutcome>, EditError> {
        let EditMode::Editing(draft) = self else {
            return Ok(None);
        };
        let due_at = DueAt::parse_optional(&draft.due_input)?;
        let id = draft.id;
        let outcome = if store.get(id).is_none() {
            CommitOutcome::Stale
        } else {
            store.update(id, &draft.text, due_at)?;
            if store.get(id).is_some() {
                CommitOutcome::Updated
            } else {
                CommitOutcome::Deleted
            }
        };
        debug!(
            "event=edit_commit module=edit id={} trigger={:?} outcome={:?}",
            id, trigger, outcome
        );
        *self = EditMode::Viewing;
        Ok(Some(outcome))
    }
}
