use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::warn;

use crate::edit::{CommitTrigger, EditError, EditMode, Field};
use crate::storage::KeyValueStore;
use crate::store::{Clock, StoreError, SystemClock, TaskStore};
use crate::task::{DueAt, Task, TaskId};
use crate::view::{self, Counts, Filter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddForm {
    pub text: String,
    pub due_input: String,
    pub field: Field,
}

impl Default for AddForm {
    fn default() -> Self {
        Self {
            text: String::new(),
            due_input: String::new(),
            field: Field::Text,
        }
    }
}

impl AddForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.field {
            Field::Text => &mut self.text,
            Field::Due => &mut self.due_input,
        }
    }
}

/// Modal message; blocks other input until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Session state behind the terminal UI.
pub struct App<S, C = SystemClock> {
    pub store: TaskStore<S, C>,
    pub filter: Filter,
    /// Index into the current filtered, sorted view.
    pub selected: usize,
    pub edit: EditMode,
    pub form: Option<AddForm>,
    pub notice: Option<Notice>,
    pub should_quit: bool,
}

impl<S: KeyValueStore, C: Clock> App<S, C> {
    pub fn new(store: TaskStore<S, C>, filter: Filter) -> Self {
        Self {
            store,
            filter,
            selected: 0,
            edit: EditMode::Viewing,
            form: None,
            notice: None,
            should_quit: false,
        }
    }

    pub fn visible(&self) -> Vec<&Task> {
        view::view(self.store.all(), self.filter)
    }

    pub fn counts(&self) -> Counts {
        Counts::of(self.store.all())
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.visible().get(self.selected).copied()
    }

    fn selected_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.finish();
            self.should_quit = true;
            return;
        }
        if self.notice.is_some() {
            self.notice = None;
            return;
        }
        if self.form.is_some() {
            self.handle_form_key(key);
        } else if self.edit.is_editing() {
            self.handle_edit_key(key);
        } else {
            self.handle_navigate_key(key);
        }
    }

    fn handle_navigate_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('a') | KeyCode::Char('i') => self.form = Some(AddForm::default()),
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
            KeyCode::Char('e') | KeyCode::Enter => self.begin_edit(),
            KeyCode::Char('1') => self.set_filter(Filter::All),
            KeyCode::Char('2') => self.set_filter(Filter::Active),
            KeyCode::Char('3') => self.set_filter(Filter::Completed),
            KeyCode::Left | KeyCode::Char('h') => self.set_filter(self.filter.prev()),
            KeyCode::Right | KeyCode::Char('l') => self.set_filter(self.filter.next()),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            _ => {}
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.commit_edit(CommitTrigger::Confirm);
            }
            KeyCode::Esc => self.edit.cancel(),
            KeyCode::Tab | KeyCode::BackTab => {
                let Some(draft) = self.edit.draft_mut() else {
                    return;
                };
                if draft.field == Field::Due && draft.due_changed() {
                    self.commit_edit(CommitTrigger::DueChanged);
                } else {
                    draft.field = match draft.field {
                        Field::Text => Field::Due,
                        Field::Due => Field::Text,
                    };
                }
            }
            KeyCode::Up => {
                if self.commit_edit(CommitTrigger::FocusLost) {
                    self.move_selection(-1);
                }
            }
            KeyCode::Down => {
                if self.commit_edit(CommitTrigger::FocusLost) {
                    self.move_selection(1);
                }
            }
            KeyCode::Backspace => {
                if let Some(draft) = self.edit.draft_mut() {
                    draft.backspace();
                }
            }
            KeyCode::Char(c) => {
                if let Some(draft) = self.edit.draft_mut() {
                    draft.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.form = None,
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::BackTab => {
                form.field = match form.field {
                    Field::Text => Field::Due,
                    Field::Due => Field::Text,
                };
            }
            KeyCode::Backspace => {
                form.focused_mut().pop();
            }
            KeyCode::Char(c) => form.focused_mut().push(c),
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.form.as_ref() else {
            return;
        };
        let due_at = match DueAt::parse_optional(&form.due_input) {
            Ok(due) => due,
            Err(e) => {
                self.notice = Some(Notice::new("Invalid date", e.to_string()));
                return;
            }
        };
        match self.store.add(&form.text, due_at) {
            Ok(task) => {
                self.form = None;
                if !self.filter.matches(&task) {
                    self.filter = Filter::All;
                }
                self.select_id(task.id);
            }
            Err(e) => self.report(e),
        }
    }

    /// Commit a pending edit, if any. Returns false when the edit could not
    /// be committed and is still open.
    fn commit_edit(&mut self, trigger: CommitTrigger) -> bool {
        let id = self.edit.draft().map(|d| d.id);
        match self.edit.commit(&mut self.store, trigger) {
            Ok(_) => {
                match id {
                    Some(id) => self.select_id(id),
                    None => self.clamp_selection(),
                }
                true
            }
            Err(EditError::InvalidDue(e)) => {
                self.notice = Some(Notice::new("Invalid date", e.to_string()));
                false
            }
            Err(EditError::Store(e)) => {
                self.report(e);
                false
            }
        }
    }

    /// Commit any open edit before the session ends. A failed commit drops
    /// the draft and leaves its notice in place for the caller to print.
    pub fn finish(&mut self) {
        if let Some(id) = self.edit.draft().map(|d| d.id) {
            if !self.commit_edit(CommitTrigger::FocusLost) {
                warn!("event=edit_lost module=app id={}", id);
                self.edit.cancel();
            }
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        if !self.commit_edit(CommitTrigger::FocusLost) {
            return;
        }
        let keep = self.selected_id();
        self.filter = filter;
        match keep {
            Some(id) => self.select_id(id),
            None => self.clamp_selection(),
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    fn begin_edit(&mut self) {
        let Some(task) = self.selected_task().cloned() else {
            return;
        };
        self.edit.begin(&task);
    }

    fn toggle_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let (id, completed) = (task.id, !task.completed);
        match self.store.toggle(id, completed) {
            Ok(()) => self.select_id(id),
            Err(e) => self.report(e),
        }
    }

    fn delete_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.store.delete(id) {
            Ok(()) => self.clamp_selection(),
            Err(e) => self.report(e),
        }
    }

    /// Follow a task after re-sorting; falls back to clamping when it is no
    /// longer visible.
    fn select_id(&mut self, id: TaskId) {
        match self.visible().iter().position(|t| t.id == id) {
            Some(index) => self.selected = index,
            None => self.clamp_selection(),
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn report(&mut self, error: StoreError) {
        match error {
            StoreError::EmptyText => {
                self.notice = Some(Notice::new("Oops", error.to_string()));
            }
            StoreError::Storage(_) | StoreError::IdsExhausted(_) => {
                warn!("event=ui_error module=app error={}", error);
                self.notice = Some(Notice::new("Not saved", error.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{FlakyStore, StepClock};
    use pretty_assertions::assert_eq;

    fn app() -> App<FlakyStore, StepClock> {
        let store = TaskStore::load_with_clock(FlakyStore::default(), StepClock::new()).unwrap();
        App::new(store, Filter::All)
    }

    fn press(app: &mut App<FlakyStore, StepClock>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App<FlakyStore, StepClock>, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn visible_texts(app: &App<FlakyStore, StepClock>) -> Vec<String> {
        app.visible().iter().map(|t| t.text.clone()).collect()
    }

    fn add(app: &mut App<FlakyStore, StepClock>, text: &str, due: &str) {
        press(app, KeyCode::Char('a'));
        type_str(app, text);
        if !due.is_empty() {
            press(app, KeyCode::Tab);
            type_str(app, due);
        }
        press(app, KeyCode::Enter);
    }

    #[test]
    fn add_through_form() {
        let mut app = app();
        add(&mut app, "Buy milk", "");
        add(&mut app, "Call Bob", "2024-01-01T10:00");
        assert!(app.form.is_none());
        assert_eq!(visible_texts(&app), vec!["Buy milk", "Call Bob"]);
        assert_eq!(app.selected_task().unwrap().text, "Call Bob");
    }

    #[test]
    fn empty_add_shows_blocking_notice() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "   ");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.notice.as_ref().unwrap().message, "Please enter a task");
        assert!(app.store.is_empty());
        assert!(app.form.is_some());

        // Any key dismisses the notice and is otherwise swallowed.
        press(&mut app, KeyCode::Char('z'));
        assert!(app.notice.is_none());
        assert_eq!(app.form.as_ref().unwrap().text, "   ");
    }

    #[test]
    fn invalid_due_in_form_shows_notice() {
        let mut app = app();
        add(&mut app, "Task", "someday");
        assert_eq!(app.notice.as_ref().unwrap().title, "Invalid date");
        assert!(app.store.is_empty());
    }

    #[test]
    fn toggle_and_filter() {
        let mut app = app();
        add(&mut app, "X", "");
        press(&mut app, KeyCode::Char(' '));
        add(&mut app, "Y", "");

        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.filter, Filter::Active);
        assert_eq!(visible_texts(&app), vec!["Y"]);

        press(&mut app, KeyCode::Char('3'));
        assert_eq!(visible_texts(&app), vec!["X"]);

        press(&mut app, KeyCode::Right);
        assert_eq!(app.filter, Filter::All);
        assert_eq!(visible_texts(&app), vec!["Y", "X"]);
    }

    #[test]
    fn adding_under_other_filter_switches_to_all() {
        let mut app = app();
        press(&mut app, KeyCode::Char('3'));
        add(&mut app, "New", "");
        assert_eq!(app.filter, Filter::All);
        assert_eq!(app.selected_task().unwrap().text, "New");
    }

    #[test]
    fn delete_selected_task() {
        let mut app = app();
        add(&mut app, "a", "");
        add(&mut app, "b", "");
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(visible_texts(&app), vec!["a"]);
        assert_eq!(app.selected, 0);
        press(&mut app, KeyCode::Char('d'));
        assert!(app.visible().is_empty());
        press(&mut app, KeyCode::Char('d'));
        assert!(app.notice.is_none());
    }

    #[test]
    fn edit_commit_on_enter() {
        let mut app = app();
        add(&mut app, "Call Bob", "");
        press(&mut app, KeyCode::Char('e'));
        assert!(app.edit.is_editing());
        type_str(&mut app, " now");
        press(&mut app, KeyCode::Enter);
        assert!(!app.edit.is_editing());
        assert_eq!(visible_texts(&app), vec!["Call Bob now"]);
    }

    #[test]
    fn edit_commit_on_focus_loss() {
        let mut app = app();
        add(&mut app, "a", "");
        add(&mut app, "b", "");
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "A");
        press(&mut app, KeyCode::Down);
        assert!(!app.edit.is_editing());
        assert_eq!(visible_texts(&app), vec!["A", "b"]);
        assert_eq!(app.selected, 1);
    }

    #[test]
    fn leaving_changed_due_field_commits() {
        let mut app = app();
        add(&mut app, "a", "");
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "2024-03-01");
        press(&mut app, KeyCode::Tab);
        assert!(!app.edit.is_editing());
        assert_eq!(
            app.store.all()[0].due_at,
            Some("2024-03-01".parse().unwrap())
        );
    }

    #[test]
    fn tab_without_due_change_only_switches_field() {
        let mut app = app();
        add(&mut app, "a", "");
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.edit.draft().unwrap().field, Field::Text);
    }

    #[test]
    fn edit_to_blank_deletes() {
        let mut app = app();
        add(&mut app, "ab", "");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Enter);
        assert!(app.store.is_empty());
        assert!(!app.edit.is_editing());
    }

    #[test]
    fn escape_cancels_edit() {
        let mut app = app();
        add(&mut app, "keep", "");
        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "zzz");
        press(&mut app, KeyCode::Esc);
        assert!(!app.edit.is_editing());
        assert_eq!(visible_texts(&app), vec!["keep"]);
        assert!(!app.should_quit);
    }

    #[test]
    fn filter_change_commits_pending_edit() {
        let mut app = app();
        add(&mut app, "a", "");
        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "b");
        app.set_filter(Filter::Active);
        assert!(!app.edit.is_editing());
        assert_eq!(app.store.all()[0].text, "ab");
    }

    #[test]
    fn storage_failure_shows_notice_and_keeps_state() {
        let mut app = app();
        add(&mut app, "a", "");
        app.store.backend_mut().fail_writes = true;
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.notice.as_ref().unwrap().title, "Not saved");
        assert!(!app.store.all()[0].completed);
    }

    #[test]
    fn finish_commits_open_edit() {
        let mut app = app();
        add(&mut app, "a", "");
        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "!");
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
        assert_eq!(app.store.all()[0].text, "a!");
    }

    #[test]
    fn finish_keeps_notice_when_edit_cannot_be_saved() {
        let mut app = app();
        add(&mut app, "a", "");
        press(&mut app, KeyCode::Char('e'));
        type_str(&mut app, "!");
        app.store.backend_mut().fail_writes = true;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));

        assert!(app.should_quit);
        assert!(!app.edit.is_editing());
        assert_eq!(app.notice.as_ref().unwrap().title, "Not saved");
        assert_eq!(app.store.all()[0].text, "a");
    }

    #[test]
    fn quit_key() {
        let mut app = app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn selection_is_clamped() {
        let mut app = app();
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, 0);
        add(&mut app, "a", "");
        add(&mut app, "b", "");
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.selected, 1);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.selected, 0);
    }
}
