use crate::app::{AddForm, App, Notice};
use crate::edit::{Draft, Field};
use crate::storage::KeyValueStore;
use crate::store::Clock;
use crate::task::Task;
use crate::view::Filter;
use crossterm::event::{self, Event};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;

pub fn run_app<B: Backend, S: KeyValueStore, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            app.handle_key(key);
        }
        if app.should_quit {
            app.finish();
            return Ok(());
        }
    }
}

pub fn draw<S: KeyValueStore, C: Clock>(f: &mut Frame, app: &App<S, C>) {
    let form_height = if app.form.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Length(form_height),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    if let Some(form) = &app.form {
        draw_form(f, form, chunks[1]);
    }
    draw_tasks(f, app, chunks[2]);
    draw_help(f, app, chunks[3]);

    if let Some(notice) = &app.notice {
        draw_notice(f, notice);
    }
}

fn draw_tabs<S: KeyValueStore, C: Clock>(f: &mut Frame, app: &App<S, C>, area: Rect) {
    let counts = app.counts();
    let titles: Vec<Line> = Filter::ALL
        .iter()
        .map(|filter| Line::from(format!("{} ({})", filter.label(), counts.get(*filter))))
        .collect();
    let selected = Filter::ALL.iter().position(|f| *f == app.filter).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(Block::default().title("To-Do List").borders(Borders::ALL))
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn field_span(value: &str, focused: bool) -> Span<'_> {
    if focused {
        Span::styled(
            format!("{value}_"),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )
    } else {
        Span::raw(value)
    }
}

fn draw_form(f: &mut Frame, form: &AddForm, area: Rect) {
    let line = Line::from(vec![
        Span::styled("Task: ", Style::default().fg(Color::Gray)),
        field_span(&form.text, form.field == Field::Text),
        Span::styled("  Due: ", Style::default().fg(Color::Gray)),
        field_span(&form.due_input, form.field == Field::Due),
    ]);
    let paragraph = Paragraph::new(line).block(
        Block::default()
            .title("New task")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(paragraph, area);
}

fn task_line(task: &Task) -> Line<'_> {
    let checkbox = if task.completed { "[x] " } else { "[ ] " };
    let text_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::White)
    };
    let mut spans = vec![Span::raw(checkbox), Span::styled(task.text.as_str(), text_style)];
    if let Some(due) = task.due_at {
        spans.push(Span::styled(
            format!("  {}", due.display_short()),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

fn draft_line(draft: &Draft) -> Line<'_> {
    Line::from(vec![
        Span::styled("edit ", Style::default().fg(Color::Cyan)),
        field_span(&draft.text, draft.field == Field::Text),
        Span::styled("  Due: ", Style::default().fg(Color::Gray)),
        field_span(&draft.due_input, draft.field == Field::Due),
    ])
}

fn draw_tasks<S: KeyValueStore, C: Clock>(f: &mut Frame, app: &App<S, C>, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let tasks = app.visible();
    if tasks.is_empty() {
        let empty = Paragraph::new(Span::styled(
            app.filter.empty_message(),
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|t| match app.edit.draft() {
            Some(draft) if draft.id == t.id => ListItem::new(draft_line(draft)),
            _ => ListItem::new(task_line(t)),
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_help<S: KeyValueStore, C: Clock>(f: &mut Frame, app: &App<S, C>, area: Rect) {
    let help = if app.form.is_some() {
        "Enter add  Tab switch field  Esc cancel"
    } else if app.edit.is_editing() {
        "Enter save  Tab switch field  Esc cancel  Up/Down save & move"
    } else {
        "a add  Space done  e edit  d delete  1/2/3 filter  q quit"
    };
    f.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(Color::DarkGray))),
        area,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_notice(f: &mut Frame, notice: &Notice) {
    let area = centered(f.area(), 50, 5);
    let paragraph = Paragraph::new(vec![
        Line::from(notice.message.as_str()),
        Line::from(Span::styled(
            "press any key",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title(notice.title.as_str())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}
