use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use gk_core::{Action, CreateDialog, FieldValue, Group, Outcome, Screen, Session, Snapshot};
use gk_utils::{display_value, entry_count_label, field_placeholder, field_preview};

const TICK_RATE: Duration = Duration::from_millis(200);
const FIELD_PREVIEW_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Home,
    CreateDialog,
    GroupDetail,
    EntryForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogFocus {
    Name,
    FieldName,
    Fields,
}

impl DialogFocus {
    fn next(self) -> Self {
        match self {
            DialogFocus::Name => DialogFocus::FieldName,
            DialogFocus::FieldName => DialogFocus::Fields,
            DialogFocus::Fields => DialogFocus::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            DialogFocus::Name => DialogFocus::Fields,
            DialogFocus::FieldName => DialogFocus::Name,
            DialogFocus::Fields => DialogFocus::FieldName,
        }
    }
}

/// Single-line text input. The cursor counts characters, not bytes.
#[derive(Debug, Default, Clone)]
struct TextInput {
    content: String,
    cursor: usize,
}

impl TextInput {
    fn with_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let cursor = content.chars().count();
        Self { content, cursor }
    }

    fn byte_index(&self) -> usize {
        self.content
            .char_indices()
            .nth(self.cursor)
            .map_or(self.content.len(), |(index, _)| index)
    }

    fn insert(&mut self, c: char) {
        let index = self.byte_index();
        self.content.insert(index, c);
        self.cursor += 1;
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let index = self.byte_index();
            self.content.remove(index);
        }
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.content.chars().count() {
            self.cursor += 1;
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.content.chars().count();
    }

    fn reset(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }
}

#[derive(Debug)]
struct App {
    session: Session,
    snapshot: Snapshot,
    group_state: ListState,
    entry_state: TableState,
    field_state: ListState,
    dialog_focus: DialogFocus,
    form_index: usize,
    input: TextInput,
    show_help: bool,
    status: Option<String>,
}

impl App {
    fn new() -> Self {
        let session = Session::new();
        let snapshot = session.snapshot();
        Self {
            session,
            snapshot,
            group_state: ListState::default(),
            entry_state: TableState::default(),
            field_state: ListState::default(),
            dialog_focus: DialogFocus::Name,
            form_index: 0,
            input: TextInput::default(),
            show_help: false,
            status: None,
        }
    }

    fn mode(&self) -> Mode {
        match &self.snapshot.screen {
            Screen::Home {
                create_dialog: Some(_),
                ..
            } => Mode::CreateDialog,
            Screen::Home { .. } => Mode::Home,
            Screen::GroupDetail { .. } => Mode::GroupDetail,
            Screen::EntryForm { .. } => Mode::EntryForm,
        }
    }

    fn dispatch(&mut self, action: Action) {
        debug!(action = action.name(), "dispatching key action");
        self.snapshot = self.session.apply(action);
        if let Outcome::Rejected(reason) = &self.snapshot.outcome {
            self.status = Some(reason.clone());
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        match &self.snapshot.screen {
            Screen::Home {
                groups,
                create_dialog,
            } => {
                self.group_state
                    .select(clamped(self.group_state.selected(), groups.len()));
                let fields = create_dialog
                    .as_ref()
                    .map_or(0, |dialog| dialog.draft.fields().len());
                self.field_state
                    .select(clamped(self.field_state.selected(), fields));
            }
            Screen::GroupDetail { group } => {
                self.entry_state
                    .select(clamped(self.entry_state.selected(), group.entries().len()));
            }
            Screen::EntryForm { values, .. } => {
                if self.form_index >= values.len() {
                    self.form_index = values.len().saturating_sub(1);
                }
            }
        }
    }

    fn groups(&self) -> &[Arc<Group>] {
        match &self.snapshot.screen {
            Screen::Home { groups, .. } => groups,
            _ => &[],
        }
    }

    fn dialog(&self) -> Option<&CreateDialog> {
        match &self.snapshot.screen {
            Screen::Home { create_dialog, .. } => create_dialog.as_ref(),
            _ => None,
        }
    }

    fn open_group(&self) -> Option<&Group> {
        match &self.snapshot.screen {
            Screen::GroupDetail { group } | Screen::EntryForm { group, .. } => Some(&**group),
            Screen::Home { .. } => None,
        }
    }

    fn form_values(&self) -> &[FieldValue] {
        match &self.snapshot.screen {
            Screen::EntryForm { values, .. } => values,
            _ => &[],
        }
    }
}

fn clamped(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(selected.map_or(0, |i| i.min(len - 1)))
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Up,
    Down,
    PageUp,
    PageDown,
    First,
    Last,
}

fn moved(selected: Option<usize>, len: usize, movement: Move) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let i = selected.unwrap_or(0);
    let next = match movement {
        Move::Up => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        Move::Down => {
            if i + 1 >= len {
                0
            } else {
                i + 1
            }
        }
        Move::PageUp => i.saturating_sub(5),
        Move::PageDown => (i + 5).min(len - 1),
        Move::First => 0,
        Move::Last => len - 1,
    };
    Some(next)
}

fn key_movement(key: KeyEvent) -> Option<Move> {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Move::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(Move::Up),
        KeyCode::PageDown => Some(Move::PageDown),
        KeyCode::PageUp => Some(Move::PageUp),
        KeyCode::Home | KeyCode::Char('g') => Some(Move::First),
        KeyCode::End | KeyCode::Char('G') => Some(Move::Last),
        _ => None,
    }
}

/// Apply an editing key to `input`. Returns whether the content changed.
fn edit_input(input: &mut TextInput, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('a') => input.move_home(),
            KeyCode::Char('e') => input.move_end(),
            KeyCode::Char('u') => {
                let changed = !input.content.is_empty();
                input.reset();
                return changed;
            }
            _ => {}
        }
        return false;
    }
    match key.code {
        KeyCode::Char(c) => {
            input.insert(c);
            true
        }
        KeyCode::Backspace => {
            let changed = input.cursor > 0;
            input.delete_back();
            changed
        }
        KeyCode::Left => {
            input.move_left();
            false
        }
        KeyCode::Right => {
            input.move_right();
            false
        }
        KeyCode::Home => {
            input.move_home();
            false
        }
        KeyCode::End => {
            input.move_end();
            false
        }
        _ => false,
    }
}

pub fn run() -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    info!("terminal session started");

    let mut app = App::new();
    let result = event_loop(&mut terminal, &mut app);

    restore_terminal(terminal)?;
    info!(
        groups = app.session.store().len(),
        "terminal session ended"
    );
    result
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| render_app(frame, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(app, key) {
                    return Ok(());
                }
            }
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    app.status = None;

    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
            app.show_help = false;
        }
        return false;
    }

    match app.mode() {
        Mode::Home => handle_home_key(app, key),
        Mode::CreateDialog => {
            handle_dialog_key(app, key);
            false
        }
        Mode::GroupDetail => handle_detail_key(app, key),
        Mode::EntryForm => {
            handle_form_key(app, key);
            false
        }
    }
}

fn handle_home_key(app: &mut App, key: KeyEvent) -> bool {
    if let Some(movement) = key_movement(key) {
        let len = app.groups().len();
        app.group_state
            .select(moved(app.group_state.selected(), len, movement));
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('c') => open_create_dialog(app),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => open_selected_group(app),
        _ => {}
    }
    false
}

fn open_create_dialog(app: &mut App) {
    app.dispatch(Action::OpenCreateDialog);
    app.dialog_focus = DialogFocus::Name;
    app.field_state.select(None);
    load_dialog_input(app);
}

fn open_selected_group(app: &mut App) {
    let Some(group_id) = app
        .group_state
        .selected()
        .and_then(|i| app.groups().get(i))
        .map(|group| group.id())
    else {
        return;
    };
    app.dispatch(Action::OpenGroup { group_id });
    app.entry_state.select(None);
    app.clamp_selection();
}

fn load_dialog_input(app: &mut App) {
    let content = match (app.dialog(), app.dialog_focus) {
        (Some(dialog), DialogFocus::Name) => dialog.draft.name().to_string(),
        (Some(dialog), DialogFocus::FieldName) => dialog.draft.pending_field_name().to_string(),
        _ => String::new(),
    };
    app.input = TextInput::with_content(content);
}

fn handle_dialog_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            app.dispatch(Action::CloseCreateDialog);
            app.input.reset();
            app.status = Some("Group creation cancelled".into());
            return;
        }
        KeyCode::Char('s') if ctrl => {
            submit_group(app);
            return;
        }
        KeyCode::Tab => {
            app.dialog_focus = app.dialog_focus.next();
            load_dialog_input(app);
            return;
        }
        KeyCode::BackTab => {
            app.dialog_focus = app.dialog_focus.prev();
            load_dialog_input(app);
            return;
        }
        _ => {}
    }

    let can_create = app.dialog().is_some_and(|dialog| dialog.can_create);
    match app.dialog_focus {
        DialogFocus::Name => {
            if key.code == KeyCode::Enter {
                if can_create {
                    submit_group(app);
                } else {
                    app.dialog_focus = DialogFocus::FieldName;
                    load_dialog_input(app);
                }
            } else if edit_input(&mut app.input, key) {
                app.dispatch(Action::SetGroupName {
                    name: app.input.content.clone(),
                });
            }
        }
        DialogFocus::FieldName => {
            if key.code == KeyCode::Enter {
                app.dispatch(Action::AddPendingField);
                load_dialog_input(app);
            } else if edit_input(&mut app.input, key) {
                app.dispatch(Action::SetPendingFieldName {
                    name: app.input.content.clone(),
                });
            }
        }
        DialogFocus::Fields => {
            if let Some(movement) = key_movement(key) {
                let len = app.dialog().map_or(0, |dialog| dialog.draft.fields().len());
                app.field_state
                    .select(moved(app.field_state.selected(), len, movement));
                return;
            }
            match key.code {
                KeyCode::Char('x') | KeyCode::Delete | KeyCode::Backspace => {
                    remove_selected_field(app);
                }
                KeyCode::Enter if can_create => submit_group(app),
                _ => {}
            }
        }
    }
}

fn remove_selected_field(app: &mut App) {
    let Some(field_id) = app.field_state.selected().and_then(|i| {
        app.dialog()
            .and_then(|dialog| dialog.draft.fields().get(i))
            .map(|field| field.id())
    }) else {
        return;
    };
    app.dispatch(Action::RemoveField { field_id });
}

fn submit_group(app: &mut App) {
    let name = app
        .dialog()
        .map(|dialog| dialog.draft.name().trim().to_string())
        .unwrap_or_default();
    app.dispatch(Action::CreateGroup);
    if app.snapshot.outcome == Outcome::Applied {
        app.input.reset();
        let last = app.groups().len();
        app.group_state.select(last.checked_sub(1));
        app.status = Some(format!("Created group {name}"));
    }
}

fn handle_detail_key(app: &mut App, key: KeyEvent) -> bool {
    if let Some(movement) = key_movement(key) {
        let len = app.open_group().map_or(0, |group| group.entries().len());
        app.entry_state
            .select(moved(app.entry_state.selected(), len, movement));
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('a') => open_entry_form(app),
        KeyCode::Char('x') | KeyCode::Char('d') | KeyCode::Delete => delete_selected_entry(app),
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Backspace | KeyCode::Left => {
            app.dispatch(Action::GoHome);
            app.entry_state.select(None);
        }
        _ => {}
    }
    false
}

fn delete_selected_entry(app: &mut App) {
    let Some(index) = app.entry_state.selected() else {
        return;
    };
    app.dispatch(Action::DeleteEntry { index });
    if app.snapshot.outcome == Outcome::Applied {
        app.status = Some(format!("Deleted entry {}", index + 1));
    }
}

fn open_entry_form(app: &mut App) {
    app.dispatch(Action::OpenEntryForm);
    app.form_index = 0;
    load_form_input(app);
}

fn load_form_input(app: &mut App) {
    let content = app
        .form_values()
        .get(app.form_index)
        .map(|field| field.value.clone())
        .unwrap_or_default();
    app.input = TextInput::with_content(content);
}

fn handle_form_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let len = app.form_values().len();
    match key.code {
        KeyCode::Esc => {
            app.dispatch(Action::CancelEntry);
            app.input.reset();
            app.status = Some("Entry discarded".into());
        }
        KeyCode::Enter => save_entry(app),
        KeyCode::Char('s') if ctrl => save_entry(app),
        KeyCode::Tab | KeyCode::Down if len > 0 => {
            app.form_index = (app.form_index + 1) % len;
            load_form_input(app);
        }
        KeyCode::BackTab | KeyCode::Up if len > 0 => {
            app.form_index = (app.form_index + len - 1) % len;
            load_form_input(app);
        }
        _ => {
            let Some(field) = app
                .form_values()
                .get(app.form_index)
                .map(|field| field.name.clone())
            else {
                return;
            };
            if edit_input(&mut app.input, key) {
                app.dispatch(Action::SetEntryValue {
                    field,
                    value: app.input.content.clone(),
                });
            }
        }
    }
}

fn save_entry(app: &mut App) {
    app.dispatch(Action::SaveEntry);
    app.input.reset();
    if app.snapshot.outcome == Outcome::Applied {
        let last = app.open_group().map_or(0, |group| group.entries().len());
        app.entry_state.select(last.checked_sub(1));
        app.status = Some("Entry saved".into());
    }
}

fn render_app(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(size);

    render_header(frame, chunks[0], app);

    match &app.snapshot.screen {
        Screen::Home { groups, .. } => render_home(frame, chunks[1], app, groups),
        Screen::GroupDetail { group } => render_group_detail(frame, chunks[1], app, group),
        Screen::EntryForm { group, values } => {
            render_entry_form(frame, chunks[1], app, group, values);
        }
    }

    render_guide_bar(frame, chunks[2], app);

    if let Some(dialog) = app.dialog() {
        render_create_dialog(frame, size, app, dialog);
    }

    if app.show_help {
        render_help_popup(frame, size, help_text(app));
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let title_style = Style::default().add_modifier(Modifier::BOLD);
    let line = match &app.snapshot.screen {
        Screen::Home { .. } => Line::from(vec![
            Span::styled("Group Manager", title_style),
            Span::styled(
                "  Organize and manage your custom data groups",
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Screen::GroupDetail { group } => Line::from(vec![
            Span::styled(group.name().to_string(), title_style),
            Span::styled(
                format!("  {}", entry_count_label(group.entries().len())),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Screen::EntryForm { group, .. } => Line::from(vec![
            Span::styled("Add Entry", title_style),
            Span::styled(
                format!("  to {}", group.name()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    };
    let header =
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Groupkeep"));
    frame.render_widget(header, area);
}

fn render_home(frame: &mut Frame, area: Rect, app: &App, groups: &[Arc<Group>]) {
    let block = Block::default().borders(Borders::ALL).title("Your Groups");

    if groups.is_empty() {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "No groups yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Create your first group to start organizing your data with custom fields"),
            Line::from(""),
            Line::from(Span::styled(
                "Press c to create a group",
                Style::default().fg(Color::Cyan),
            )),
        ];
        let empty = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items = groups
        .iter()
        .map(|group| {
            let mut details: Vec<Span> = field_preview(group.field_names(), FIELD_PREVIEW_LIMIT)
                .into_iter()
                .map(|badge| Span::styled(format!("[{badge}] "), Style::default().fg(Color::Cyan)))
                .collect();
            details.push(Span::styled(
                format!(" {}", entry_count_label(group.entries().len())),
                Style::default().fg(Color::DarkGray),
            ));
            ListItem::new(vec![
                Line::from(Span::styled(
                    group.name().to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(details),
            ])
        })
        .collect::<Vec<_>>();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut app.group_state.clone());
}

fn render_group_detail(frame: &mut Frame, area: Rect, app: &App, group: &Group) {
    let block = Block::default().borders(Borders::ALL).title("Entries");

    if group.entries().is_empty() {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "No entries yet",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Add your first entry to this group"),
            Line::from(""),
            Line::from(Span::styled(
                "Press a to add an entry",
                Style::default().fg(Color::Cyan),
            )),
        ];
        let empty = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let columns = u32::try_from(group.fields().len()).unwrap_or(1).max(1);
    let widths = group
        .fields()
        .iter()
        .map(|_| Constraint::Ratio(1, columns))
        .collect::<Vec<_>>();
    let header = Row::new(group.field_names().map(str::to_string))
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));
    let rows = group
        .entries()
        .iter()
        .map(|entry| {
            Row::new(
                group
                    .field_names()
                    .map(|name| display_value(entry.get(name).unwrap_or_default()).to_string()),
            )
        })
        .collect::<Vec<_>>();
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    frame.render_stateful_widget(table, area, &mut app.entry_state.clone());
}

fn render_entry_form(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    group: &Group,
    values: &[FieldValue],
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("New entry for {}", group.name()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut constraints = vec![Constraint::Length(3); values.len()];
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Min(0));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, field) in values.iter().enumerate() {
        let focused = i == app.form_index;
        let text = if focused {
            app.input.content.as_str()
        } else {
            field.value.as_str()
        };
        render_text_input(
            frame,
            chunks[i],
            &field.name,
            text,
            &field_placeholder(&field.name),
            focused,
        );
        if focused {
            set_input_cursor(frame, chunks[i], &app.input);
        }
    }

    let buttons = Paragraph::new(Line::from(vec![
        Span::styled(" Esc ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("Cancel    "),
        Span::styled(" Enter ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw("Save Entry"),
    ]));
    frame.render_widget(buttons, chunks[values.len()]);
}

fn render_create_dialog(frame: &mut Frame, area: Rect, app: &App, dialog: &CreateDialog) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(
        Block::default().borders(Borders::ALL).title("Create New Group"),
        popup_area,
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .margin(1)
        .split(popup_area);

    let name_focused = app.dialog_focus == DialogFocus::Name;
    let name = if name_focused {
        app.input.content.as_str()
    } else {
        dialog.draft.name()
    };
    render_text_input(frame, chunks[0], "Group Name", name, "Enter group name...", name_focused);

    let field_focused = app.dialog_focus == DialogFocus::FieldName;
    let pending = if field_focused {
        app.input.content.as_str()
    } else {
        dialog.draft.pending_field_name()
    };
    render_text_input(
        frame,
        chunks[1],
        "Custom Field",
        pending,
        "Field name (e.g., Email, Phone)",
        field_focused,
    );

    let items = dialog
        .draft
        .fields()
        .iter()
        .map(|field| ListItem::new(field.name().to_string()))
        .collect::<Vec<_>>();
    let fields_list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Fields ({})", dialog.draft.fields().len()))
                .border_style(focus_style(app.dialog_focus == DialogFocus::Fields)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    frame.render_stateful_widget(fields_list, chunks[2], &mut app.field_state.clone());

    if !dialog.duplicate_field_names.is_empty() {
        let warning = Paragraph::new(format!(
            "Duplicate field names: {}",
            dialog.duplicate_field_names.join(", ")
        ))
        .style(Style::default().fg(Color::Red));
        frame.render_widget(warning, chunks[3]);
    }

    let button = if dialog.can_create {
        Paragraph::new("[ Create Group ]")
            .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Paragraph::new("[ Create Group ] needs name and field")
            .style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(button.alignment(Alignment::Center), chunks[4]);

    let help = Paragraph::new("Tab: Focus | Enter: Add field | Ctrl+S: Create | Esc: Cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[5]);

    match app.dialog_focus {
        DialogFocus::Name => set_input_cursor(frame, chunks[0], &app.input),
        DialogFocus::FieldName => set_input_cursor(frame, chunks[1], &app.input),
        DialogFocus::Fields => {}
    }
}

fn render_text_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    text: &str,
    placeholder: &str,
    focused: bool,
) {
    let content = if text.is_empty() {
        Paragraph::new(placeholder).style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(text)
    };
    let widget = content.block(
        Block::default()
            .borders(Borders::ALL)
            .title(title.to_string())
            .border_style(focus_style(focused)),
    );
    frame.render_widget(widget, area);
}

fn set_input_cursor(frame: &mut Frame, area: Rect, input: &TextInput) {
    let offset = u16::try_from(input.cursor).unwrap_or(u16::MAX);
    let cx = area.x + 1 + offset.min(area.width.saturating_sub(3));
    frame.set_cursor(cx, area.y + 1);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn render_guide_bar(frame: &mut Frame, area: Rect, app: &App) {
    let hints = get_key_hints(app);
    let spans: Vec<Span> = hints
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    format!(" [{key}] "),
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
                ),
                Span::raw(format!("{desc}  ")),
            ]
        })
        .collect();

    let title = app.status.clone().unwrap_or_else(|| "Guide".to_string());
    let guide = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(guide, area);
}

fn get_key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.show_help {
        return vec![("?", "Close Help")];
    }

    match app.mode() {
        Mode::Home => {
            let mut hints = vec![("q", "Quit"), ("?", "Help"), ("c", "Create Group")];
            if !app.groups().is_empty() {
                hints.extend_from_slice(&[("↑/↓", "Nav"), ("Enter", "Open")]);
            }
            hints
        }
        Mode::CreateDialog => vec![
            ("Tab", "Focus"),
            ("Enter", "Add Field"),
            ("x", "Remove Field"),
            ("Ctrl+S", "Create"),
            ("Esc", "Cancel"),
        ],
        Mode::GroupDetail => {
            let mut hints = vec![("q", "Quit"), ("?", "Help"), ("a", "Add Entry")];
            if app.open_group().is_some_and(|group| !group.entries().is_empty()) {
                hints.extend_from_slice(&[("↑/↓", "Nav"), ("x", "Delete")]);
            }
            hints.push(("Esc", "Back"));
            hints
        }
        Mode::EntryForm => vec![("Tab", "Next Field"), ("Enter", "Save"), ("Esc", "Cancel")],
    }
}

fn render_help_popup(frame: &mut Frame, area: Rect, content: &str) {
    let popup_area = centered_rect(70, 40, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Help");
    let help = Paragraph::new(content).block(block).wrap(Wrap { trim: true });
    frame.render_widget(help, popup_area);
}

fn help_text(app: &App) -> &'static str {
    match app.mode() {
        Mode::Home | Mode::CreateDialog => {
            "c: create a group\n↑/↓ or j/k: move\nenter: open group\n?: toggle help\nq: quit"
        }
        Mode::GroupDetail => {
            "a: add entry\n↑/↓ or j/k: move\nx/d: delete selected entry\n\
             esc/h: back to groups\n?: toggle help\nq: quit"
        }
        Mode::EntryForm => "tab/shift+tab: switch field\nenter or ctrl+s: save entry\nesc: cancel",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_core::View;
    use ratatui::backend::TestBackend;

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl(app: &mut App, c: char) -> bool {
        handle_key(app, KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn create_contacts(app: &mut App) {
        press(app, KeyCode::Char('c'));
        type_text(app, "Contacts");
        press(app, KeyCode::Tab);
        type_text(app, "Email");
        press(app, KeyCode::Enter);
        type_text(app, "Phone");
        press(app, KeyCode::Enter);
        ctrl(app, 's');
    }

    fn add_entry(app: &mut App, email: &str) {
        press(app, KeyCode::Char('a'));
        type_text(app, email);
        press(app, KeyCode::Enter);
    }

    fn emails(app: &App) -> Vec<String> {
        app.open_group()
            .expect("group open")
            .entries()
            .iter()
            .map(|entry| entry.get("Email").unwrap_or_default().to_string())
            .collect()
    }

    fn render(app: &App) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal
            .draw(|frame| render_app(frame, app))
            .expect("render");
        buffer_to_string(terminal.backend().buffer())
    }

    fn buffer_to_string(buffer: &ratatui::buffer::Buffer) -> String {
        let mut lines = Vec::new();
        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                let cell = buffer.get(x, y);
                line.push_str(cell.symbol());
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    fn hint_line(app: &App) -> String {
        get_key_hints(app)
            .iter()
            .map(|(key, desc)| format!("[{key}] {desc}"))
            .collect::<Vec<_>>()
            .join("  ")
    }

    #[test]
    fn text_input_handles_multibyte_chars() {
        let mut input = TextInput::with_content("café");
        input.move_left();
        input.insert('x');
        assert_eq!(input.content, "cafxé");
        input.move_end();
        input.delete_back();
        assert_eq!(input.content, "cafx");
        input.move_home();
        input.delete_back();
        assert_eq!(input.content, "cafx");
    }

    #[test]
    fn selection_wraps_and_clamps() {
        assert_eq!(moved(Some(0), 3, Move::Up), Some(2));
        assert_eq!(moved(Some(2), 3, Move::Down), Some(0));
        assert_eq!(moved(Some(1), 3, Move::PageDown), Some(2));
        assert_eq!(moved(None, 0, Move::Down), None);
        assert_eq!(clamped(Some(4), 2), Some(1));
        assert_eq!(clamped(None, 2), Some(0));
        assert_eq!(clamped(Some(0), 0), None);
    }

    #[test]
    fn creates_group_from_keys() {
        let mut app = App::new();
        create_contacts(&mut app);

        assert_eq!(app.mode(), Mode::Home);
        let groups = app.session.store().list_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), "Contacts");
        assert_eq!(groups[0].field_names().collect::<Vec<_>>(), vec!["Email", "Phone"]);
        assert_eq!(app.group_state.selected(), Some(0));
        assert_eq!(app.status.as_deref(), Some("Created group Contacts"));
    }

    #[test]
    fn create_needs_a_field() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "Contacts");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.dialog_focus, DialogFocus::FieldName);

        ctrl(&mut app, 's');

        assert!(app.session.store().is_empty());
        assert_eq!(app.mode(), Mode::CreateDialog);
        assert!(matches!(app.snapshot.outcome, Outcome::Rejected(_)));
        assert!(!app
            .status
            .as_deref()
            .is_some_and(|status| status.starts_with("Created group")));
    }

    #[test]
    fn second_group_is_selected_after_create() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "Books");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Title");
        press(&mut app, KeyCode::Enter);
        ctrl(&mut app, 's');

        assert_eq!(app.session.store().len(), 2);
        assert_eq!(app.group_state.selected(), Some(1));
        assert_eq!(app.status.as_deref(), Some("Created group Books"));
    }

    #[test]
    fn field_can_be_removed_from_dialog() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('c'));
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Email");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "Phone");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('x'));

        let names: Vec<&str> = app
            .dialog()
            .expect("dialog open")
            .draft
            .fields()
            .iter()
            .map(|field| field.name())
            .collect();
        assert_eq!(names, vec!["Phone"]);
    }

    #[test]
    fn escape_cancels_dialog() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('c'));
        type_text(&mut app, "Contacts");

        press(&mut app, KeyCode::Esc);

        assert_eq!(app.mode(), Mode::Home);
        assert!(app.session.group_draft().is_empty());
        assert!(!press(&mut app, KeyCode::Char('x')));
    }

    #[test]
    fn quit_is_not_triggered_while_typing() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('c'));
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.session.group_draft().name(), "q");
        press(&mut app, KeyCode::Esc);
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn entry_flow_from_keys() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode(), Mode::GroupDetail);

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "a@b.com");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "555");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode(), Mode::GroupDetail);
        let group = app.open_group().expect("group open");
        assert_eq!(group.entries().len(), 1);
        assert_eq!(group.entries()[0].get("Email"), Some("a@b.com"));
        assert_eq!(group.entries()[0].get("Phone"), Some("555"));
        assert_eq!(app.entry_state.selected(), Some(0));
    }

    #[test]
    fn delete_selected_entry_from_keys() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        for email in ["e0", "e1", "e2"] {
            add_entry(&mut app, email);
        }
        assert_eq!(app.entry_state.selected(), Some(2));

        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Char('x'));

        assert_eq!(emails(&app), vec!["e0", "e2"]);
        assert_eq!(app.entry_state.selected(), Some(1));
    }

    #[test]
    fn escape_discards_entry() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "a@b.com");

        press(&mut app, KeyCode::Esc);

        assert_eq!(app.mode(), Mode::GroupDetail);
        assert!(emails(&app).is_empty());
        assert!(app.session.entry_draft().is_empty());

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.session.view(), View::Home);
    }

    #[test]
    fn render_empty_home() {
        let app = App::new();
        let screen = render(&app);
        assert!(screen.contains("Group Manager"));
        assert!(screen.contains("No groups yet"));
        assert!(screen.contains("Press c to create a group"));
    }

    #[test]
    fn render_group_list() {
        let mut app = App::new();
        create_contacts(&mut app);
        let screen = render(&app);
        assert!(screen.contains("Contacts"));
        assert!(screen.contains("[Email] [Phone]"));
        assert!(screen.contains("0 entries"));
    }

    #[test]
    fn render_create_dialog_disabled() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('c'));
        let screen = render(&app);
        assert!(screen.contains("Create New Group"));
        assert!(screen.contains("Enter group name..."));
        assert!(screen.contains("needs name and field"));
    }

    #[test]
    fn render_entries_with_blanks() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        add_entry(&mut app, "a@b.com");
        let screen = render(&app);
        assert!(screen.contains("1 entry"));
        assert!(screen.contains("a@b.com"));
        assert!(screen.contains(" - "));
    }

    #[test]
    fn render_entry_form_placeholders() {
        let mut app = App::new();
        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('a'));
        let screen = render(&app);
        assert!(screen.contains("Add Entry"));
        assert!(screen.contains("Enter email..."));
        assert!(screen.contains("Enter phone..."));
    }

    #[test]
    fn key_hints_follow_view() {
        let mut app = App::new();
        insta::assert_snapshot!(hint_line(&app), @"[q] Quit  [?] Help  [c] Create Group");

        create_contacts(&mut app);
        press(&mut app, KeyCode::Enter);
        insta::assert_snapshot!(hint_line(&app), @"[q] Quit  [?] Help  [a] Add Entry  [Esc] Back");

        press(&mut app, KeyCode::Char('a'));
        insta::assert_snapshot!(hint_line(&app), @"[Tab] Next Field  [Enter] Save  [Esc] Cancel");
    }

    #[test]
    fn help_toggles() {
        let mut app = App::new();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        assert!(render(&app).contains("c: create a group"));
        press(&mut app, KeyCode::Esc);
        assert!(!app.show_help);
    }
}
