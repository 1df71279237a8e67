// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use codepanel_app::{
    Field, Notice, NoticeLevel, PanelCommand, PanelEvent, PanelState, Phase, RowBackend, RowForm,
    parse_hex_color,
};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Side effects the panel asks the host to perform.
pub trait LinkOpener {
    fn open_link(&mut self, url: &str) -> Result<()>;
}

/// Opens links in the desktop's default browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl LinkOpener for SystemBrowser {
    fn open_link(&mut self, url: &str) -> Result<()> {
        open::that(url).with_context(|| format!("open {url} in the system browser"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    selected: usize,
    add_visible: bool,
    focus: usize,
    help_visible: bool,
    status_token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyAction {
    Nothing,
    Quit,
    Command(PanelCommand),
}

pub fn run_app<B: RowBackend + ?Sized>(
    state: &mut PanelState,
    backend: &mut B,
    title: &str,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let mut opener = SystemBrowser;
    let (internal_tx, internal_rx) = mpsc::channel();

    state.mark_loading();
    let mut result = terminal
        .draw(|frame| render(frame, state, &view_data, title))
        .map(|_| ())
        .context("draw frame");
    if result.is_ok() {
        let events = state.dispatch(backend, PanelCommand::Load);
        apply_events(state, &mut view_data, &mut opener, &internal_tx, &events);
    }

    while result.is_ok() {
        process_internal_events(state, backend, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data, title)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if !has_event {
            continue;
        }
        if let Event::Key(key) = event::read().context("read event")? {
            let mut draw_loading = |state: &PanelState, view_data: &ViewData| -> Result<()> {
                terminal
                    .draw(|frame| render(frame, state, view_data, title))
                    .map(|_| ())
                    .context("draw loading frame")
            };
            match handle_key_event(
                state,
                backend,
                &mut opener,
                &mut view_data,
                &internal_tx,
                key,
                &mut draw_loading,
            ) {
                Ok(true) => break,
                Ok(false) => {}
                Err(error) => result = Err(error),
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<B: RowBackend + ?Sized>(
    state: &mut PanelState,
    backend: &mut B,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(backend, PanelCommand::ClearNotice);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn bump_status(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Runs one key press to completion. Returns `true` when the app should
/// quit. `before_remote` is called with the loading state before any command
/// that talks to the backend.
fn handle_key_event<B, L>(
    state: &mut PanelState,
    backend: &mut B,
    opener: &mut L,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    before_remote: &mut dyn FnMut(&PanelState, &ViewData) -> Result<()>,
) -> Result<bool>
where
    B: RowBackend + ?Sized,
    L: LinkOpener,
{
    let command = match key_action(state, view_data, key) {
        KeyAction::Quit => return Ok(true),
        KeyAction::Nothing => return Ok(false),
        KeyAction::Command(command) => command,
    };

    if command.is_remote() {
        state.mark_loading();
        before_remote(state, view_data)?;
    }
    tracing::debug!(?command, "dispatch");
    let events = state.dispatch(backend, command);
    apply_events(state, view_data, opener, internal_tx, &events);
    Ok(false)
}

fn key_action(state: &PanelState, view_data: &mut ViewData, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return KeyAction::Quit;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            view_data.help_visible = false;
        }
        return KeyAction::Nothing;
    }

    let fields = state.settings().profile.fields();
    if let Some(edit) = &state.edit {
        return form_key_action(&edit.form, fields, view_data, key, FormTarget::Edit);
    }
    if view_data.add_visible {
        return form_key_action(&state.add_form, fields, view_data, key, FormTarget::Add);
    }

    let selected_key = state
        .rows
        .get(view_data.selected)
        .map(|row| row.key.clone());
    match key.code {
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Char('j') | KeyCode::Down => {
            if view_data.selected + 1 < state.rows.len() {
                view_data.selected += 1;
            }
            KeyAction::Nothing
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.selected = view_data.selected.saturating_sub(1);
            KeyAction::Nothing
        }
        KeyCode::Char('g') | KeyCode::Home => {
            view_data.selected = 0;
            KeyAction::Nothing
        }
        KeyCode::Char('G') | KeyCode::End => {
            view_data.selected = state.rows.len().saturating_sub(1);
            KeyAction::Nothing
        }
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            KeyAction::Nothing
        }
        KeyCode::Char('a') => {
            view_data.add_visible = true;
            view_data.focus = 0;
            KeyAction::Nothing
        }
        KeyCode::Char('r') => KeyAction::Command(PanelCommand::Load),
        KeyCode::Char('e') | KeyCode::Enter => selected_key
            .map(|key| KeyAction::Command(PanelCommand::OpenEdit(key)))
            .unwrap_or(KeyAction::Nothing),
        KeyCode::Char('d') => selected_key
            .map(|key| KeyAction::Command(PanelCommand::Delete(key)))
            .unwrap_or(KeyAction::Nothing),
        KeyCode::Char('o') => selected_key
            .map(|key| KeyAction::Command(PanelCommand::OpenLink(key)))
            .unwrap_or(KeyAction::Nothing),
        _ => KeyAction::Nothing,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormTarget {
    Add,
    Edit,
}

fn form_key_action(
    form: &RowForm,
    fields: &[Field],
    view_data: &mut ViewData,
    key: KeyEvent,
    target: FormTarget,
) -> KeyAction {
    let focused = fields
        .get(view_data.focus)
        .copied()
        .unwrap_or(Field::Codes);
    let set = |value: String| match target {
        FormTarget::Add => PanelCommand::SetAddField(focused, value),
        FormTarget::Edit => PanelCommand::SetEditField(focused, value),
    };

    match key.code {
        KeyCode::Esc => match target {
            FormTarget::Add => {
                view_data.add_visible = false;
                KeyAction::Nothing
            }
            FormTarget::Edit => KeyAction::Command(PanelCommand::CancelEdit),
        },
        KeyCode::Enter => KeyAction::Command(match target {
            FormTarget::Add => PanelCommand::SubmitAdd,
            FormTarget::Edit => PanelCommand::SubmitEdit,
        }),
        KeyCode::Tab | KeyCode::Down => {
            view_data.focus = (view_data.focus + 1) % fields.len().max(1);
            KeyAction::Nothing
        }
        KeyCode::BackTab | KeyCode::Up => {
            let len = fields.len().max(1);
            view_data.focus = (view_data.focus + len - 1) % len;
            KeyAction::Nothing
        }
        KeyCode::Backspace => {
            let mut value = form.value(focused).to_owned();
            value.pop();
            KeyAction::Command(set(value))
        }
        KeyCode::Char(ch) => {
            let mut value = form.value(focused).to_owned();
            value.push(ch);
            KeyAction::Command(set(value))
        }
        _ => KeyAction::Nothing,
    }
}

fn apply_events<L: LinkOpener>(
    state: &mut PanelState,
    view_data: &mut ViewData,
    opener: &mut L,
    internal_tx: &Sender<InternalEvent>,
    events: &[PanelEvent],
) {
    for event in events {
        match event {
            PanelEvent::RowsLoaded(count) => {
                view_data.selected = view_data.selected.min(count.saturating_sub(1));
            }
            PanelEvent::RowAdded(_) => view_data.add_visible = false,
            PanelEvent::ModalOpened(_) => view_data.focus = 0,
            PanelEvent::NoticeRaised(_) => bump_status(view_data, internal_tx),
            PanelEvent::LinkReady(url) => {
                if let Err(error) = opener.open_link(url.as_str()) {
                    tracing::warn!(%url, error = %format!("{error:#}"), "open link");
                    state.set_notice(Notice::error(format!(
                        "{error:#} -- copy the link instead: {url}"
                    )));
                    bump_status(view_data, internal_tx);
                }
            }
            PanelEvent::PhaseChanged(_)
            | PanelEvent::RowUpdated { .. }
            | PanelEvent::RowDeleted(_)
            | PanelEvent::ModalClosed
            | PanelEvent::FieldEdited(_)
            | PanelEvent::NoticeCleared => {}
        }
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &PanelState, view_data: &ViewData, title: &str) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state, title))
        .style(Style::default().fg(Color::White))
        .block(Block::default().title("codepanel").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], state, view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(status_color(state.notice.as_ref())))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    let fields = state.settings().profile.fields();
    if view_data.add_visible && state.edit.is_none() {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let form = Paragraph::new(form_text(&state.add_form, fields, view_data.focus))
            .block(Block::default().title("add code").borders(Borders::ALL));
        frame.render_widget(form, area);
    }

    if let Some(edit) = &state.edit {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let form = Paragraph::new(form_text(&edit.form, fields, view_data.focus)).block(
            Block::default()
                .title(format!("edit {}", edit.snapshot.fields.codes))
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(form, area);
    }

    if state.phase == Phase::Loading {
        let area = centered_rect(30, 20, frame.area());
        frame.render_widget(Clear, area);
        let loading = Paragraph::new("loading...")
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().add_modifier(Modifier::BOLD));
        frame.render_widget(loading, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_text(state: &PanelState, title: &str) -> String {
    let count = state.rows.len();
    let noun = if count == 1 { "row" } else { "rows" };
    format!("{title} | {count} {noun}")
}

fn render_table(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &PanelState,
    view_data: &ViewData,
) {
    let header = Row::new(["Code", "URL Name", "Color"].map(|label| {
        Cell::from(label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = state.rows.iter().enumerate().map(|(index, row)| {
        let selected = index == view_data.selected;
        let base = if selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let color = row.fields.color_id.as_deref().unwrap_or_default();
        Row::new(vec![
            Cell::from(row.fields.codes.clone()).style(base),
            Cell::from(row.fields.url_name.clone().unwrap_or_default()).style(base),
            Cell::from(color.to_owned()).style(swatch_style(color).unwrap_or(base)),
        ])
    });

    let widths = [
        Constraint::Percentage(30),
        Constraint::Percentage(50),
        Constraint::Percentage(20),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title("codes").borders(Borders::ALL));
    frame.render_widget(table, area);
}

/// Tints a color cell with its own value when it parses as a hex color.
fn swatch_style(value: &str) -> Option<Style> {
    let (r, g, b) = parse_hex_color(value)?;
    let luminance = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    let fg = if luminance > 128_000 {
        Color::Black
    } else {
        Color::White
    };
    Some(Style::default().bg(Color::Rgb(r, g, b)).fg(fg))
}

fn form_text(form: &RowForm, fields: &[Field], focus: usize) -> String {
    let mut lines = Vec::with_capacity(fields.len() + 2);
    for (index, field) in fields.iter().enumerate() {
        let marker = if index == focus { ">" } else { " " };
        let cursor = if index == focus { "_" } else { "" };
        lines.push(format!("{marker} {}: {}{cursor}", field.label(), form.value(*field)));
    }
    lines.push(String::new());
    lines.push("tab next | enter save | esc cancel".to_owned());
    lines.join("\n")
}

fn status_text(state: &PanelState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let (mode, hints) = if state.phase == Phase::Loading {
        ("LOADING", "")
    } else if state.edit.is_some() {
        ("EDIT", "tab/shift+tab field | enter save | esc cancel")
    } else if view_data.add_visible {
        ("ADD", "tab/shift+tab field | enter add | esc close")
    } else {
        ("NAV", "j/k move | a add | e edit | d delete | o link | r reload | ? help | q quit")
    };

    let mut parts = vec![mode.to_owned()];
    if let Some(notice) = &state.notice {
        parts.push(notice.message.clone());
    }
    if !hints.is_empty() {
        parts.push(hints.to_owned());
    }
    parts.join(" | ")
}

fn status_color(notice: Option<&Notice>) -> Color {
    match notice.map(|notice| notice.level) {
        Some(NoticeLevel::Error) => Color::Red,
        Some(NoticeLevel::Warning) => Color::Yellow,
        Some(NoticeLevel::Info) | None => Color::Green,
    }
}

fn help_overlay_text() -> &'static str {
    "\
j/k, up/down   move selection
g/G            first/last row
a              add a code
e, enter       edit the selected row
d              delete the selected row
o              open the landing link
r              reload from the backend
?              toggle this help
q, ctrl+q      quit

in forms: tab/shift+tab move between fields, enter saves, esc cancels"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
