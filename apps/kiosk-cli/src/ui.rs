use std::{
    collections::VecDeque,
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kiosk_types::ui::{
    ElementId, Tone, ATTEND_STATUS, CAPTURE_BUTTON, IDENTIFY_RESULT, NAME_INPUT, NO_USERS,
    PREVIEW, PUNCH_IN_BUTTON, PUNCH_MESSAGE, PUNCH_OUT_BUTTON, REGISTER_MESSAGE, SUBMIT_BUTTON,
    USER_ID_INPUT, USER_LIST,
};
use kiosk_workflow::{MemorySurface, SurfaceSnapshot};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Terminal,
};
use tokio::sync::mpsc::UnboundedSender;

const MAX_LOG_ENTRIES: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Register,
    Attend,
}

pub enum UiMessage {
    Info(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Capture,
    Retake,
    Submit,
    PunchIn,
    PunchOut,
    DeleteLast,
    Quit,
}

impl Page {
    fn title(self) -> &'static str {
        match self {
            Page::Register => "Register",
            Page::Attend => "Attendance",
        }
    }

    fn help(self) -> &'static str {
        match self {
            Page::Register => "c capture  r retake  s submit  d delete last  q quit",
            Page::Attend => "i punch in  o punch out  q quit",
        }
    }

    fn command_for(self, code: KeyCode) -> Option<KeyCommand> {
        match (self, code) {
            (_, KeyCode::Char('q') | KeyCode::Esc) => Some(KeyCommand::Quit),
            (Page::Register, KeyCode::Char('c')) => Some(KeyCommand::Capture),
            (Page::Register, KeyCode::Char('r')) => Some(KeyCommand::Retake),
            (Page::Register, KeyCode::Char('s')) => Some(KeyCommand::Submit),
            (Page::Register, KeyCode::Char('d')) => Some(KeyCommand::DeleteLast),
            (Page::Attend, KeyCode::Char('i')) => Some(KeyCommand::PunchIn),
            (Page::Attend, KeyCode::Char('o')) => Some(KeyCommand::PunchOut),
            _ => None,
        }
    }
}

pub fn run(
    page: Page,
    surface: MemorySurface,
    commands: UnboundedSender<KeyCommand>,
    receiver: Receiver<UiMessage>,
    summary: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, page, &surface, &commands, receiver, &summary);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    res
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    page: Page,
    surface: &MemorySurface,
    commands: &UnboundedSender<KeyCommand>,
    receiver: Receiver<UiMessage>,
    summary: &str,
) -> Result<()> {
    let mut logs: VecDeque<Line<'static>> = VecDeque::with_capacity(MAX_LOG_ENTRIES);

    loop {
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    if logs.len() == MAX_LOG_ENTRIES {
                        logs.pop_front();
                    }
                    logs.push_back(format_message(message));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        let snapshot = surface.snapshot();
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Length(8),
                        Constraint::Min(0),
                    ]
                    .as_ref(),
                )
                .split(f.size());

            let header = Paragraph::new(Line::from(vec![
                Span::styled(
                    page.title(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled("backend:", Style::default().fg(Color::Magenta)),
                Span::raw(" "),
                Span::raw(summary),
                Span::raw("  "),
                Span::styled(page.help(), Style::default().fg(Color::Yellow)),
            ]))
            .block(Block::default().borders(Borders::ALL).title("Kiosk"));
            f.render_widget(header, chunks[0]);

            let body = match page {
                Page::Register => register_lines(&snapshot),
                Page::Attend => attend_lines(&snapshot),
            };
            let panel = Paragraph::new(body)
                .block(Block::default().borders(Borders::ALL).title("Page"));
            f.render_widget(panel, chunks[1]);

            let activity = List::new(logs.iter().rev().cloned().map(ListItem::new).collect::<Vec<_>>())
                .block(Block::default().borders(Borders::ALL).title("Recent activity"));
            match page {
                Page::Register => {
                    let columns = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
                        .split(chunks[2]);
                    let roster = List::new(roster_items(&snapshot))
                        .block(Block::default().borders(Borders::ALL).title("Registered users"));
                    f.render_widget(roster, columns[0]);
                    f.render_widget(activity, columns[1]);
                }
                Page::Attend => f.render_widget(activity, chunks[2]),
            }
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if let Some(command) = page.command_for(key.code) {
                    let closed = commands.send(command).is_err();
                    if command == KeyCommand::Quit || closed {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Neutral => Style::default(),
        Tone::Success => Style::default().fg(Color::Green),
        Tone::Error => Style::default().fg(Color::Red),
    }
}

fn element_line(snapshot: &SurfaceSnapshot, label: &'static str, id: ElementId) -> Line<'static> {
    let element = snapshot.element(id);
    let text = if element.hidden { String::new() } else { element.text };
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::styled(text, tone_style(element.tone)),
    ])
}

fn button_span(snapshot: &SurfaceSnapshot, label: &'static str, id: ElementId) -> Span<'static> {
    if snapshot.element(id).disabled {
        Span::styled(format!("[{label}]"), Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            format!("[{label}]"),
            Style::default().add_modifier(Modifier::BOLD),
        )
    }
}

fn register_lines(snapshot: &SurfaceSnapshot) -> Vec<Line<'static>> {
    let preview = snapshot.element(PREVIEW);
    let view = match (&preview.image, preview.hidden) {
        (Some(uri), false) => format!("snapshot held ({} bytes)", uri.len()),
        _ => "live".to_string(),
    };
    vec![
        Line::from(format!(
            "user: {} / {}",
            snapshot.element(USER_ID_INPUT).value,
            snapshot.element(NAME_INPUT).value
        )),
        Line::from(format!("camera: {view}")),
        Line::from(vec![
            button_span(snapshot, "Capture", CAPTURE_BUTTON),
            Span::raw(" "),
            button_span(snapshot, "Submit", SUBMIT_BUTTON),
        ]),
        element_line(snapshot, "message:", REGISTER_MESSAGE),
    ]
}

fn attend_lines(snapshot: &SurfaceSnapshot) -> Vec<Line<'static>> {
    vec![
        element_line(snapshot, "status:", ATTEND_STATUS),
        Line::from(vec![
            button_span(snapshot, "Punch In", PUNCH_IN_BUTTON),
            Span::raw(" "),
            button_span(snapshot, "Punch Out", PUNCH_OUT_BUTTON),
        ]),
        element_line(snapshot, "result:", IDENTIFY_RESULT),
        element_line(snapshot, "message:", PUNCH_MESSAGE),
    ]
}

fn roster_items(snapshot: &SurfaceSnapshot) -> Vec<ListItem<'static>> {
    let rows = snapshot.items(USER_LIST);
    if rows.is_empty() && !snapshot.element(NO_USERS).hidden {
        return vec![ListItem::new("No users registered yet.")];
    }
    rows.iter()
        .map(|(_, label)| ListItem::new(label.clone()))
        .collect()
}

fn format_message(message: UiMessage) -> Line<'static> {
    match message {
        UiMessage::Info(text) => Line::from(text),
        UiMessage::Error(text) => Line::styled(text, Style::default().fg(Color::Red)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_to_their_page() {
        assert_eq!(
            Page::Register.command_for(KeyCode::Char('c')),
            Some(KeyCommand::Capture)
        );
        assert_eq!(Page::Attend.command_for(KeyCode::Char('c')), None);
        assert_eq!(
            Page::Attend.command_for(KeyCode::Char('o')),
            Some(KeyCommand::PunchOut)
        );
        assert_eq!(Page::Register.command_for(KeyCode::Esc), Some(KeyCommand::Quit));
    }

    #[test]
    fn hidden_messages_render_blank() {
        let surface = MemorySurface::new();
        kiosk_workflow::show_message(&surface, REGISTER_MESSAGE, "Registered.", Tone::Success);
        let line = element_line(&surface.snapshot(), "message:", REGISTER_MESSAGE);
        assert_eq!(line.spans[2].content, "Registered.");

        kiosk_workflow::UiSurface::set_hidden(&surface, REGISTER_MESSAGE, true);
        let line = element_line(&surface.snapshot(), "message:", REGISTER_MESSAGE);
        assert_eq!(line.spans[2].content, "");
    }
}
