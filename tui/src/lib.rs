//! TUI rendering and input handling for brancheck using ratatui.

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, List, ListItem, Paragraph},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

use brancheck_engine::{App, Field, ValidationStatus};

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(50);
const INPUT_CHANNEL_CAPACITY: usize = 256;
const MAX_EVENTS_PER_FRAME: usize = 64;

// ============================================================================
// Rendering
// ============================================================================

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Branch input
            Constraint::Length(3), // Description input
            Constraint::Length(1), // Validation status
            Constraint::Length(1), // Countdown gauge
            Constraint::Min(3),    // AI panels
            Constraint::Length(1), // Key hints
        ])
        .split(frame.area());

    draw_input_field(
        frame,
        chunks[0],
        "branch name",
        &app.branch(),
        app.focus() == Field::Branch,
    );
    draw_input_field(
        frame,
        chunks[1],
        "description (optional)",
        &app.description(),
        app.focus() == Field::Description,
    );
    draw_status(frame, chunks[2], app);
    draw_countdown(frame, chunks[3], app);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[4]);
    draw_panel(frame, panels[0], "AI suggestions", app.suggestions());
    draw_panel(frame, panels[1], "AI inferred tasks", app.inferred_tasks());

    let hints = Line::from(vec![
        Span::styled("tab", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" switch field  "),
        Span::styled("esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" quit"),
    ]);
    frame.render_widget(
        Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
        chunks[5],
    );
}

fn draw_input_field(frame: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(title.to_owned())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style);

    frame.render_widget(Paragraph::new(value.to_owned()).block(block), area);

    if focused {
        // Cursor sits one cell past the text, inside the border.
        let text_width = u16::try_from(value.width()).unwrap_or(u16::MAX);
        let x = (area.x + 1)
            .saturating_add(text_width)
            .min(area.right().saturating_sub(2));
        frame.set_cursor_position(Position::new(x, area.y + 1));
    }
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let status_style = match app.status() {
        ValidationStatus::Valid => Style::default().fg(Color::Green),
        ValidationStatus::Invalid => Style::default().fg(Color::Red),
        ValidationStatus::PatternBroken(_) => Style::default().fg(Color::Yellow),
        ValidationStatus::Unchecked | ValidationStatus::EmptyInput => {
            Style::default().fg(Color::DarkGray)
        }
    };

    let mut spans = vec![Span::styled(app.status().to_string(), status_style)];
    if let Some(failure) = app.last_failure() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            failure.to_owned(),
            Style::default().fg(Color::Red),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_countdown(frame: &mut Frame, area: Rect, app: &App) {
    let target = app.target_seconds();
    let remaining = (target - app.countdown_seconds()).max(0.0);
    let ratio = if target > 0.0 {
        f64::from(remaining / target)
    } else {
        0.0
    };

    let gauge = Gauge::default()
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("checks in {remaining:.1}s"))
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black));
    frame.render_widget(gauge, area);
}

fn draw_panel(frame: &mut Frame, area: Rect, title: &str, items: &[String]) {
    let rows: Vec<ListItem> = if items.is_empty() {
        vec![ListItem::new(Span::styled(
            "—",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        items.iter().map(|item| ListItem::new(item.clone())).collect()
    };

    let block = Block::default()
        .title(title.to_owned())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(List::new(rows).block(block), area);
}

// ============================================================================
// Input
// ============================================================================

enum InputMsg {
    Event(Event),
    Error(String),
}

/// Blocking crossterm reader on a dedicated thread, feeding a bounded
/// channel the frame loop drains without blocking.
pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);

        let join = tokio::task::spawn_blocking(move || input_loop(&stop2, &tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Close the receiver first so the reader thread unblocks if it is
        // backpressured on a send.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best-effort stop if the caller exits early; never block in Drop.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: &AtomicBool, tx: &mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Drain queued input events into the app. Returns `Ok(true)` when the user
/// asked to quit.
pub fn handle_events(app: &mut App, input: &mut InputPump) -> Result<bool> {
    let mut processed = 0;
    while processed < MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };

        if apply_event(app, &ev) {
            app.request_quit();
            return Ok(true);
        }
        processed += 1;
    }
    Ok(false)
}

/// Apply one terminal event. Returns true on a quit request.
fn apply_event(app: &mut App, ev: &Event) -> bool {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind: KeyEventKind::Press | KeyEventKind::Repeat,
        ..
    }) = ev
    else {
        return false;
    };

    match code {
        KeyCode::Esc => return true,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Tab | KeyCode::BackTab => app.toggle_focus(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Char(c) => app.insert_char(*c),
        _ => {}
    }
    false
}
