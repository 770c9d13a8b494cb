use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers, MouseEvent,
    MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, SystemTime};

use crate::app::{App, InputMode, SearchMode};
use crate::net::{DataMessage, DataRequest};
use crate::ui;

const PAN_STEP: f64 = 0.2;
// Panning fires a server query only once the viewport stops moving.
const MOVE_SETTLE: Duration = Duration::from_millis(300);

pub fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
    rx: Receiver<DataMessage>,
    req_tx: Sender<DataRequest>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut moved_at: Option<SystemTime> = None;
    loop {
        while let Ok(message) = rx.try_recv() {
            app.apply_message(message);
        }

        if let Some(at) = moved_at {
            let settled = SystemTime::now()
                .duration_since(at)
                .map(|d| d >= MOVE_SETTLE)
                .unwrap_or(true);
            if settled {
                moved_at = None;
                if app.viewport.take_moved() {
                    app.on_viewport_moved();
                }
            }
        }

        for request in app.take_requests() {
            let _ = req_tx.send(request);
        }

        terminal.draw(|f| ui::ui(f, &mut app))?;

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => match app.input_mode {
                    InputMode::Normal => match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('1') => app.on_mode_selected(SearchMode::Location),
                        KeyCode::Char('2') => app.on_mode_selected(SearchMode::CurrentLocation),
                        KeyCode::Char('3') => app.on_mode_selected(SearchMode::Track),
                        KeyCode::Left => {
                            app.viewport.pan(-PAN_STEP, 0.0);
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Right => {
                            app.viewport.pan(PAN_STEP, 0.0);
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Up => {
                            app.viewport.pan(0.0, PAN_STEP);
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Down => {
                            app.viewport.pan(0.0, -PAN_STEP);
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            app.viewport.zoom_in();
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Char('-') => {
                            app.viewport.zoom_out();
                            moved_at = Some(SystemTime::now());
                        }
                        KeyCode::Tab => app.next_track(),
                        KeyCode::BackTab => app.prev_track(),
                        KeyCode::Char('j') => app.next_race(),
                        KeyCode::Char('k') => app.prev_race(),
                        KeyCode::Enter => app.select_cursor_track(),
                        KeyCode::Char('x') | KeyCode::Esc => app.clear_active_track(),
                        KeyCode::Char('v') => app.toggle_race_list(),
                        KeyCode::Char('f') => {
                            app.filter_cursor = 0;
                            app.input_mode = InputMode::FilterMenu;
                        }
                        KeyCode::Char('/') => {
                            if app.search_mode == SearchMode::Track {
                                app.begin_track_search();
                            }
                        }
                        KeyCode::Char('o') => app.open_active_website(),
                        KeyCode::Char('e') => app.email_active_track(),
                        KeyCode::Char('d') => app.navigate_to_active_track(),
                        KeyCode::Char('r') => app.retry(),
                        KeyCode::Char('t') => app.theme_mode = app.theme_mode.toggle(),
                        KeyCode::Char('l') => app.layout_mode = app.layout_mode.toggle(),
                        KeyCode::Char('?') | KeyCode::Char('h') => {
                            app.input_mode = InputMode::Help;
                        }
                        _ => {}
                    },
                    InputMode::FilterMenu => match key.code {
                        KeyCode::Esc | KeyCode::Char('f') => {
                            app.input_mode = InputMode::Normal;
                        }
                        KeyCode::Up => {
                            let count = app.filter_entries().len();
                            app.filter_cursor = (app.filter_cursor + count - 1) % count;
                        }
                        KeyCode::Down => {
                            let count = app.filter_entries().len();
                            app.filter_cursor = (app.filter_cursor + 1) % count;
                        }
                        KeyCode::Enter | KeyCode::Char(' ') => {
                            let entries = app.filter_entries();
                            if let Some(entry) = entries.get(app.filter_cursor).copied() {
                                app.toggle_filter_entry(entry);
                            }
                        }
                        _ => {}
                    },
                    InputMode::TrackSearch => match key.code {
                        KeyCode::Enter => app.commit_track_search(),
                        KeyCode::Esc => app.cancel_track_search(),
                        KeyCode::Backspace => {
                            app.track_query_edit.pop();
                        }
                        KeyCode::Char(ch) if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            if ch == 'u' {
                                app.track_query_edit.clear();
                            }
                        }
                        KeyCode::Char(ch) => app.track_query_edit.push(ch),
                        _ => {}
                    },
                    InputMode::Help => match key.code {
                        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') => {
                            app.input_mode = InputMode::Normal;
                        }
                        _ => {}
                    },
                },
                Event::Mouse(mouse) => {
                    if handle_mouse(&mut app, mouse) {
                        moved_at = Some(SystemTime::now());
                    }
                }
                _ => {}
            }
        }
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) -> bool {
    if app.input_mode != InputMode::Normal {
        return false;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.viewport.zoom_in();
            true
        }
        MouseEventKind::ScrollDown => {
            app.viewport.zoom_out();
            true
        }
        _ => false,
    }
}
