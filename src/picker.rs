//! Interactive option picker
//!
//! A minimal selector for one attribute control: arrow keys move the
//! highlight, Enter chooses, Esc or q backs out without touching anything.

use crate::control::OptionEntry;
use crate::{NvOptionsError, NvResult};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::time::Duration;

/// Guard to ensure terminal state is restored even on panic
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// Run the picker over `options`, starting with `initial` highlighted.
/// Returns the chosen position, or `None` when the user backs out.
pub fn pick_option(
    title: &str,
    options: &[OptionEntry],
    initial: usize,
) -> NvResult<Option<usize>> {
    if options.is_empty() {
        return Ok(None);
    }

    enable_raw_mode()
        .map_err(|e| NvOptionsError::RuntimeError(format!("Failed to enable raw mode: {e}")))?;
    let _guard = TerminalGuard; // Ensures cleanup on exit or panic

    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| {
        NvOptionsError::RuntimeError(format!("Failed to enter alternate screen: {e}"))
    })?;

    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)
        .map_err(|e| NvOptionsError::RuntimeError(format!("Failed to create terminal: {e}")))?;

    let mut state = ListState::default();
    state.select(Some(initial.min(options.len() - 1)));
    let mut chosen = None;

    loop {
        terminal
            .draw(|f| draw_picker(f, title, options, &mut state))
            .map_err(|e| NvOptionsError::RuntimeError(format!("Failed to draw frame: {e}")))?;

        match event::poll(Duration::from_millis(200)) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = event::read() {
                    let selected = state.selected().unwrap_or(0);
                    match key.code {
                        KeyCode::Up | KeyCode::Char('k') => {
                            state.select(Some(selected.saturating_sub(1)));
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            state.select(Some((selected + 1).min(options.len() - 1)));
                        }
                        KeyCode::Home => state.select(Some(0)),
                        KeyCode::End => state.select(Some(options.len() - 1)),
                        KeyCode::Enter => {
                            chosen = state.selected();
                            break;
                        }
                        KeyCode::Esc | KeyCode::Char('q') => break,
                        _ => {}
                    }
                }
            }
            Ok(false) => {}
            Err(_) => break,
        }
    }

    let _ = terminal.show_cursor();
    Ok(chosen)
}

fn draw_picker(
    f: &mut ratatui::Frame,
    title: &str,
    options: &[OptionEntry],
    state: &mut ListState,
) {
    let area = f.area();

    let items: Vec<ListItem> = options
        .iter()
        .map(|entry| {
            let marker = if entry.current { "*" } else { " " };
            ListItem::new(format!(" {marker} {}", entry.label))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let list_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: area.height.saturating_sub(1),
    };
    f.render_stateful_widget(list, list_area, state);

    let footer = Paragraph::new("Up/Down move | Enter apply | q cancel")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    let footer_area = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };
    f.render_widget(footer, footer_area);
}
