use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};

use tilefuse::game::{GameEngine, GameEvent, GRID_SIZE, MAX_TIER};

// ============================================================================
// Visual Constants
// ============================================================================

const CELL_WIDTH: u16 = 2;
const BLOCK_CHAR: &str = "██";
const EMPTY_CHAR: &str = " ·";

/// Pause between chain-reaction merge steps; the engine itself holds no
/// timers, the front-end drives each step.
const MERGE_STEP_MS: u64 = 150;
const IDLE_POLL_MS: u64 = 250;

// ============================================================================
// Color Mapping
// ============================================================================

fn tier_color(tier: u8) -> Color {
    match tier {
        1 => Color::Green,
        2 => Color::Cyan,
        3 => Color::Blue,
        4 => Color::Magenta,
        5 => Color::Yellow,
        6 => Color::Red,
        // Tier 7 is the diamond cap
        _ => Color::White,
    }
}

// ============================================================================
// App State
// ============================================================================

struct App {
    engine: GameEngine,
    cursor: (usize, usize),
    last_merge: Option<(u8, u32)>,
}

impl App {
    fn new() -> Self {
        Self {
            engine: GameEngine::new(),
            cursor: (GRID_SIZE / 2, GRID_SIZE / 2),
            last_merge: None,
        }
    }

    fn move_cursor(&mut self, dr: isize, dc: isize) {
        let (row, col) = self.cursor;
        let row = row.saturating_add_signed(dr).min(GRID_SIZE - 1);
        let col = col.saturating_add_signed(dc).min(GRID_SIZE - 1);
        self.cursor = (row, col);
    }

    fn drain_events(&mut self) {
        for event in self.engine.take_events() {
            if let GameEvent::Merged { tier, count } = event {
                self.last_merge = Some((tier, count));
            }
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, app: &App) {
    let area = frame.size();
    render_game(frame, app, area);
    if app.engine.is_game_over() {
        render_game_over(frame, app, area);
    }
}

fn render_game(frame: &mut Frame, app: &App, area: Rect) {
    let grid_display_width = (GRID_SIZE as u16 * CELL_WIDTH) + 2;
    let grid_display_height = GRID_SIZE as u16 + 2;
    let next_width = 10;
    let info_width = 16;
    let total_width = grid_display_width + next_width + info_width + 4;
    let total_height = grid_display_height + 3;

    let main_area = centered_rect(total_width, total_height, area);

    let vertical = Layout::vertical([
        Constraint::Length(grid_display_height),
        Constraint::Fill(1),
    ])
    .split(main_area);

    let game_row = vertical[0];

    // Layout: [Grid][Next][Info]
    let horizontal = Layout::horizontal([
        Constraint::Length(grid_display_width),
        Constraint::Length(next_width),
        Constraint::Length(info_width),
    ])
    .split(game_row);

    render_grid(frame, app, horizontal[0]);
    render_next(frame, app, horizontal[1]);
    render_info(frame, app, horizontal[2]);

    let controls_area = Rect {
        x: area.x,
        y: game_row.y + game_row.height,
        width: area.width,
        height: 2,
    };

    if controls_area.y + 1 < area.height {
        let controls = Paragraph::new(vec![Line::from(
            "WASD/Arrows: Move | Space/Enter: Place | R: Restart | Q/ESC: Quit",
        )])
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(controls, controls_area);
    }
}

fn render_grid(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Tilefuse ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = app.engine.grid.rows();
    let mut lines: Vec<Line> = Vec::new();

    for (row, cells) in rows.iter().enumerate() {
        let mut spans: Vec<Span> = Vec::new();

        for (col, &tier) in cells.iter().enumerate() {
            let (symbol, mut style) = if tier == 0 {
                (EMPTY_CHAR, Style::default().fg(Color::DarkGray))
            } else {
                (BLOCK_CHAR, Style::default().fg(tier_color(tier)))
            };

            if (row, col) == app.cursor && !app.engine.is_game_over() {
                style = style.bg(Color::DarkGray);
            }

            spans.push(Span::styled(symbol, style));
        }

        lines.push(Line::from(spans));
    }

    let paragraph = Paragraph::new(lines);
    frame.render_widget(paragraph, inner);
}

fn render_next(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Next ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let tier = app.engine.pending_tile;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            BLOCK_CHAR,
            Style::default().fg(tier_color(tier)),
        )),
        Line::from(format!("Tier {tier}")),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_info(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let stats = app.engine.stats();
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format!("{}", app.engine.score())),
        Line::from(""),
        Line::from(Span::styled("Best", Style::default().fg(Color::Cyan))),
        Line::from(format!("{}", stats.best_score)),
        Line::from(""),
        Line::from(Span::styled("Top tier", Style::default().fg(Color::Green))),
        Line::from(format!("{} / {}", stats.highest_tier, MAX_TIER)),
    ];

    if let Some((tier, count)) = app.last_merge {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("x{count} -> {tier}"),
            Style::default().fg(tier_color(tier)),
        )));
    }

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn render_game_over(frame: &mut Frame, app: &App, area: Rect) {
    let stats = app.engine.stats();
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("GAME OVER", Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(format!("Score: {}", app.engine.score())),
        Line::from(format!("Best:  {}", stats.best_score)),
        Line::from(""),
        Line::from(Span::styled(
            "Press R to restart",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::styled(
            "Press ESC to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Game Over ")
            .title_alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black)),
    );

    let popup_area = centered_rect(26, 12, area);
    frame.render_widget(paragraph, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Main Loop
// ============================================================================

fn main() -> io::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let mut last_step = Instant::now();

    loop {
        app.drain_events();
        terminal.draw(|frame| render(frame, &app))?;

        let poll_timeout = if app.engine.is_resolving() {
            let step = Duration::from_millis(MERGE_STEP_MS);
            step.checked_sub(last_step.elapsed()).unwrap_or(Duration::ZERO)
        } else {
            Duration::from_millis(IDLE_POLL_MS)
        };

        if event::poll(poll_timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => break,
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            // Reset wins even mid-chain
                            app.engine.reset();
                            app.last_merge = None;
                        }
                        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => {
                            app.move_cursor(-1, 0);
                        }
                        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => {
                            app.move_cursor(1, 0);
                        }
                        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => {
                            app.move_cursor(0, -1);
                        }
                        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => {
                            app.move_cursor(0, 1);
                        }
                        KeyCode::Char(' ') | KeyCode::Enter => {
                            let (row, col) = app.cursor;
                            // Occupied cells and mid-chain placements are
                            // rejected with state untouched
                            let _ = app.engine.place_tile_stepwise(row, col);
                            last_step = Instant::now();
                        }
                        _ => {}
                    }
                }
            }
        }

        // Advance the chain reaction one merge per step interval
        if app.engine.is_resolving() && last_step.elapsed() >= Duration::from_millis(MERGE_STEP_MS)
        {
            app.engine.resolve_step();
            last_step = Instant::now();
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
