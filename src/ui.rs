use crate::client::{AppSnapshot, CellView};
use crate::grid::GRID_SIZE;
use crate::session::BoosterKind;
use color_eyre::eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use itertools::Itertools;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use tokio::sync::mpsc;

/// Player intent after modal handling; the controller acts on these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    CursorMove { dx: i32, dy: i32 },
    Press,
    CancelAction,
    ArmBooster(BoosterKind),
    NewGame,
    OpenShop,
    CloseShop,
    ConfirmShopArm(BoosterKind),
    Redraw,
}

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    ShopModal(ShopState),
    QuitModal,
}

#[derive(Clone, Copy, Debug, Default)]
struct ShopState {
    idx: usize,
}

const SHOP_ITEMS: [(BoosterKind, &str); 3] = [
    (BoosterKind::Hammer, "Hammer — destroy one tile"),
    (BoosterKind::ColorBomb, "Color bomb — clear one color"),
    (BoosterKind::Shuffle, "Shuffle — redeal the board"),
];

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

/// Forward crossterm events from a blocking reader thread; the async
/// loop selects on the channel.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

pub async fn next_raw_event(rx: &mut InputEventReceiver) -> Option<Event> {
    rx.recv().await
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen
    )?;
    // Single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

/// Turn a raw terminal event into a player intent, handling the modal
/// layer first. Returns `None` for events that mean nothing right now.
pub fn interpret_event(state: &mut UiState, raw: Event) -> Option<UserEvent> {
    let key = match raw {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };

    match &mut state.mode {
        Mode::ShopModal(ss) => match key.code {
            KeyCode::Esc | KeyCode::Char('s') => {
                state.mode = Mode::Normal;
                Some(UserEvent::CloseShop)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                ss.idx = ss.idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                ss.idx = (ss.idx + 1).min(SHOP_ITEMS.len() - 1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let (kind, _) = SHOP_ITEMS[ss.idx];
                state.mode = Mode::Normal;
                Some(UserEvent::ConfirmShopArm(kind))
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                Some(UserEvent::CursorMove { dx: 0, dy: -1 })
            }
            KeyCode::Down | KeyCode::Char('j') => {
                Some(UserEvent::CursorMove { dx: 0, dy: 1 })
            }
            KeyCode::Left | KeyCode::Char('h') => {
                Some(UserEvent::CursorMove { dx: -1, dy: 0 })
            }
            KeyCode::Right | KeyCode::Char('l') => {
                Some(UserEvent::CursorMove { dx: 1, dy: 0 })
            }
            KeyCode::Enter | KeyCode::Char(' ') => Some(UserEvent::Press),
            KeyCode::Char('x') => Some(UserEvent::CancelAction),
            KeyCode::Char('1') => {
                Some(UserEvent::ArmBooster(BoosterKind::Hammer))
            }
            KeyCode::Char('2') => {
                Some(UserEvent::ArmBooster(BoosterKind::ColorBomb))
            }
            KeyCode::Char('3') => {
                Some(UserEvent::ArmBooster(BoosterKind::Shuffle))
            }
            KeyCode::Char('n') => Some(UserEvent::NewGame),
            KeyCode::Char('s') => {
                state.mode = Mode::ShopModal(ShopState::default());
                Some(UserEvent::OpenShop)
            }
            _ => None,
        },
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // session header
            Constraint::Min(GRID_SIZE as u16 + 2), // board + side panel
            Constraint::Length(5),  // status / errors
            Constraint::Length(3),  // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(36), Constraint::Min(24)])
        .split(chunks[1]);
    draw_board(f, middle[0], snap);
    draw_side_panel(f, middle[1], snap);

    draw_status(f, chunks[2], snap);
    draw_help(f, chunks[3]);

    match &state.mode {
        Mode::ShopModal(ss) => draw_shop_modal(f, snap, ss),
        Mode::QuitModal => draw_quit_modal(f),
        Mode::Normal => {}
    }
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let time = match snap.time_left {
        Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
        None => String::from("--"),
    };
    let text = format!(
        "Player: {} | Level {} | Score {} / {} | Moves {} | Time {}",
        snap.player, snap.level, snap.score, snap.target_score,
        snap.moves_left, time
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Joybit"));
    f.render_widget(widget, area);
}

fn kind_color(kind: u8) -> Color {
    match kind {
        0 => Color::Red,
        1 => Color::Blue,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Magenta,
        5 => Color::Cyan,
        6 => Color::White,
        // the time-bonus kind stands out
        _ => Color::LightYellow,
    }
}

fn cell_span(cell: &CellView) -> Span<'static> {
    let mut style = Style::default()
        .fg(kind_color(cell.kind))
        .bg(Color::Black);
    let glyph = if cell.cursor {
        style = style.add_modifier(Modifier::REVERSED);
        "[##]"
    } else if cell.selected {
        style = style.add_modifier(Modifier::BOLD);
        "(##)"
    } else if cell.matched {
        " ** "
    } else if cell.falling {
        " vv "
    } else {
        " ## "
    };
    Span::styled(glyph, style)
}

fn draw_board(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines: Vec<Line> = snap
        .cells
        .iter()
        .map(|row| Line::from(row.iter().map(cell_span).collect::<Vec<_>>()))
        .collect();
    let title = if snap.playing { "Board" } else { "Board (game over)" };
    let board = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(board, area);
}

fn draw_side_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![
        Line::from(format!("1 Hammer      x{}", snap.boosters.hammer)),
        Line::from(format!("2 Color bomb  x{}", snap.boosters.color_bomb)),
        Line::from(format!("3 Shuffle     x{}", snap.boosters.shuffle)),
        Line::from(""),
        Line::from(format!("Win reward: {} JOY", snap.reward_on_win)),
    ];
    if let Some(kind) = snap.armed {
        lines.push(Line::from(""));
        lines.push(Line::styled(
            format!("{} armed — pick a target (x cancels)", booster_name(kind)),
            Style::default().fg(Color::Yellow),
        ));
    }
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Boosters"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = if snap.errors.is_empty() {
        let lines: Vec<Line> =
            snap.status.lines().map(|l| Line::from(l.to_string())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> =
            snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(widget, area);
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "←↑↓→/hjkl move | Enter/Space press | 1/2/3 booster | s shop | x cancel | n new game | q/Esc quit",
    )
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

pub fn booster_name(kind: BoosterKind) -> &'static str {
    match kind {
        BoosterKind::Hammer => "Hammer",
        BoosterKind::ColorBomb => "Color bomb",
        BoosterKind::Shuffle => "Shuffle",
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_shop_modal(f: &mut Frame, snap: &AppSnapshot, ss: &ShopState) {
    let area = centered_rect(46, SHOP_ITEMS.len() as u16 + 4, f.area());
    f.render_widget(Clear, area);

    let counts = [
        snap.boosters.hammer,
        snap.boosters.color_bomb,
        snap.boosters.shuffle,
    ];
    let lines: Vec<Line> = SHOP_ITEMS
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(idx, ((_, label), count))| {
            let text = format!("{label} (x{count})");
            if idx == ss.idx {
                Line::styled(
                    format!("> {text}"),
                    Style::default().add_modifier(Modifier::BOLD),
                )
            } else {
                Line::from(format!("  {text}"))
            }
        })
        .chain([
            Line::from(""),
            Line::styled(
                ["↑↓ choose", "Enter arm", "Esc close"].iter().join(" | "),
                Style::default().fg(Color::DarkGray),
            ),
        ])
        .collect();
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Booster shop (timer paused)"),
    );
    f.render_widget(widget, area);
}

fn draw_quit_modal(f: &mut Frame) {
    let area = centered_rect(30, 3, f.area());
    f.render_widget(Clear, area);
    let widget = Paragraph::new("Quit Joybit? (y/n)")
        .block(Block::default().borders(Borders::ALL).title("Quit"));
    f.render_widget(widget, area);
}
