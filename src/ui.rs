use crate::client::{
    AppSnapshot,
    MAX_AUTO_BET_COUNT,
    PlayMode,
    result_line,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use roll_over_dice::{
    auto_bet::SchedulerState,
    odds,
    session::HISTORY_DISPLAY_DEPTH,
};
use std::io::stdout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    ToggleMode,
    OpenBetModal,
    SetBetAmount(u64),
    HalveBet,
    DoubleBet,
    PlaceBet,
    VerifyLatest,
    VerifyRound(usize),
    OpenAutoModal,
    SetAutoPlan { bet_count: u32, bet_amount: u64 },
    StartAuto,
    StopAuto,
    ThresholdUp,
    ThresholdDown,
    OpenHistory,
}

pub type InputEventReceiver = EventStream;

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    play_mode: PlayMode,
    bet_amount: u64,
    auto_bet_count: u32,
    auto_bet_amount: u64,
    // history indices in display order, newest first
    history: Vec<usize>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    BetModal(AmountState),
    AutoModal(AutoState),
    HistoryModal(HistoryState),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct AmountState {
    amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum AutoField {
    #[default]
    Count,
    Amount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct AutoState {
    bet_count: u32,
    bet_amount: u64,
    focus: AutoField,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct HistoryState {
    idx: usize,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // modal editors start from the controller's current values
    state.play_mode = snap.play_mode;
    state.bet_amount = snap.bet_amount;
    state.auto_bet_count = snap.auto_bet_count;
    state.auto_bet_amount = snap.auto_bet_amount;
    state.history = snap.session.recent_rounds.iter().map(|(i, _)| *i).collect();
    if let Mode::HistoryModal(ref mut hs) = state.mode {
        hs.idx = hs.idx.min(state.history.len().saturating_sub(1));
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => interpret_key(state, k),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn push_digit(value: u64, c: char) -> u64 {
    let digit = c.to_digit(10).map(u64::from).unwrap_or(0);
    value.saturating_mul(10).saturating_add(digit)
}

fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    if k.code == KeyCode::Char('c') && k.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::BetModal(bs) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let amount = bs.amount;
                state.mode = Mode::Normal;
                Some(UserEvent::SetBetAmount(amount))
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('+') => {
                bs.amount = bs.amount.saturating_add(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('-') => {
                bs.amount = bs.amount.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                bs.amount /= 10;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                bs.amount = push_digit(bs.amount, c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::AutoModal(auto) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let event = UserEvent::SetAutoPlan {
                    bet_count: auto.bet_count,
                    bet_amount: auto.bet_amount,
                };
                state.mode = Mode::Normal;
                Some(event)
            }
            KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
                auto.focus = match auto.focus {
                    AutoField::Count => AutoField::Amount,
                    AutoField::Amount => AutoField::Count,
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('+') => {
                match auto.focus {
                    AutoField::Count => {
                        auto.bet_count = (auto.bet_count + 1).min(MAX_AUTO_BET_COUNT)
                    }
                    AutoField::Amount => auto.bet_amount = auto.bet_amount.saturating_add(1),
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('-') => {
                match auto.focus {
                    AutoField::Count => auto.bet_count = auto.bet_count.saturating_sub(1).max(1),
                    AutoField::Amount => auto.bet_amount = auto.bet_amount.saturating_sub(1),
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                match auto.focus {
                    AutoField::Count => auto.bet_count /= 10,
                    AutoField::Amount => auto.bet_amount /= 10,
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() => {
                match auto.focus {
                    AutoField::Count => {
                        let next = push_digit(auto.bet_count as u64, c);
                        auto.bet_count = next.min(MAX_AUTO_BET_COUNT as u64) as u32;
                    }
                    AutoField::Amount => auto.bet_amount = push_digit(auto.bet_amount, c),
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::HistoryModal(hs) => match k.code {
            KeyCode::Esc | KeyCode::Char('h') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                hs.idx = hs.idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if hs.idx + 1 < state.history.len() {
                    hs.idx += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let selected = state.history.get(hs.idx).copied();
                selected.map(UserEvent::VerifyRound)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Tab => Some(UserEvent::ToggleMode),
            KeyCode::Left => Some(UserEvent::ThresholdDown),
            KeyCode::Right => Some(UserEvent::ThresholdUp),
            KeyCode::Char('[') => Some(UserEvent::HalveBet),
            KeyCode::Char(']') => Some(UserEvent::DoubleBet),
            KeyCode::Enter | KeyCode::Char('r') => match state.play_mode {
                PlayMode::Manual => Some(UserEvent::PlaceBet),
                PlayMode::Auto => Some(UserEvent::StartAuto),
            },
            KeyCode::Char('v') => Some(UserEvent::VerifyLatest),
            KeyCode::Char('s') => Some(UserEvent::StartAuto),
            KeyCode::Char('x') => Some(UserEvent::StopAuto),
            KeyCode::Char('b') => {
                state.mode = Mode::BetModal(AmountState {
                    amount: state.bet_amount,
                });
                Some(UserEvent::OpenBetModal)
            }
            KeyCode::Char('a') => {
                state.mode = Mode::AutoModal(AutoState {
                    bet_count: state.auto_bet_count,
                    bet_amount: state.auto_bet_amount,
                    focus: AutoField::Count,
                });
                Some(UserEvent::OpenAutoModal)
            }
            KeyCode::Char('h') => {
                state.mode = Mode::HistoryModal(HistoryState::default());
                Some(UserEvent::OpenHistory)
            }
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // balance + mode
            Constraint::Length(3), // public seed
            Constraint::Length(3), // threshold slider
            Constraint::Length(3), // multiplier / roll over / win chance
            Constraint::Length(3), // bet controls
            Constraint::Length(3), // recent dice
            Constraint::Length(4), // last result + verification
            Constraint::Min(4),    // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_seed(f, chunks[1], snap);
    draw_slider(f, chunks[2], snap);
    draw_odds(f, chunks[3], snap);
    draw_controls(f, chunks[4], snap);
    draw_recent_dice(f, chunks[5], snap);
    draw_result(f, chunks[6], snap);
    draw_bottom(f, chunks[7], chunks[8], snap);
    draw_modals(f, state, snap);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mode = match snap.play_mode {
        PlayMode::Manual => "Manual",
        PlayMode::Auto => "Auto",
    };
    let text = Line::from(vec![
        Span::styled(
            format!("Balance: {}", snap.session.balance),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " | Mode: {} | Rounds: {} | Backend: {}",
            mode, snap.session.round_count, snap.backend
        )),
    ]);
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Dice"));
    f.render_widget(widget, area);
}

fn draw_seed(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let widget = Paragraph::new(snap.session.live_seed.to_string()).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Public Seed"),
    );
    f.render_widget(widget, area);
}

fn draw_slider(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let threshold = snap.session.threshold;
    // losing faces fill the track, winning faces stay green
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Threshold (←/→)"),
        )
        .gauge_style(Style::default().fg(Color::Red).bg(Color::Green))
        .ratio(threshold.slider_fill().clamp(0.0, 1.0))
        .label(format!("{} / {}", threshold, odds::DIE_FACES));
    f.render_widget(gauge, area);
}

fn draw_odds(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let threshold = snap.session.threshold;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);
    let cells = [
        ("Multiplier", format!("{}x", threshold.multiplier_display())),
        ("Roll Over", threshold.to_string()),
        ("Win Chance", threshold.win_chance_display()),
    ];
    for ((title, value), rect) in cells.into_iter().zip(cols.iter()) {
        let widget =
            Paragraph::new(value).block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(widget, *rect);
    }
}

fn draw_controls(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let (title, text) = match snap.play_mode {
        PlayMode::Manual => {
            let note = if snap.scheduler.is_running() {
                " | Bet disabled while auto runs"
            } else {
                ""
            };
            (
                "Manual",
                format!(
                    "Bet: {} | Profit on Win: {}{}",
                    snap.bet_amount,
                    odds::profit_on_win(snap.bet_amount),
                    note
                ),
            )
        }
        PlayMode::Auto => {
            let progress = match &snap.scheduler {
                SchedulerState::Idle => String::from("idle"),
                SchedulerState::Running { plan, completed } => {
                    format!("running {}/{}", completed, plan.bet_count)
                }
            };
            (
                "Auto",
                format!(
                    "Number of Bets: {} | Bet Amount: {} | {}",
                    snap.auto_bet_count, snap.auto_bet_amount, progress
                ),
            )
        }
    };
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn dice_style(value: u8, threshold: u8) -> Style {
    if value >= threshold {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    }
}

fn draw_recent_dice(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let line = if snap.session.recent_dice.is_empty() {
        Line::styled("None", Style::default().fg(Color::DarkGray))
    } else {
        let threshold = snap.session.threshold.get();
        let spans: Vec<Span> = snap
            .session
            .recent_dice
            .iter()
            .map(|d| Span::styled(format!("{} ", d), dice_style(d.get(), threshold)))
            .collect();
        Line::from(spans)
    };
    let title = format!("Last {} Rolls", HISTORY_DISPLAY_DEPTH);
    let widget = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(widget, area);
}

fn draw_result(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = Vec::new();
    match &snap.session.last_round {
        Some(round) => {
            let color = if round.is_win() {
                Color::Green
            } else {
                Color::Red
            };
            lines.push(Line::styled(
                result_line(round),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
        }
        None => lines.push(Line::styled(
            "No rolls yet",
            Style::default().fg(Color::DarkGray),
        )),
    }
    if let Some(verification) = &snap.verification {
        lines.push(Line::from(verification.clone()));
    }
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Result"));
    f.render_widget(widget, area);
}

fn draw_bottom(f: &mut Frame, status_area: Rect, help_area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, status_area);

    let help = match snap.play_mode {
        PlayMode::Manual => {
            "Tab mode | ←/→ threshold | b bet | [ 1/2 | ] 2X | Enter/r bet | v check fairness | h history | q/Esc quit"
        }
        PlayMode::Auto => {
            "Tab mode | ←/→ threshold | a auto settings | Enter/s start | x stop | v check fairness | h history | q/Esc quit"
        }
    };
    let help = Paragraph::new(help).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, help_area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::BetModal(bs) => {
            let area = centered_rect(40, 30, f.area());
            let block = Block::default().borders(Borders::ALL).title("Bet Amount");
            let p = Paragraph::new(format!(
                "Amount: {}\nBalance: {}\nEnter=confirm Esc=cancel +/- or digits to edit",
                bs.amount, snap.session.balance
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::AutoModal(auto) => {
            let area = centered_rect(50, 30, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Auto Bet Settings");
            let cursor = |field: AutoField| if auto.focus == field { ">" } else { " " };
            let lines = vec![
                Line::from(format!(
                    "{} Number of Bets: {} (max {})",
                    cursor(AutoField::Count),
                    auto.bet_count,
                    MAX_AUTO_BET_COUNT
                )),
                Line::from(format!(
                    "{} Bet Amount: {}",
                    cursor(AutoField::Amount),
                    auto.bet_amount
                )),
                Line::from("Enter=confirm Esc=cancel Tab=switch field +/- or digits to edit"),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::HistoryModal(hs) => {
            let area = centered_rect(70, 70, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Round History");
            let mut lines = Vec::new();
            if snap.session.recent_rounds.is_empty() {
                lines.push(Line::from("No rounds yet"));
            } else {
                for (i, (index, round)) in snap.session.recent_rounds.iter().enumerate() {
                    let cur = if i == hs.idx { ">" } else { " " };
                    let text = format!(
                        "{} #{} {} | bet {} over {} | balance {} | seed {}",
                        cur,
                        index + 1,
                        result_line(round),
                        round.bet_amount,
                        round.threshold,
                        round.balance_after,
                        round.public_seed_used
                    );
                    let style = if i == hs.idx {
                        Style::default().fg(Color::Yellow)
                    } else {
                        Style::default()
                    };
                    lines.push(Line::styled(text, style));
                }
                lines.push(Line::from("Enter=check fairness Esc=close ↑/↓ move"));
            }
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - h_percent) / 2),
        Constraint::Percentage(h_percent),
        Constraint::Percentage((100 - h_percent) / 2),
    ])
    .areas(r);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - w_percent) / 2),
        Constraint::Percentage(w_percent),
        Constraint::Percentage((100 - w_percent) / 2),
    ])
    .areas(middle);
    center
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn interpret_event__bet_modal_edits_digits() {
        // given
        let mut state = UiState {
            bet_amount: 10,
            ..UiState::default()
        };
        interpret_event(&mut state, press(KeyCode::Char('b')));

        // when
        interpret_event(&mut state, press(KeyCode::Backspace));
        interpret_event(&mut state, press(KeyCode::Backspace));
        interpret_event(&mut state, press(KeyCode::Char('2')));
        interpret_event(&mut state, press(KeyCode::Char('5')));
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(event, Some(UserEvent::SetBetAmount(25)));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__auto_modal_caps_bet_count() {
        let mut state = UiState {
            auto_bet_count: 1,
            auto_bet_amount: 10,
            ..UiState::default()
        };
        interpret_event(&mut state, press(KeyCode::Char('a')));
        interpret_event(&mut state, press(KeyCode::Char('9')));

        let event = interpret_event(&mut state, press(KeyCode::Enter));

        assert_eq!(
            event,
            Some(UserEvent::SetAutoPlan {
                bet_count: MAX_AUTO_BET_COUNT,
                bet_amount: 10
            })
        );
    }

    #[test]
    fn interpret_event__history_enter_verifies_selected_round() {
        // given
        let mut state = UiState {
            history: vec![4, 3, 2],
            ..UiState::default()
        };
        interpret_event(&mut state, press(KeyCode::Char('h')));

        // when
        interpret_event(&mut state, press(KeyCode::Down));
        let event = interpret_event(&mut state, press(KeyCode::Enter));

        // then
        assert_eq!(event, Some(UserEvent::VerifyRound(3)));
    }

    #[test]
    fn interpret_event__enter_bets_only_in_manual_mode() {
        // given
        let mut manual = UiState::default();
        let mut auto = UiState {
            play_mode: PlayMode::Auto,
            ..UiState::default()
        };

        // when
        let manual_enter = interpret_event(&mut manual, press(KeyCode::Enter));
        let auto_enter = interpret_event(&mut auto, press(KeyCode::Enter));
        let auto_r = interpret_event(&mut auto, press(KeyCode::Char('r')));

        // then
        assert_eq!(manual_enter, Some(UserEvent::PlaceBet));
        assert_eq!(auto_enter, Some(UserEvent::StartAuto));
        assert_eq!(auto_r, Some(UserEvent::StartAuto));
    }

    #[test]
    fn interpret_event__ctrl_c_quits_from_any_mode() {
        let mut state = UiState::default();
        interpret_event(&mut state, press(KeyCode::Char('b')));

        let event = interpret_event(
            &mut state,
            Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );

        assert_eq!(event, Some(UserEvent::Quit));
    }
}
