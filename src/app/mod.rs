//! Application state and event handling

pub mod command;
pub mod input;
pub mod session;
pub mod show;
pub mod state;

use std::io::{self, Stdout};
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::config::{Config, JsonFileStore};
use crate::exercise::tier::Tier;
use crate::telemetry::{LeaderboardSink, MultiSink, TracingSink};
use crate::theme::Theme;
use crate::ui;
use crate::verify::{KmsAliasCleanup, ShellVerifier, VerifyResult};
use command::{Command, ParseResult, parse_command};
use input::{Action, key_with_modifier_to_action};
use session::{Collaborators, LabSession, ResetReport, SessionError, SessionOptions};
use state::{AppState, Screen};

/// Build the production collaborators from configuration
pub fn collaborators_from_config(config: &Config) -> Result<Collaborators> {
    let mut telemetry = MultiSink::new().with(TracingSink::new(config.user_email.clone()));
    if let (Some(url), Some(email)) = (&config.leaderboard_url, &config.user_email) {
        telemetry = telemetry.with(LeaderboardSink::new(url.clone(), email.clone())?);
    }

    Ok(Collaborators {
        verifier: Arc::new(ShellVerifier::new(config.allowed_commands.clone())),
        cleanup: Arc::new(KmsAliasCleanup::new(config.kms_alias.clone(), config.aws_profile.clone())),
        telemetry: Arc::new(telemetry),
        store: Arc::new(JsonFileStore::new()?),
    })
}

/// Session options taken from configuration. `MONGODB_URI` stands in when
/// no URI is configured.
pub fn session_options(config: &Config) -> SessionOptions {
    SessionOptions {
        always_show_solutions: config.always_show_solutions,
        connection_uri: config.mongo_uri.clone().or_else(|| std::env::var("MONGODB_URI").ok()),
    }
}

/// Work finished in the background
#[derive(Debug)]
enum BackgroundEvent {
    Verified { step_index: usize, result: VerifyResult },
    CleanedUp(ResetReport),
}

/// The main application
pub struct App {
    /// Active theme
    theme: Theme,

    /// The lab being worked through
    session: LabSession,

    /// Current application state
    state: AppState,

    /// Results from spawned verification and cleanup tasks
    events_tx: mpsc::UnboundedSender<BackgroundEvent>,
    events_rx: mpsc::UnboundedReceiver<BackgroundEvent>,

    /// Terminal backend
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: &Config, session: LabSession) -> Result<Self> {
        let terminal = Self::setup_terminal()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            theme: config.active_theme(),
            session,
            state: AppState::default(),
            events_tx,
            events_rx,
            terminal,
        })
    }

    /// Set up the terminal for TUI rendering
    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(terminal)
    }

    /// Restore the terminal to its original state
    fn restore_terminal(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Run the application main loop
    pub async fn run(&mut self) -> Result<()> {
        // Set up panic hook to restore terminal
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            original_hook(panic_info);
        }));

        loop {
            let (state, session, theme) = (&mut self.state, &self.session, &self.theme);
            self.terminal.draw(|frame| ui::draw(frame, state, session, theme))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }

            while let Ok(event) = self.events_rx.try_recv() {
                self.handle_background(event);
            }
        }

        self.restore_terminal()?;
        Ok(())
    }

    /// Handle a key press, returns true if should exit
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.state.command_line.is_input_mode() {
            return self.handle_command_input(key.code);
        }

        let Some(action) = key_with_modifier_to_action(key.code, key.modifiers) else {
            return false;
        };
        if self.state.screen == Screen::Help {
            if matches!(action, Action::Back | Action::Help) {
                self.state.screen = Screen::Lab;
            }
            return action == Action::Quit;
        }
        self.handle_action(action)
    }

    fn handle_command_input(&mut self, key: KeyCode) -> bool {
        let cl = &mut self.state.command_line;
        match key {
            KeyCode::Esc => cl.exit_input_mode(),
            KeyCode::Enter => {
                let input = cl.input.clone();
                cl.add_to_history(input.clone());
                cl.exit_input_mode();
                return self.run_command_line(&input);
            }
            KeyCode::Backspace if cl.input.is_empty() => cl.exit_input_mode(),
            KeyCode::Backspace => cl.delete_char(),
            KeyCode::Left => cl.move_left(),
            KeyCode::Right => cl.move_right(),
            KeyCode::Up => cl.history_up(),
            KeyCode::Down => cl.history_down(),
            KeyCode::Char(c) => cl.insert_char(c),
            _ => {}
        }
        false
    }

    fn run_command_line(&mut self, input: &str) -> bool {
        match parse_command(input) {
            ParseResult::Ok(command) => self.execute(command),
            ParseResult::UnknownCommand(cmd) => {
                self.state.command_line.set_error(format!("Unknown command: {cmd}"));
                false
            }
            ParseResult::MissingArgument(cmd) => {
                self.state.command_line.set_error(format!(":{cmd} needs an argument"));
                false
            }
            ParseResult::InvalidArgument { command, argument } => {
                self.state.command_line.set_error(format!("Invalid argument for :{command}: {argument}"));
                false
            }
        }
    }

    fn handle_action(&mut self, action: Action) -> bool {
        let half_page = (self.state.code_view.visible_height / 2).max(1) as isize;
        let page = self.state.code_view.visible_height.max(1) as isize;
        match action {
            Action::ScrollDown => self.state.code_view.scroll_by(1),
            Action::ScrollUp => self.state.code_view.scroll_by(-1),
            Action::HalfPageDown => self.state.code_view.scroll_by(half_page),
            Action::HalfPageUp => self.state.code_view.scroll_by(-half_page),
            Action::PageDown => self.state.code_view.scroll_by(page),
            Action::PageUp => self.state.code_view.scroll_by(-page),
            Action::NextBlank => self.cycle_blank(true),
            Action::PrevBlank => self.cycle_blank(false),
            Action::TogglePopover => {
                let view = &mut self.state.code_view;
                view.popover_open = view.selected_blank.is_some() && !view.popover_open;
            }
            Action::Back => self.state.code_view.popover_open = false,
            Action::RevealHint => return self.execute(Command::Hint(None)),
            Action::RevealAnswer => return self.execute(Command::Answer(None)),
            Action::RevealSolution => return self.execute(Command::Solution),
            Action::ToggleAnswers => return self.execute(Command::Answers),
            Action::CycleTier => {
                let key = self.active_key();
                return self.execute(Command::Tier(self.session.tier(key).next()));
            }
            Action::NextBlock => {
                let count = self.session.current_step().code_blocks.len().max(1);
                let view = &mut self.state.code_view;
                view.active_block = (view.active_block + 1) % count;
                view.selected_blank = None;
                view.popover_open = false;
                view.scroll_offset = 0;
            }
            Action::Verify => return self.execute(Command::Verify),
            Action::NextStep => return self.execute(Command::Next),
            Action::PrevStep => return self.execute(Command::Prev),
            Action::Help => self.state.screen = Screen::Help,
            Action::CommandMode => self.state.command_line.enter_command_mode(),
            Action::Quit => return true,
        }
        false
    }

    fn active_key(&self) -> crate::lab::model::BlockKey {
        self.state.active_block_key(self.session.current_index())
    }

    fn cycle_blank(&mut self, forward: bool) {
        let positions = self.session.blank_positions(self.active_key()).unwrap_or_default();
        self.state.code_view.cycle_blank(positions.len(), forward);
        if let Some(position) = self.state.code_view.selected(&positions).copied() {
            self.state.code_view.ensure_line_visible(position.line);
        }
    }

    /// Hint index for a command argument, or the selected blank
    fn target_hint(&self, explicit: Option<usize>) -> Option<usize> {
        explicit.or_else(|| {
            let positions = self.session.blank_positions(self.active_key()).ok()?;
            self.state.code_view.selected(&positions).map(|p| p.hint_index)
        })
    }

    /// Execute a command, returns true if should exit
    fn execute(&mut self, command: Command) -> bool {
        let quit = command == Command::Quit;
        let outcome = self.apply(command);
        match outcome {
            Ok(Some(message)) => self.state.command_line.set_message(message),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("command refused: {}", e);
                self.state.command_line.set_error(e.to_string());
            }
        }
        quit
    }

    fn apply(&mut self, command: Command) -> Result<Option<String>, SessionError> {
        let key = self.active_key();
        let message = match command {
            Command::Quit | Command::Nop => None,
            Command::Help => {
                self.state.screen = Screen::Help;
                None
            }
            Command::Tier(tier) => {
                self.session.set_tier(key, tier)?;
                self.state.code_view.selected_blank = None;
                self.state.code_view.popover_open = false;
                Some(tier_message(tier))
            }
            Command::Hint(index) => {
                let Some(index) = self.target_hint(index) else {
                    return Ok(Some("Select a blank with Tab first".to_string()));
                };
                let cost = self.session.reveal_hint(key, index)?;
                self.state.code_view.popover_open = true;
                Some(cost_message("Hint", cost))
            }
            Command::Answer(index) => {
                let Some(index) = self.target_hint(index) else {
                    return Ok(Some("Select a blank with Tab first".to_string()));
                };
                let cost = self.session.reveal_answer(key, index)?;
                self.state.code_view.popover_open = true;
                Some(cost_message("Answer", cost))
            }
            Command::Solution => {
                let cost = self.session.reveal_solution(key)?;
                self.state.code_view.selected_blank = None;
                self.state.code_view.popover_open = false;
                Some(cost_message("Solution", cost))
            }
            Command::Answers => {
                let view = &mut self.state.code_view;
                view.show_answers = !view.show_answers;
                let message = if view.show_answers { "Showing revealed answers" } else { "Showing your skeleton" };
                Some(message.to_string())
            }
            Command::Verify => {
                let pending = self.session.begin_verify()?;
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = pending.future.await;
                    let _ = tx.send(BackgroundEvent::Verified { step_index: pending.step_index, result });
                });
                Some("Verifying\u{2026}".to_string())
            }
            Command::Next => {
                let step = self.session.next_step()?;
                self.state.code_view.reset_for_step();
                Some(format!("Step {}", step + 1))
            }
            Command::Prev => {
                let step = self.session.prev_step()?;
                self.state.code_view.reset_for_step();
                Some(format!("Step {}", step + 1))
            }
            Command::Goto(step) => {
                let step = self.session.go_to(step)?;
                self.state.code_view.reset_for_step();
                Some(format!("Step {}", step + 1))
            }
            Command::Reset(step) => {
                let step = step.unwrap_or(self.session.current_index());
                let cleanup = self.session.reset_step(step)?;
                self.state.code_view.reset_for_step();
                let tx = self.events_tx.clone();
                tokio::spawn(async move {
                    let report = ResetReport::from_cleanup(step, cleanup.await);
                    let _ = tx.send(BackgroundEvent::CleanedUp(report));
                });
                Some(format!("Step {} reset, cleaning up\u{2026}", step + 1))
            }
            Command::ResetLab => {
                self.session.reset_lab()?;
                self.state.code_view.reset_for_step();
                Some("All progress for this lab cleared".to_string())
            }
        };
        Ok(message)
    }

    fn handle_background(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Verified { step_index, result } => {
                let passed = result.success;
                let message = result.message.clone();
                match self.session.finish_verify(step_index, result) {
                    Some(done) => {
                        let assisted = if done.assisted { ", assisted" } else { "" };
                        self.state.command_line.set_message(format!("Passed: +{} points{}", done.points, assisted));
                    }
                    None if passed => self.state.command_line.set_message(message),
                    None => self.state.command_line.set_error(message),
                }
            }
            BackgroundEvent::CleanedUp(report) => match report.cleanup_warning {
                Some(warning) => {
                    tracing::warn!(step = report.step_index, "cleanup failed: {}", warning);
                    self.state
                        .command_line
                        .set_error(format!("Step {} reset, but cleanup failed: {}", report.step_index + 1, warning));
                }
                None => {
                    self.state.command_line.set_message(format!("Step {} reset", report.step_index + 1));
                }
            },
        }
    }
}

fn tier_message(tier: Tier) -> String {
    format!("{} tier: {} points available", tier, tier.ceiling())
}

fn cost_message(what: &str, cost: u32) -> String {
    if cost == 0 { format!("{what} already revealed") } else { format!("{what} revealed (-{cost} points)") }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}
