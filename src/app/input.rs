//! Event handling utilities

use crossterm::event::{KeyCode, KeyModifiers};

/// Key mapping for the lab screen (no modifiers)
pub fn lab_key_to_action(key: KeyCode) -> Option<Action> {
    match key {
        KeyCode::Char('j') | KeyCode::Down => Some(Action::ScrollDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Action::ScrollUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::Tab => Some(Action::NextBlank),
        KeyCode::BackTab => Some(Action::PrevBlank),
        KeyCode::Enter => Some(Action::TogglePopover),
        KeyCode::Esc => Some(Action::Back),
        KeyCode::Char('?') => Some(Action::RevealHint),
        KeyCode::Char('a') => Some(Action::RevealAnswer),
        KeyCode::Char('S') => Some(Action::RevealSolution),
        KeyCode::Char('w') => Some(Action::ToggleAnswers),
        KeyCode::Char('t') => Some(Action::CycleTier),
        KeyCode::Char('b') => Some(Action::NextBlock),
        KeyCode::Char('v') => Some(Action::Verify),
        KeyCode::Char('n') => Some(Action::NextStep),
        KeyCode::Char('p') => Some(Action::PrevStep),
        KeyCode::Char('H') | KeyCode::F(1) => Some(Action::Help),
        KeyCode::Char(':') => Some(Action::CommandMode),
        // 'q' is not mapped; quitting goes through :q
        _ => None,
    }
}

/// Key mapping with modifiers (for Ctrl combinations)
pub fn key_with_modifier_to_action(key: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) {
        match key {
            KeyCode::Char('d') => Some(Action::HalfPageDown),
            KeyCode::Char('u') => Some(Action::HalfPageUp),
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        }
    } else {
        lab_key_to_action(key)
    }
}

/// Actions that can be taken in the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // Scrolling
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    HalfPageUp,
    HalfPageDown,

    // Blanks and hints
    NextBlank,
    PrevBlank,
    TogglePopover,
    RevealHint,
    RevealAnswer,
    RevealSolution,
    ToggleAnswers,
    CycleTier,
    NextBlock,

    // Steps
    Verify,
    NextStep,
    PrevStep,

    // Modes
    Back,
    Help,
    CommandMode,
    Quit,
}
