//! UI rendering components

pub mod code_view;
pub mod command_line;
pub mod help;
pub mod hint_popover;
pub mod layout;
pub mod main_screen;
pub mod step_footer;

use ratatui::Frame;

use crate::app::session::LabSession;
use crate::app::state::{AppState, Screen};
use crate::theme::Theme;

/// Main draw function
pub fn draw(frame: &mut Frame, state: &mut AppState, session: &LabSession, theme: &Theme) {
    main_screen::draw(frame, state, session, theme);

    if state.screen == Screen::Help {
        let area = frame.area();
        help::draw(frame, area, theme);
    }
}
