//! Theming system for Lab Coach

mod tokyo_night;

pub use tokyo_night::TOKYO_NIGHT;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::exercise::editor::{HighlightKind, MarkerState};

/// A color theme for the application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,

    // Background colors
    pub bg_primary: Color,
    pub bg_secondary: Color,
    pub bg_tertiary: Color,

    // Foreground colors
    pub fg_primary: Color,
    pub fg_secondary: Color,
    pub fg_muted: Color,

    // Accent colors
    pub accent_primary: Color,
    pub accent_secondary: Color,

    // Semantic colors
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,

    // Fallback syntax colors
    pub syntax_comment: Color,
    pub syntax_string: Color,

    // Exercise decorations
    pub blank_bg: Color,
    pub answer_bg: Color,
    pub marker_idle: Color,
    pub marker_hint: Color,
    pub marker_answer: Color,

    // UI elements
    pub border: Color,
    pub border_focused: Color,
    pub selection: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::tokyo_night()
    }
}

impl Theme {
    /// Look up a theme by its configured name, falling back to the default
    pub fn by_name(name: &str) -> Self {
        if !name.eq_ignore_ascii_case("tokyo night") {
            tracing::debug!("Unknown theme {:?}, using Tokyo Night", name);
        }
        Theme::tokyo_night()
    }

    /// Marker color for a reveal state
    pub fn marker(&self, state: MarkerState) -> Color {
        match state {
            MarkerState::Idle => self.marker_idle,
            MarkerState::HintShown => self.marker_hint,
            MarkerState::AnswerShown => self.marker_answer,
        }
    }

    /// Background for a highlight span
    pub fn highlight(&self, kind: HighlightKind) -> Color {
        match kind {
            HighlightKind::Answer => self.answer_bg,
            HighlightKind::Blank => self.blank_bg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_theme_is_tokyo_night() {
        let theme = Theme::default();
        assert_eq!(theme.name, "Tokyo Night");
    }

    #[test]
    fn unknown_names_fall_back() {
        assert_eq!(Theme::by_name("Solarized").name, "Tokyo Night");
    }

    #[test]
    fn marker_colors_differ_by_state() {
        let theme = Theme::default();
        assert_ne!(theme.marker(MarkerState::Idle), theme.marker(MarkerState::AnswerShown));
        assert_ne!(theme.highlight(HighlightKind::Answer), theme.highlight(HighlightKind::Blank));
    }
}
