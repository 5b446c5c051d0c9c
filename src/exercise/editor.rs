//! The slice of an editor widget the exercise logic needs
//!
//! Markers and highlights are computed against this trait so the locator
//! never depends on a concrete editor.

use super::blanks::BlankPosition;
use super::reveal::RevealState;

/// A screen cell relative to the editor's origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub x: u16,
    pub y: u16,
}

/// What a highlighted span represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    /// A revealed answer
    Answer,
    /// An unfilled blank
    Blank,
}

/// A run of characters to decorate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Line number (1-indexed)
    pub line: usize,
    /// First character within the line (0-indexed)
    pub start: usize,
    /// Length in characters
    pub len: usize,
    pub kind: HighlightKind,
}

/// Minimal editor capabilities
pub trait EditorSurface {
    /// Screen cell for a 1-indexed line/column, or `None` when scrolled out of view
    fn cursor_position(&self, line: usize, column: usize) -> Option<CellPosition>;

    /// Replace the decoration layer
    fn apply_highlight(&mut self, spans: &[HighlightSpan]);

    /// Notify the surface that its viewport moved
    fn on_scroll(&mut self, top: usize, left: usize);
}

/// Visual state of one inline marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Nothing revealed yet
    Idle,
    /// Hint nudge shown
    HintShown,
    /// Exact answer shown
    AnswerShown,
}

impl MarkerState {
    /// Glyph drawn on the blank
    pub fn symbol(self) -> &'static str {
        match self {
            MarkerState::Idle => "?",
            MarkerState::HintShown => "!",
            MarkerState::AnswerShown => "\u{2713}", // ✓
        }
    }

    pub fn for_hint(state: &RevealState, hint_index: usize) -> Self {
        if state.revealed_answers.contains(&hint_index) {
            MarkerState::AnswerShown
        } else if state.revealed_hints.contains(&hint_index) {
            MarkerState::HintShown
        } else {
            MarkerState::Idle
        }
    }
}

/// A marker resolved to a screen cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedMarker {
    pub hint_index: usize,
    pub at: CellPosition,
    pub state: MarkerState,
}

/// Resolve blank positions to on-screen markers.
///
/// Nothing is placed once the solution is showing; blanks scrolled out of
/// view are skipped.
pub fn place_markers(
    surface: &dyn EditorSurface,
    positions: &[BlankPosition],
    state: &RevealState,
) -> Vec<PlacedMarker> {
    if state.solution_revealed {
        return Vec::new();
    }
    positions
        .iter()
        .filter_map(|p| {
            surface.cursor_position(p.line, p.column).map(|at| PlacedMarker {
                hint_index: p.hint_index,
                at,
                state: MarkerState::for_hint(state, p.hint_index),
            })
        })
        .collect()
}

/// Highlight spans covering each located blank
pub fn blank_highlights(positions: &[BlankPosition]) -> Vec<HighlightSpan> {
    positions
        .iter()
        .map(|p| HighlightSpan {
            line: p.line,
            start: p.char_start,
            len: p.char_length,
            kind: HighlightKind::Blank,
        })
        .collect()
}
