//! Popover for the selected blank's hint and answer

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::exercise::reveal::RevealState;
use crate::exercise::tier::RevealKind;
use crate::lab::model::Hint;
use crate::theme::Theme;

/// Popover width in columns, borders included
const POPOVER_WIDTH: u16 = 56;

/// Build the popover body, wrapped to `width`
pub fn popover_lines(
    hint_index: usize,
    hint: &Hint,
    state: &RevealState,
    width: usize,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let label = Style::default().fg(theme.fg_muted);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("Blank {} ", hint_index + 1), Style::default().fg(theme.accent_primary)),
        Span::styled(format!("on line {}", hint.line), label),
    ])];

    if state.revealed_hints.contains(&hint_index) || state.solution_revealed {
        lines.push(Line::from(""));
        for wrapped in textwrap::wrap(&hint.hint, width) {
            lines.push(Line::from(Span::styled(wrapped.into_owned(), Style::default().fg(theme.fg_secondary))));
        }
    }

    if state.answer_shown(hint_index) {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Answer: ", label),
            Span::styled(
                hint.answer.clone(),
                Style::default().fg(theme.marker_answer).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(actions(hint_index, state, theme)));
    lines
}

fn actions(hint_index: usize, state: &RevealState, theme: &Theme) -> Vec<Span<'static>> {
    let key = Style::default().fg(theme.fg_muted);
    let text = Style::default().fg(theme.fg_secondary);
    let mut spans = Vec::new();

    if !state.solution_revealed {
        if !state.revealed_hints.contains(&hint_index) {
            spans.push(Span::styled("[?]", key));
            spans.push(Span::styled(format!(" hint -{}  ", state.tier.penalty(RevealKind::Hint)), text));
        }
        if !state.revealed_answers.contains(&hint_index) {
            spans.push(Span::styled("[a]", key));
            spans.push(Span::styled(format!(" answer -{}  ", state.tier.penalty(RevealKind::Answer)), text));
        }
    }
    spans.push(Span::styled("[Esc]", key));
    spans.push(Span::styled(" close", text));
    spans
}

/// Draw the popover just below `anchor_y`, or above it when there is no room
pub fn draw(
    frame: &mut Frame,
    bounds: Rect,
    anchor: (u16, u16),
    hint_index: usize,
    hint: &Hint,
    state: &RevealState,
    theme: &Theme,
) {
    let width = POPOVER_WIDTH.min(bounds.width);
    let inner_width = width.saturating_sub(2) as usize;
    let lines = popover_lines(hint_index, hint, state, inner_width.max(1), theme);
    let height = (lines.len() as u16 + 2).min(bounds.height);

    let area = place(bounds, anchor, width, height);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Hint ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .style(Style::default().bg(theme.bg_tertiary));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Position a `width`x`height` box near `anchor`, kept inside `bounds`
fn place(bounds: Rect, anchor: (u16, u16), width: u16, height: u16) -> Rect {
    let (ax, ay) = anchor;
    let right = bounds.x + bounds.width;
    let bottom = bounds.y + bounds.height;

    let x = ax.saturating_sub(width / 2).max(bounds.x).min(right.saturating_sub(width));
    let y = if ay + 1 + height <= bottom { ay + 1 } else { ay.saturating_sub(height).max(bounds.y) };
    Rect::new(x, y, width, height)
}
