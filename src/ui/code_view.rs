//! Code panel with inline blank markers
//!
//! `CodeView` is the terminal's implementation of `EditorSurface`: it maps
//! source line/column to buffer cells and paints highlight spans over the
//! syntax-colored text.

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::app::session::LabSession;
use crate::app::state::AppState;
use crate::exercise::blanks::BlankPosition;
use crate::exercise::editor::{
    CellPosition, EditorSurface, HighlightSpan, PlacedMarker, blank_highlights, place_markers,
};
use crate::exercise::tier::has_skeleton_for;
use crate::syntax;
use crate::theme::Theme;

/// Width of the line-number gutter including its separator
const GUTTER_WIDTH: u16 = 5;

/// Screen geometry of the code text
#[derive(Debug, Clone)]
pub struct CodeView {
    area: Rect,
    top: usize,
    left: usize,
    spans: Vec<HighlightSpan>,
}

impl CodeView {
    pub fn new(area: Rect) -> Self {
        Self { area, top: 0, left: 0, spans: Vec::new() }
    }

    /// Paint the current highlight spans into the buffer
    pub fn paint_highlights(&self, buf: &mut Buffer, theme: &Theme) {
        for span in &self.spans {
            for offset in 0..span.len {
                let Some(at) = self.cursor_position(span.line, span.start + offset + 1) else {
                    continue;
                };
                if let Some(cell) = buf.cell_mut((at.x, at.y)) {
                    cell.set_bg(theme.highlight(span.kind));
                }
            }
        }
    }
}

impl EditorSurface for CodeView {
    fn cursor_position(&self, line: usize, column: usize) -> Option<CellPosition> {
        let row = line.checked_sub(1)?.checked_sub(self.top)?;
        let col = column.checked_sub(1)?.checked_sub(self.left)?;
        let text_width = self.area.width.saturating_sub(GUTTER_WIDTH) as usize;
        if row >= self.area.height as usize || col >= text_width {
            return None;
        }
        Some(CellPosition {
            x: self.area.x + GUTTER_WIDTH + col as u16,
            y: self.area.y + row as u16,
        })
    }

    fn apply_highlight(&mut self, spans: &[HighlightSpan]) {
        self.spans = spans.to_vec();
    }

    fn on_scroll(&mut self, top: usize, left: usize) {
        self.top = top;
        self.left = left;
    }
}

/// Draw the active code block of the current step
pub fn draw(frame: &mut Frame, area: Rect, state: &mut AppState, session: &LabSession, theme: &Theme) {
    let step_index = session.current_index();
    let key = state.active_block_key(step_index);
    let Some(block) = session.lab().block(key) else {
        draw_empty(frame, area, theme);
        return;
    };

    let reveal = session.reveal_state(key);
    let preview = state.code_view.show_answers && !session.shows_solution(key);
    let code = if preview {
        session.answers_preview(key).unwrap_or_default()
    } else {
        session.displayed_code(key).map(str::to_string).unwrap_or_default()
    };
    let positions: Vec<BlankPosition> = session.blank_positions(key).unwrap_or_default();

    let block_count = session.current_step().code_blocks.len();
    let mut title = format!(" {} ", block.filename);
    if block_count > 1 {
        title.push_str(&format!("({}/{}) ", key.block + 1, block_count));
    }
    if preview {
        title.push_str("[answers] ");
    } else if !session.shows_solution(key) && !has_skeleton_for(block, reveal.tier) {
        title.push_str("[no skeleton] ");
    }
    let frame_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border_focused))
        .style(Style::default().bg(theme.bg_secondary));
    let inner = frame_block.inner(area);
    frame.render_widget(frame_block, area);

    let highlighted = syntax::highlight_code(&code, &block.language, theme);
    state.code_view.total_lines = highlighted.len();
    state.code_view.visible_height = inner.height as usize;
    state.code_view.clamp_scroll();
    let top = state.code_view.scroll_offset;

    let lines: Vec<Line> = highlighted
        .into_iter()
        .enumerate()
        .skip(top)
        .take(inner.height as usize)
        .map(|(i, line)| {
            let mut spans = vec![Span::styled(
                format!("{:>3} \u{2502}", i + 1),
                Style::default().fg(theme.fg_muted).bg(theme.bg_secondary),
            )];
            spans.extend(line.spans);
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);

    let mut view = CodeView::new(inner);
    view.on_scroll(top, 0);

    let spans = if preview {
        session.answer_highlights(key).unwrap_or_default()
    } else {
        blank_highlights(&positions)
    };
    view.apply_highlight(&spans);
    view.paint_highlights(frame.buffer_mut(), theme);

    let selected = state.code_view.selected(&positions).map(|p| p.hint_index);
    if !preview {
        let markers = place_markers(&view, &positions, &reveal);
        draw_markers(frame.buffer_mut(), &markers, selected, theme);
    }
}

fn draw_markers(buf: &mut Buffer, markers: &[PlacedMarker], selected: Option<usize>, theme: &Theme) {
    for marker in markers {
        let Some(cell) = buf.cell_mut((marker.at.x, marker.at.y)) else {
            continue;
        };
        let mut style = Style::default().fg(theme.marker(marker.state)).add_modifier(Modifier::BOLD);
        if selected == Some(marker.hint_index) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        cell.set_symbol(marker.state.symbol());
        cell.set_style(style);
    }
}

fn draw_empty(frame: &mut Frame, area: Rect, theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.bg_primary));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(
        Paragraph::new("No code for this step. Press n to continue.").style(Style::default().fg(theme.fg_muted)),
        inner,
    );
}
