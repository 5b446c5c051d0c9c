//! Lab screen: header, step description, code, footer and command line

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use super::layout::lab_layout;
use super::{code_view, command_line, hint_popover, step_footer};
use crate::app::session::LabSession;
use crate::app::state::AppState;
use crate::exercise::editor::EditorSurface;
use crate::theme::Theme;

/// Draw the lab screen
pub fn draw(frame: &mut Frame, state: &mut AppState, session: &LabSession, theme: &Theme) {
    let area = frame.area();
    frame.render_widget(Paragraph::new("").style(Style::default().bg(theme.bg_primary)), area);

    let step = session.current_step();
    let wrap_width = area.width.saturating_sub(2).max(1) as usize;
    let description: Vec<Line> = textwrap::wrap(&step.description, wrap_width)
        .into_iter()
        .map(|l| Line::from(Span::styled(format!(" {l}"), Style::default().fg(theme.fg_primary))))
        .collect();

    let layout = lab_layout(area, description.len() as u16 + 1, step_footer::FOOTER_HEIGHT);

    frame.render_widget(Paragraph::new(header_lines(session, state, theme)), layout.header);
    frame.render_widget(Paragraph::new(description), layout.description);
    code_view::draw(frame, layout.code, state, session, theme);
    step_footer::draw(frame, layout.footer, session, theme);
    command_line::draw(frame, layout.command, &state.command_line, theme);

    if state.code_view.popover_open {
        draw_popover(frame, layout.code, state, session, theme);
    }
}

fn header_lines(session: &LabSession, state: &AppState, theme: &Theme) -> Vec<Line<'static>> {
    let lab = session.lab();
    let index = session.current_index();
    let step = session.current_step();
    let key = state.active_block_key(index);

    let mut status = vec![
        Span::styled(format!(" Step {}/{} ", index + 1, lab.steps.len()), Style::default().fg(theme.fg_muted)),
        Span::styled(
            step.title.clone(),
            Style::default().fg(theme.fg_secondary).add_modifier(Modifier::BOLD),
        ),
    ];
    if session.record().is_completed(index) {
        status.push(Span::styled("  \u{2713} done", Style::default().fg(theme.success)));
    }
    if step.has_code() {
        let reveal = session.reveal_state(key);
        let lock = if reveal.can_change_tier() { "" } else { " (locked)" };
        status.push(Span::styled(
            format!("   {}{}  {}/{} pts", reveal.tier, lock, reveal.effective_score(), reveal.tier.ceiling()),
            Style::default().fg(theme.accent_secondary),
        ));
    }

    vec![
        Line::from(vec![
            Span::styled(
                format!(" Lab {}: {}", lab.number, lab.title),
                Style::default().fg(theme.accent_primary).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("   {}/{} steps complete", session.record().completed_count(), lab.steps.len()),
                Style::default().fg(theme.fg_muted),
            ),
        ]),
        Line::from(status),
    ]
}

fn draw_popover(frame: &mut Frame, code_area: Rect, state: &AppState, session: &LabSession, theme: &Theme) {
    let key = state.active_block_key(session.current_index());
    let Ok(positions) = session.blank_positions(key) else {
        return;
    };
    let Some(position) = state.code_view.selected(&positions) else {
        return;
    };
    let Some(hint) = session.lab().block(key).and_then(|b| b.hints.get(position.hint_index)) else {
        return;
    };

    // Same geometry the code view used, so the popover sits under the marker
    let inner = Rect::new(
        code_area.x + 1,
        code_area.y + 1,
        code_area.width.saturating_sub(2),
        code_area.height.saturating_sub(2),
    );
    let mut view = code_view::CodeView::new(inner);
    view.on_scroll(state.code_view.scroll_offset, 0);
    let anchor = view
        .cursor_position(position.line, position.column)
        .map(|c| (c.x, c.y))
        .unwrap_or((inner.x + inner.width / 2, inner.y));

    let bounds = frame.area();
    hint_popover::draw(
        frame,
        bounds,
        anchor,
        position.hint_index,
        hint,
        &session.reveal_state(key),
        theme,
    );
}
